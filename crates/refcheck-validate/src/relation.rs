use std::sync::Arc;

use refcheck_core::{KeySink, PrimaryKeySet};
use refcheck_ingest::Row;
use refcheck_model::{ForeignKeySpec, KeyTuple};

/// Result of checking one row against one relation.
#[derive(Debug, PartialEq, Eq)]
pub enum RelationOutcome {
    /// Optional relation with an empty or not-applicable value.
    Skipped,
    Resolved,
    Missing(KeyTuple),
}

/// Checks one foreign key of a child type against its parent's keys.
///
/// Resolved keys are forwarded to the surjection sink when the relation
/// requires one. Missing keys are not recorded: they are reported as
/// missing relations and cannot cover a parent key.
pub struct RelationCheck {
    referenced: String,
    fields: Vec<usize>,
    optional: bool,
    parent: Arc<PrimaryKeySet>,
    sink: Option<Arc<dyn KeySink>>,
}

impl RelationCheck {
    pub fn new(spec: &ForeignKeySpec, parent: Arc<PrimaryKeySet>) -> Self {
        Self {
            referenced: spec.referenced.clone(),
            fields: spec.fields.clone(),
            optional: spec.optional,
            parent,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn KeySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn referenced(&self) -> &str {
        &self.referenced
    }

    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    pub fn check(&self, row: &Row<'_>, not_applicable: &[String]) -> RelationOutcome {
        let key = KeyTuple::project(&self.fields, |idx| row.get(idx));
        if self.optional && key.has_missing_value(not_applicable) {
            return RelationOutcome::Skipped;
        }
        if !self.parent.contains(&key) {
            return RelationOutcome::Missing(key);
        }
        if let Some(sink) = &self.sink {
            sink.record(key);
        }
        RelationOutcome::Resolved
    }
}
