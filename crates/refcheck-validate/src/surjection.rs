//! Surjectivity: every required parent key must be referenced.
//!
//! Accumulators are planned from the schema before digesting. A simple
//! relation gets its own accumulator; all complex relations pointing at
//! the same parent share one, fed concurrently by their child types.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use refcheck_core::{EncounteredKeys, KeySink, PrimaryKeySet};
use refcheck_model::{FileErrorCollection, ForeignKeySpec, RowError, SubmissionSchema};

use crate::digest::TypeDigest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurjectionKind {
    Simple { referencing: String },
    Complex { referencing: Vec<String> },
}

/// Compares one parent key set against one accumulator.
pub struct SurjectionCheck<'a> {
    pub parent: &'a PrimaryKeySet,
    pub encountered: &'a EncounteredKeys,
    pub kind: SurjectionKind,
}

impl SurjectionCheck<'_> {
    /// One violation per parent key never encountered, in first-seen order.
    pub fn run(&self) -> Vec<RowError> {
        // Encountered keys are a subset of the parent keys, so equal sizes
        // mean every key was referenced.
        if self.parent.len() == self.encountered.len() && self.parent.duplicate_count() == 0 {
            return Vec::new();
        }

        let fields = self.parent.fields().to_vec();
        self.parent
            .iter_in_order()
            .into_iter()
            .filter(|(key, _)| !self.encountered.contains(key))
            .map(|(key, origin)| match &self.kind {
                SurjectionKind::Simple { referencing } => RowError::simple_surjection(
                    &*origin.file_name,
                    referencing.clone(),
                    key.clone(),
                    fields.clone(),
                ),
                SurjectionKind::Complex { referencing } => RowError::complex_surjection(
                    &*origin.file_name,
                    referencing.clone(),
                    key.clone(),
                    fields.clone(),
                ),
            })
            .collect()
    }
}

/// Per-run encountered-key accumulators.
#[derive(Default)]
pub struct Accumulators {
    /// Keyed by (child type, foreign-key index).
    simple: BTreeMap<(String, usize), Arc<EncounteredKeys>>,
    /// Keyed by parent type.
    complex: BTreeMap<String, Arc<EncounteredKeys>>,
}

impl Accumulators {
    pub fn plan(schema: &SubmissionSchema) -> Self {
        let mut accumulators = Self::default();
        for child in schema.file_types() {
            for (idx, fk) in child.foreign_keys.iter().enumerate() {
                if !fk.surjection_required {
                    continue;
                }
                if fk.complex {
                    accumulators
                        .complex
                        .entry(fk.referenced.clone())
                        .or_default();
                } else {
                    accumulators
                        .simple
                        .insert((child.name.clone(), idx), Arc::default());
                }
            }
        }
        accumulators
    }

    /// Sink for the `idx`-th foreign key of `child`, if it feeds a surjection.
    pub fn sink_for(&self, child: &str, idx: usize, fk: &ForeignKeySpec) -> Option<Arc<dyn KeySink>> {
        if !fk.surjection_required {
            return None;
        }
        let sink = if fk.complex {
            self.complex.get(&fk.referenced)?
        } else {
            self.simple.get(&(child.to_string(), idx))?
        };
        Some(Arc::clone(sink) as Arc<dyn KeySink>)
    }

    /// Runs every planned check against the completed digests.
    ///
    /// Violations are filed under the file that first declared the parent
    /// key. A check is skipped when none of its contributing child types had
    /// a physical file in the submission.
    pub fn verify(
        &self,
        schema: &SubmissionSchema,
        digests: &BTreeMap<String, TypeDigest>,
    ) -> Vec<FileErrorCollection> {
        let submitted = |name: &str| digests.get(name).is_some_and(|digest| digest.files > 0);
        let mut errors = SurjectionErrors::default();

        for ((child, idx), encountered) in &self.simple {
            let Some(fk) = schema
                .get(child)
                .and_then(|child_schema| child_schema.foreign_keys.get(*idx))
            else {
                continue;
            };
            let Some(parent) = digests.get(&fk.referenced) else {
                continue;
            };
            if !submitted(child.as_str()) {
                tracing::debug!(child = %child, parent = %fk.referenced, "surjection skipped, no child files");
                continue;
            }
            let found = SurjectionCheck {
                parent: &parent.keys,
                encountered,
                kind: SurjectionKind::Simple {
                    referencing: child.clone(),
                },
            }
            .run();
            errors.file(&fk.referenced, found);
        }

        for (parent_name, encountered) in &self.complex {
            let referencing: Vec<String> = schema
                .children_of(parent_name)
                .filter(|(_, fk)| fk.complex)
                .map(|(child, _)| child.name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let Some(parent) = digests.get(parent_name) else {
                continue;
            };
            if !referencing.iter().any(|name| submitted(name.as_str())) {
                tracing::debug!(parent = %parent_name, "complex surjection skipped, no child files");
                continue;
            }
            let found = SurjectionCheck {
                parent: &parent.keys,
                encountered,
                kind: SurjectionKind::Complex { referencing },
            }
            .run();
            errors.file(parent_name, found);
        }
        errors.collections.into_values().collect()
    }
}

#[derive(Default)]
struct SurjectionErrors {
    collections: BTreeMap<String, FileErrorCollection>,
}

impl SurjectionErrors {
    fn file(&mut self, parent: &str, found: Vec<RowError>) {
        if !found.is_empty() {
            tracing::info!(parent, unreferenced = found.len(), "surjection violations");
        }
        for error in found {
            self.collections
                .entry(error.file_name.clone())
                .or_insert_with(|| FileErrorCollection::new(error.file_name.clone(), parent))
                .add(error);
        }
    }
}
