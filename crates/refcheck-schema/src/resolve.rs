use std::collections::HashMap;

use refcheck_core::DependencyGraph;
use refcheck_model::{FileTypeSchema, ForeignKeySpec, SchemaError, SubmissionSchema};
use regex::Regex;

use crate::document::{DictionaryDocument, FileTypeDocument, sha256_json};
use crate::error::Result;

/// A dictionary resolved into a validated schema and its processing order.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub release: String,
    pub fingerprint: String,
    pub schema: SubmissionSchema,
    pub graph: DependencyGraph,
}

impl ResolvedSchema {
    pub fn from_document(release: impl Into<String>, document: &DictionaryDocument) -> Result<Self> {
        let release = release.into();
        let schema = resolve(document)?;
        let graph = DependencyGraph::build(&schema)?;
        let fingerprint = document.fingerprint();
        tracing::info!(
            release = %release,
            file_types = schema.len(),
            fingerprint = %fingerprint,
            "dictionary resolved"
        );
        Ok(Self {
            release,
            fingerprint,
            schema,
            graph,
        })
    }

    /// Builds from an already validated schema, e.g. one assembled in code.
    pub fn from_schema(release: impl Into<String>, schema: SubmissionSchema) -> Result<Self> {
        let graph = DependencyGraph::build(&schema)?;
        let fingerprint = sha256_json(&schema);
        Ok(Self {
            release: release.into(),
            fingerprint,
            schema,
            graph,
        })
    }

    pub fn order(&self) -> &[String] {
        self.graph.order()
    }
}

/// Maps field names to indices and validates the resulting schema.
pub fn resolve(document: &DictionaryDocument) -> std::result::Result<SubmissionSchema, SchemaError> {
    let file_types = document
        .files
        .iter()
        .map(resolve_file_type)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    SubmissionSchema::new(file_types)
}

fn resolve_file_type(doc: &FileTypeDocument) -> std::result::Result<FileTypeSchema, SchemaError> {
    let names: Vec<&str> = doc.fields.iter().map(String::as_str).collect();
    let mut schema = FileTypeSchema::new(doc.name.clone(), &names);
    if let Some(pattern) = &doc.pattern {
        schema = schema.with_pattern(pattern.clone());
    }
    Regex::new(&schema.pattern).map_err(|err| SchemaError::InvalidPattern {
        file_type: doc.name.clone(),
        message: err.to_string(),
    })?;

    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (idx, field) in doc.fields.iter().enumerate() {
        positions.entry(field.as_str()).or_insert(idx);
    }
    let lookup = |fields: &[String]| {
        fields
            .iter()
            .map(|field| {
                positions
                    .get(field.as_str())
                    .copied()
                    .ok_or_else(|| SchemaError::UnknownField {
                        file_type: doc.name.clone(),
                        field: field.clone(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
    };

    schema = schema.with_primary_key(lookup(&doc.primary_key)?);
    for relation in &doc.relations {
        let mut fk = ForeignKeySpec::new(relation.other.clone(), lookup(&relation.fields)?);
        fk.surjection_required = relation.surjective;
        fk.complex = relation.complex;
        fk.optional = relation.optional;
        schema = schema.with_foreign_key(fk);
    }
    Ok(schema)
}
