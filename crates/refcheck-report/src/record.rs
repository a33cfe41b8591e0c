//! Persisted form of a key violation.

use serde::{Deserialize, Serialize};

use refcheck_model::{FileTypeSchema, RowError, SubmissionSchema, ViolationKind};

use crate::error::{ReportError, Result};

/// One violation as written to the report, readable without the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file_name: String,
    pub file_type: String,
    /// `UNIQUENESS`, `RELATION`, `SIMPLE_SURJECTION` or `COMPLEX_SURJECTION`.
    pub error_type: String,
    pub line_number: i64,
    pub field_names: Vec<String>,
    pub value: Vec<String>,
    /// The other side of the relation; absent for uniqueness violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ErrorParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorParams {
    pub other_file_types: Vec<String>,
    pub other_fields: Vec<String>,
}

impl ErrorRecord {
    /// Describes `error`, found in a file of type `file_type`.
    ///
    /// Relations name the referenced type and its primary-key fields;
    /// surjections name the referencing type(s) and their foreign-key fields.
    pub fn describe(error: &RowError, file_type: &str, schema: &SubmissionSchema) -> Result<Self> {
        let own = lookup(schema, &error.file_name, file_type)?;
        let params = match &error.kind {
            ViolationKind::DuplicatePrimaryKey => None,
            ViolationKind::MissingRelation { referenced } => {
                let parent = lookup(schema, &error.file_name, referenced)?;
                Some(ErrorParams {
                    other_file_types: vec![referenced.clone()],
                    other_fields: parent.primary_key_names(),
                })
            }
            ViolationKind::SimpleSurjection { referencing } => Some(ErrorParams {
                other_file_types: vec![referencing.clone()],
                other_fields: referencing_fields(schema, &error.file_name, file_type, [referencing])?,
            }),
            ViolationKind::ComplexSurjection { referencing } => Some(ErrorParams {
                other_file_types: referencing.clone(),
                other_fields: referencing_fields(schema, &error.file_name, file_type, referencing)?,
            }),
        };

        Ok(Self {
            file_name: error.file_name.clone(),
            file_type: file_type.to_string(),
            error_type: error.kind.code().to_string(),
            line_number: error.line_number,
            field_names: own.field_names(&error.fields),
            value: error.key.values().to_vec(),
            params,
        })
    }
}

fn lookup<'a>(
    schema: &'a SubmissionSchema,
    file_name: &str,
    file_type: &str,
) -> Result<&'a FileTypeSchema> {
    schema
        .get(file_type)
        .ok_or_else(|| ReportError::UnknownFileType {
            file_name: file_name.to_string(),
            file_type: file_type.to_string(),
        })
}

/// Foreign-key field names pointing at `parent`, distinct, in type order.
fn referencing_fields<'a>(
    schema: &SubmissionSchema,
    file_name: &str,
    parent: &str,
    children: impl IntoIterator<Item = &'a String>,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for child in children {
        let child_schema = lookup(schema, file_name, child)?;
        for fk in child_schema
            .foreign_keys
            .iter()
            .filter(|fk| fk.referenced == parent && fk.surjection_required)
        {
            for name in child_schema.field_names(&fk.fields) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    Ok(names)
}
