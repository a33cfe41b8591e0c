//! Declarative description of the file types in a submission.
//!
//! Field references are resolved to indices here; the dictionary loader
//! (`refcheck-schema`) is responsible for turning field names into indices.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// A relation from one file type to the primary key of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// Name of the referenced (parent) file type.
    pub referenced: String,
    /// Indices of the local fields forming the foreign key, in parent PK order.
    pub fields: Vec<usize>,
    /// Every parent key must be referenced at least once.
    #[serde(default)]
    pub surjection_required: bool,
    /// Feeds the parent's shared accumulator together with sibling types.
    #[serde(default)]
    pub complex: bool,
    /// Rows carrying an empty or not-applicable value are not checked.
    #[serde(default)]
    pub optional: bool,
}

impl ForeignKeySpec {
    pub fn new(referenced: impl Into<String>, fields: Vec<usize>) -> Self {
        Self {
            referenced: referenced.into(),
            fields,
            surjection_required: false,
            complex: false,
            optional: false,
        }
    }

    #[must_use]
    pub fn surjective(mut self) -> Self {
        self.surjection_required = true;
        self
    }

    /// Marks the relation as surjective through a shared (complex) accumulator.
    #[must_use]
    pub fn complex(mut self) -> Self {
        self.surjection_required = true;
        self.complex = true;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// One kind of submission file (donor, specimen, sample, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeSchema {
    pub name: String,
    /// Regular expression matched against physical file names.
    pub pattern: String,
    /// Declared field order; the header row must match it exactly.
    pub fields: Vec<String>,
    /// Composite primary key, in key order. Empty when the type has no key.
    #[serde(default)]
    pub primary_key: Vec<usize>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl FileTypeSchema {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        let name = name.into();
        let pattern = format!("^{}(\\..*)?\\.txt(\\.gz)?$", regex_escape(&name));
        Self {
            name,
            pattern,
            fields: fields.iter().map(|field| (*field).to_string()).collect(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, indices: Vec<usize>) -> Self {
        self.primary_key = indices;
        self
    }

    #[must_use]
    pub fn with_foreign_key(mut self, spec: ForeignKeySpec) -> Self {
        self.foreign_keys.push(spec);
        self
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// True when at least one of this type's relations requires surjection.
    pub fn requires_surjection(&self) -> bool {
        self.foreign_keys.iter().any(|fk| fk.surjection_required)
    }

    /// Field names for a list of indices. Unknown indices are skipped.
    pub fn field_names(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&idx| self.fields.get(idx).cloned())
            .collect()
    }

    pub fn primary_key_names(&self) -> Vec<String> {
        self.field_names(&self.primary_key)
    }

    /// Distinct parent type names, in declaration order.
    pub fn parents(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.foreign_keys
            .iter()
            .filter(|fk| seen.insert(fk.referenced.as_str()))
            .map(|fk| fk.referenced.as_str())
            .collect()
    }

    fn check_indices(&self, role: &'static str, indices: &[usize]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for &index in indices {
            if index >= self.fields.len() {
                return Err(SchemaError::IndexOutOfRange {
                    file_type: self.name.clone(),
                    role,
                    index,
                    field_count: self.fields.len(),
                });
            }
            if !seen.insert(index) {
                return Err(SchemaError::RepeatedIndex {
                    file_type: self.name.clone(),
                    role,
                    index,
                });
            }
        }
        Ok(())
    }
}

fn regex_escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// A validated set of file types.
///
/// Construction checks everything that can be checked locally; relation
/// cycles are detected when the dependency graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSchema {
    file_types: BTreeMap<String, FileTypeSchema>,
}

impl SubmissionSchema {
    pub fn new(file_types: Vec<FileTypeSchema>) -> Result<Self> {
        if file_types.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut by_name = BTreeMap::new();
        for file_type in file_types {
            if by_name.contains_key(&file_type.name) {
                return Err(SchemaError::DuplicateFileType {
                    name: file_type.name,
                });
            }
            by_name.insert(file_type.name.clone(), file_type);
        }
        let schema = Self {
            file_types: by_name,
        };
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<()> {
        for file_type in self.file_types.values() {
            if file_type.fields.is_empty() {
                return Err(SchemaError::NoFields {
                    file_type: file_type.name.clone(),
                });
            }
            let mut names = BTreeSet::new();
            for field in &file_type.fields {
                if !names.insert(field.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        file_type: file_type.name.clone(),
                        field: field.clone(),
                    });
                }
            }
            file_type.check_indices("primary key", &file_type.primary_key)?;

            for fk in &file_type.foreign_keys {
                file_type.check_indices("foreign key", &fk.fields)?;
                let parent = self.file_types.get(&fk.referenced).ok_or_else(|| {
                    SchemaError::UnknownReference {
                        file_type: file_type.name.clone(),
                        referenced: fk.referenced.clone(),
                    }
                })?;
                if !parent.has_primary_key() {
                    return Err(SchemaError::ReferencedWithoutPrimaryKey {
                        file_type: file_type.name.clone(),
                        referenced: fk.referenced.clone(),
                    });
                }
                if fk.fields.len() != parent.primary_key.len() {
                    return Err(SchemaError::KeyArityMismatch {
                        file_type: file_type.name.clone(),
                        referenced: fk.referenced.clone(),
                        fk_arity: fk.fields.len(),
                        pk_arity: parent.primary_key.len(),
                    });
                }
                if fk.complex && !fk.surjection_required {
                    return Err(SchemaError::ComplexWithoutSurjection {
                        file_type: file_type.name.clone(),
                        referenced: fk.referenced.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FileTypeSchema> {
        self.file_types.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&FileTypeSchema> {
        self.get(name).ok_or_else(|| SchemaError::UnknownFileType {
            name: name.to_string(),
        })
    }

    /// File types sorted by name.
    pub fn file_types(&self) -> impl Iterator<Item = &FileTypeSchema> {
        self.file_types.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.file_types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.file_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_types.is_empty()
    }

    /// Relations pointing at `parent`, as `(child type, foreign key)` pairs.
    pub fn children_of<'a>(
        &'a self,
        parent: &'a str,
    ) -> impl Iterator<Item = (&'a FileTypeSchema, &'a ForeignKeySpec)> + 'a {
        self.file_types.values().flat_map(move |child| {
            child
                .foreign_keys
                .iter()
                .filter(move |fk| fk.referenced == parent)
                .map(move |fk| (child, fk))
        })
    }
}
