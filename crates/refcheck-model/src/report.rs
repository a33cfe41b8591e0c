use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::violation::{FileErrorCollection, RowError};

/// Every file's violations for one project run.
///
/// Built once when the run completes and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub project_key: String,
    files: BTreeMap<String, FileErrorCollection>,
}

impl SubmissionReport {
    pub fn new(
        project_key: impl Into<String>,
        collections: impl IntoIterator<Item = FileErrorCollection>,
    ) -> Self {
        let mut files: BTreeMap<String, FileErrorCollection> = BTreeMap::new();
        for collection in collections {
            match files.get_mut(&collection.file_name) {
                Some(existing) => existing.merge(collection),
                None => {
                    files.insert(collection.file_name.clone(), collection);
                }
            }
        }
        Self {
            project_key: project_key.into(),
            files,
        }
    }

    /// True when no file has a violation.
    pub fn is_key_valid(&self) -> bool {
        !self.files.values().any(FileErrorCollection::has_errors)
    }

    pub fn file(&self, file_name: &str) -> Option<&FileErrorCollection> {
        self.files.get(file_name)
    }

    /// Collections sorted by file name, including files without violations.
    pub fn files(&self) -> impl Iterator<Item = &FileErrorCollection> {
        self.files.values()
    }

    pub fn errors(&self) -> impl Iterator<Item = &RowError> {
        self.files.values().flat_map(FileErrorCollection::iter)
    }

    pub fn error_count(&self) -> usize {
        self.files.values().map(FileErrorCollection::len).sum()
    }

    /// Violation counts keyed by record code (`UNIQUENESS`, `RELATION`, ...).
    pub fn counts_by_code(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for error in self.errors() {
            *counts.entry(error.kind.code()).or_insert(0) += 1;
        }
        counts
    }
}
