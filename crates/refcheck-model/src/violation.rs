//! Recoverable key violations and their per-file collection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::KeyTuple;

/// Line number used for simple surjection violations.
pub const SIMPLE_SURJECTION_LINE: i64 = -1;
/// Line number used for complex surjection violations.
pub const COMPLEX_SURJECTION_LINE: i64 = -2;

/// What went wrong, with the relation context each kind needs for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// The primary key was already seen earlier in the same file type.
    DuplicatePrimaryKey,
    /// The foreign key does not resolve to a primary key of `referenced`.
    MissingRelation { referenced: String },
    /// The primary key is never referenced by `referencing`.
    SimpleSurjection { referencing: String },
    /// The primary key is referenced by none of the `referencing` types.
    ComplexSurjection { referencing: Vec<String> },
}

impl ViolationKind {
    /// Stable code used in persisted records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicatePrimaryKey => "UNIQUENESS",
            Self::MissingRelation { .. } => "RELATION",
            Self::SimpleSurjection { .. } => "SIMPLE_SURJECTION",
            Self::ComplexSurjection { .. } => "COMPLEX_SURJECTION",
        }
    }

    pub fn is_surjection(&self) -> bool {
        matches!(
            self,
            Self::SimpleSurjection { .. } | Self::ComplexSurjection { .. }
        )
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single violation found while digesting a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(flatten)]
    pub kind: ViolationKind,
    pub file_name: String,
    /// 1-based physical line, or a surjection sentinel.
    pub line_number: i64,
    pub key: KeyTuple,
    /// Field indices (in the file's own type) the key was taken from.
    pub fields: Vec<usize>,
}

impl RowError {
    pub fn duplicate(
        file_name: impl Into<String>,
        line_number: i64,
        key: KeyTuple,
        fields: Vec<usize>,
    ) -> Self {
        Self {
            kind: ViolationKind::DuplicatePrimaryKey,
            file_name: file_name.into(),
            line_number,
            key,
            fields,
        }
    }

    pub fn missing_relation(
        file_name: impl Into<String>,
        line_number: i64,
        referenced: impl Into<String>,
        key: KeyTuple,
        fields: Vec<usize>,
    ) -> Self {
        Self {
            kind: ViolationKind::MissingRelation {
                referenced: referenced.into(),
            },
            file_name: file_name.into(),
            line_number,
            key,
            fields,
        }
    }

    pub fn simple_surjection(
        file_name: impl Into<String>,
        referencing: impl Into<String>,
        key: KeyTuple,
        fields: Vec<usize>,
    ) -> Self {
        Self {
            kind: ViolationKind::SimpleSurjection {
                referencing: referencing.into(),
            },
            file_name: file_name.into(),
            line_number: SIMPLE_SURJECTION_LINE,
            key,
            fields,
        }
    }

    pub fn complex_surjection(
        file_name: impl Into<String>,
        referencing: Vec<String>,
        key: KeyTuple,
        fields: Vec<usize>,
    ) -> Self {
        Self {
            kind: ViolationKind::ComplexSurjection { referencing },
            file_name: file_name.into(),
            line_number: COMPLEX_SURJECTION_LINE,
            key,
            fields,
        }
    }
}

/// Violations for one physical file, ordered by line number.
///
/// Sentinel lines (-2, -1) sort before every real line; violations on the
/// same line keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileErrorCollection {
    pub file_name: String,
    pub file_type: String,
    lines: BTreeMap<i64, Vec<RowError>>,
}

impl FileErrorCollection {
    pub fn new(file_name: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            lines: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, error: RowError) {
        self.lines.entry(error.line_number).or_default().push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn has_error_at(&self, line_number: i64) -> bool {
        self.lines.contains_key(&line_number)
    }

    pub fn len(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Errors in line order.
    pub fn iter(&self) -> impl Iterator<Item = &RowError> {
        self.lines.values().flatten()
    }

    pub fn count_by_code(&self, code: &str) -> usize {
        self.iter().filter(|error| error.kind.code() == code).count()
    }

    /// Moves every error of `other` into this collection.
    pub fn merge(&mut self, other: FileErrorCollection) {
        for (line, errors) in other.lines {
            self.lines.entry(line).or_default().extend(errors);
        }
    }
}
