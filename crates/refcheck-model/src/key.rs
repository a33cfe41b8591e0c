use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable, fixed-arity tuple of field values.
///
/// Equality and ordering are lexicographic over the fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyTuple(Box<[String]>);

impl KeyTuple {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Projects the given field indices out of a row.
    ///
    /// Indices past the end of the row yield empty values; callers check the
    /// row width before extracting keys.
    pub fn project<'a, F>(indices: &[usize], field: F) -> Self
    where
        F: Fn(usize) -> Option<&'a str>,
    {
        Self(
            indices
                .iter()
                .map(|&idx| field(idx).unwrap_or_default().to_string())
                .collect(),
        )
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// True when any value is empty or matches one of `codes`.
    pub fn has_missing_value(&self, codes: &[String]) -> bool {
        self.0
            .iter()
            .any(|value| value.trim().is_empty() || codes.iter().any(|code| code == value))
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl From<Vec<String>> for KeyTuple {
    fn from(values: Vec<String>) -> Self {
        Self(values.into_boxed_slice())
    }
}
