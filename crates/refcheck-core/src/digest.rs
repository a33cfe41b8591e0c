//! Per-run key digests: primary-key sets and encountered foreign-key targets.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;
use refcheck_model::KeyTuple;

/// Where a primary key was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrigin {
    pub file_name: Arc<str>,
    pub line_number: i64,
    ordinal: usize,
}

/// A key rejected by [`PrimaryKeySet::insert`].
#[derive(Debug)]
pub struct Duplicate<'a> {
    pub key: KeyTuple,
    pub first: &'a KeyOrigin,
}

/// Primary keys of one file type, built once per run.
///
/// Keys are mapped to the file and line that first declared them; later
/// occurrences leave the mapping untouched and are counted as duplicates.
/// After digesting the owning type completes the set is shared read-only.
#[derive(Debug, Clone)]
pub struct PrimaryKeySet {
    file_type: String,
    fields: Vec<usize>,
    keys: HashMap<KeyTuple, KeyOrigin>,
    duplicates: usize,
}

impl PrimaryKeySet {
    pub fn new(file_type: impl Into<String>, fields: Vec<usize>) -> Self {
        Self {
            file_type: file_type.into(),
            fields,
            keys: HashMap::new(),
            duplicates: 0,
        }
    }

    /// Inserts `key`, or hands it back with the first-seen origin when it
    /// is already present.
    pub fn insert(
        &mut self,
        key: KeyTuple,
        file_name: &Arc<str>,
        line_number: i64,
    ) -> Result<(), Duplicate<'_>> {
        if self.keys.contains_key(&key) {
            self.duplicates += 1;
            let first = &self.keys[&key];
            return Err(Duplicate { key, first });
        }
        let ordinal = self.keys.len();
        self.keys.insert(
            key,
            KeyOrigin {
                file_name: Arc::clone(file_name),
                line_number,
                ordinal,
            },
        );
        Ok(())
    }

    pub fn contains(&self, key: &KeyTuple) -> bool {
        self.keys.contains_key(key)
    }

    pub fn origin(&self, key: &KeyTuple) -> Option<&KeyOrigin> {
        self.keys.get(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of repeated keys rejected by [`insert`](Self::insert).
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Primary-key field indices in the owning type.
    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    /// Keys in first-seen order.
    pub fn iter_in_order(&self) -> Vec<(&KeyTuple, &KeyOrigin)> {
        let mut entries: Vec<_> = self.keys.iter().collect();
        entries.sort_unstable_by_key(|(_, origin)| origin.ordinal);
        entries
    }
}

/// Destination for foreign-key targets seen while digesting a child type.
///
/// Complex relations hand the same sink to several concurrently digesting
/// child types, so implementations must accept concurrent inserts.
pub trait KeySink: Send + Sync {
    fn record(&self, key: KeyTuple);
}

/// Append-only set of keys referenced by child rows.
#[derive(Debug, Default)]
pub struct EncounteredKeys {
    keys: DashSet<KeyTuple>,
}

impl EncounteredKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &KeyTuple) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeySink for EncounteredKeys {
    fn record(&self, key: KeyTuple) {
        self.keys.insert(key);
    }
}
