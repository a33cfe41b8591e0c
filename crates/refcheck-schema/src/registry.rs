use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::{DictionaryDocument, DictionaryFormat};
use crate::error::{DictionaryError, Result};
use crate::resolve::ResolvedSchema;

/// Process-lifetime cache of resolved schemas, one per release.
///
/// Dictionaries are looked up as `<root>/<release>.json` or
/// `<root>/<release>.toml` on first use; releases can also be registered
/// directly. Every lookup of a release returns the same shared instance.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    dictionary_root: Option<PathBuf>,
    cache: Mutex<BTreeMap<String, Arc<ResolvedSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dictionary_root(root: impl Into<PathBuf>) -> Self {
        Self {
            dictionary_root: Some(root.into()),
            cache: Mutex::default(),
        }
    }

    pub fn dictionary_root(&self) -> Option<&Path> {
        self.dictionary_root.as_deref()
    }

    /// Resolves and caches `document` under `release`.
    ///
    /// A release already in the cache keeps its first instance.
    pub fn register(
        &self,
        release: &str,
        document: &DictionaryDocument,
    ) -> Result<Arc<ResolvedSchema>> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(release) {
            return Ok(Arc::clone(existing));
        }
        let resolved = Arc::new(ResolvedSchema::from_document(release, document)?);
        cache.insert(release.to_string(), Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Caches an already resolved schema, replacing nothing.
    pub fn insert(&self, resolved: ResolvedSchema) -> Arc<ResolvedSchema> {
        let mut cache = self.cache.lock();
        Arc::clone(
            cache
                .entry(resolved.release.clone())
                .or_insert_with(|| Arc::new(resolved)),
        )
    }

    pub fn get(&self, release: &str) -> Option<Arc<ResolvedSchema>> {
        self.cache.lock().get(release).cloned()
    }

    /// Cached schema for `release`, loading its dictionary on first use.
    pub fn resolve(&self, release: &str) -> Result<Arc<ResolvedSchema>> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(release) {
            return Ok(Arc::clone(existing));
        }
        let path = self
            .dictionary_path(release)
            .ok_or_else(|| DictionaryError::UnknownRelease {
                release: release.to_string(),
            })?;
        tracing::debug!(release, path = %path.display(), "loading dictionary");
        let document = DictionaryDocument::load(&path)?;
        let resolved = Arc::new(ResolvedSchema::from_document(release, &document)?);
        cache.insert(release.to_string(), Arc::clone(&resolved));
        Ok(resolved)
    }

    pub fn releases(&self) -> Vec<String> {
        self.cache.lock().keys().cloned().collect()
    }

    fn dictionary_path(&self, release: &str) -> Option<PathBuf> {
        let root = self.dictionary_root.as_ref()?;
        ["json", "toml"]
            .iter()
            .map(|ext| root.join(format!("{release}.{ext}")))
            .find(|path| path.is_file() && DictionaryFormat::from_path(path).is_some())
    }
}
