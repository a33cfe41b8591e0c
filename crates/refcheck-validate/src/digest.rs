//! Single-pass digest of one file type.
//!
//! Every physical file of the type is streamed once. Primary keys go into
//! the type's key set (repeats are reported at their own line), and each
//! declared relation is checked against the already complete parent set in
//! the same pass.

use std::sync::Arc;
use std::time::Instant;

use refcheck_core::{CancellationToken, PrimaryKeySet, redact_key};
use refcheck_ingest::{FileAccess, SubmissionFile, TsvReader};
use refcheck_model::{FileErrorCollection, FileTypeSchema, KeyTuple, RowError};

use crate::error::Result;
use crate::options::EngineOptions;
use crate::relation::{RelationCheck, RelationOutcome};

/// Output of digesting one file type.
#[derive(Debug)]
pub struct TypeDigest {
    pub file_type: String,
    pub keys: Arc<PrimaryKeySet>,
    /// One collection per physical file, in listing order.
    pub collections: Vec<FileErrorCollection>,
    pub files: usize,
    pub rows: u64,
}

pub struct KeyDigestBuilder<'a> {
    schema: &'a FileTypeSchema,
    access: &'a dyn FileAccess,
    options: &'a EngineOptions,
    relations: Vec<RelationCheck>,
}

impl<'a> KeyDigestBuilder<'a> {
    pub fn new(
        schema: &'a FileTypeSchema,
        access: &'a dyn FileAccess,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            schema,
            access,
            options,
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_relation(mut self, relation: RelationCheck) -> Self {
        self.relations.push(relation);
        self
    }

    /// Digests `files` in order.
    ///
    /// Polls `token` before each file and every `cancel_check_interval`
    /// rows. A parse failure aborts the whole digest.
    pub fn digest(&self, files: &[SubmissionFile], token: &CancellationToken) -> Result<TypeDigest> {
        let mut keys = PrimaryKeySet::new(self.schema.name.clone(), self.schema.primary_key.clone());
        let mut collections = Vec::with_capacity(files.len());
        let mut rows = 0;

        for file in files {
            token.check()?;
            let mut collection = FileErrorCollection::new(file.name.clone(), self.schema.name.clone());
            rows += self.digest_file(file, &mut keys, &mut collection, token)?;
            collections.push(collection);
        }

        Ok(TypeDigest {
            file_type: self.schema.name.clone(),
            keys: Arc::new(keys),
            collections,
            files: files.len(),
            rows,
        })
    }

    fn digest_file(
        &self,
        file: &SubmissionFile,
        keys: &mut PrimaryKeySet,
        collection: &mut FileErrorCollection,
        token: &CancellationToken,
    ) -> Result<u64> {
        let start = Instant::now();
        let file_name: Arc<str> = Arc::from(file.name.as_str());
        let source = self.access.open(file)?;
        let mut reader = TsvReader::new(file.name.clone(), source, &self.schema.fields)?;
        let cancel_every = self.options.cancel_every();
        let progress_every = self.options.progress_interval;
        let has_primary_key = self.schema.has_primary_key();

        while let Some(row) = reader.next_row()? {
            let line = row.line;

            if has_primary_key {
                let key = KeyTuple::project(&self.schema.primary_key, |idx| row.get(idx));
                if let Err(duplicate) = keys.insert(key, &file_name, line) {
                    tracing::debug!(
                        file = %file.name,
                        line,
                        first_file = %duplicate.first.file_name,
                        first_line = duplicate.first.line_number,
                        key = %redact_key(&duplicate.key),
                        "duplicate primary key"
                    );
                    collection.add(RowError::duplicate(
                        file.name.clone(),
                        line,
                        duplicate.key,
                        self.schema.primary_key.clone(),
                    ));
                }
            }

            for relation in &self.relations {
                if let RelationOutcome::Missing(key) =
                    relation.check(&row, &self.options.not_applicable_codes)
                {
                    tracing::debug!(
                        file = %file.name,
                        line,
                        referenced = relation.referenced(),
                        key = %redact_key(&key),
                        "missing relation"
                    );
                    collection.add(RowError::missing_relation(
                        file.name.clone(),
                        line,
                        relation.referenced(),
                        key,
                        relation.fields().to_vec(),
                    ));
                }
            }

            let read = reader.rows_read();
            if read % cancel_every == 0 {
                token.check()?;
            }
            if progress_every > 0 && read % progress_every == 0 {
                tracing::info!(file = %file.name, rows = read, "digest progress");
            }
        }

        let rows = reader.rows_read();
        tracing::info!(
            file = %file.name,
            rows,
            errors = collection.len(),
            duration_ms = start.elapsed().as_millis(),
            "file digested"
        );
        Ok(rows)
    }
}
