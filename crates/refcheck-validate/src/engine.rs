//! Run orchestration for one project.
//!
//! Types are digested in dependency order. With `parallel_types` each type
//! gets its own scoped thread and waits on its parents' key barriers, so
//! independent types overlap while a child never starts before its parents
//! are complete. The first failure cancels the rest of the run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info_span;

use refcheck_core::CancellationToken;
use refcheck_ingest::{AccessProtocol, FileAccess, IngestError, LocalFileAccess, SubmissionFile};
use refcheck_model::{FileErrorCollection, SchemaError, SubmissionReport};
use refcheck_report::ReportWriter;
use refcheck_schema::{ResolvedSchema, SchemaRegistry};

use crate::barrier::KeyBarrier;
use crate::digest::{KeyDigestBuilder, TypeDigest};
use crate::error::{Result, ValidationError};
use crate::options::EngineOptions;
use crate::relation::RelationCheck;
use crate::surjection::Accumulators;

/// Counters for one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub files: usize,
    pub rows: u64,
    /// Distinct primary keys per file type.
    pub keys_by_type: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result of a run that completed, with or without violations.
#[derive(Debug, Clone)]
pub struct KeyValidationOutcome {
    pub project_key: String,
    pub report: SubmissionReport,
    /// Where the error records were written.
    pub report_location: String,
    pub key_valid: bool,
    pub stats: RunStats,
}

/// Validates projects against one resolved schema through one file-access
/// capability.
pub struct KeyValidator {
    schema: Arc<ResolvedSchema>,
    access: Arc<dyn FileAccess>,
    options: EngineOptions,
}

impl KeyValidator {
    pub fn new(schema: Arc<ResolvedSchema>, access: Arc<dyn FileAccess>) -> Self {
        Self {
            schema,
            access,
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Digests, checks and reports one project.
    ///
    /// Returns [`ValidationError::Cancelled`] when `token` is cancelled
    /// before the report is written; no report is produced in that case.
    pub fn validate(
        &self,
        project_key: &str,
        token: &CancellationToken,
    ) -> Result<KeyValidationOutcome> {
        let span = info_span!("key_validation", project = %project_key, release = %self.schema.release);
        let _guard = span.enter();
        let started_at = Utc::now();
        let start = Instant::now();

        token.check()?;
        let listing = self.list_files(project_key)?;
        let accumulators = Accumulators::plan(&self.schema.schema);
        let digests = self.run_digests(&listing, &accumulators, token)?;

        token.check()?;
        let surjection_errors = accumulators.verify(&self.schema.schema, &digests);

        let mut collections: Vec<FileErrorCollection> = Vec::new();
        let mut stats_files = 0;
        let mut stats_rows = 0;
        let mut keys_by_type = BTreeMap::new();
        for digest in digests.into_values() {
            stats_files += digest.files;
            stats_rows += digest.rows;
            keys_by_type.insert(digest.file_type, digest.keys.len());
            collections.extend(digest.collections);
        }
        collections.extend(surjection_errors);
        let report = SubmissionReport::new(project_key, collections);

        token.check()?;
        let report_location = self.write_report(project_key, &report)?;

        let key_valid = report.is_key_valid();
        let stats = RunStats {
            files: stats_files,
            rows: stats_rows,
            keys_by_type,
            started_at,
            finished_at: Utc::now(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            key_valid,
            files = stats.files,
            rows = stats.rows,
            errors = report.error_count(),
            duration_ms = stats.duration_ms,
            report = %report_location,
            "key validation finished"
        );

        Ok(KeyValidationOutcome {
            project_key: project_key.to_string(),
            report,
            report_location,
            key_valid,
            stats,
        })
    }

    fn list_files(&self, project_key: &str) -> Result<BTreeMap<String, Vec<SubmissionFile>>> {
        let mut listing = BTreeMap::new();
        for file_type in self.schema.schema.file_types() {
            let pattern =
                Regex::new(&file_type.pattern).map_err(|err| SchemaError::InvalidPattern {
                    file_type: file_type.name.clone(),
                    message: err.to_string(),
                })?;
            let files = self.access.list(project_key, &pattern)?;
            tracing::debug!(file_type = %file_type.name, files = files.len(), "matched files");
            listing.insert(file_type.name.clone(), files);
        }
        Ok(listing)
    }

    fn run_digests(
        &self,
        listing: &BTreeMap<String, Vec<SubmissionFile>>,
        accumulators: &Accumulators,
        token: &CancellationToken,
    ) -> Result<BTreeMap<String, TypeDigest>> {
        let order = self.schema.order();
        let barriers: BTreeMap<&str, KeyBarrier> = order
            .iter()
            .map(|name| (name.as_str(), KeyBarrier::new()))
            .collect();
        let run_token = token.child();
        let barriers = &barriers;
        let run_token = &run_token;
        let parent_span = tracing::Span::current();
        let parent_span = &parent_span;

        let results: Vec<(String, Result<TypeDigest>)> = if self.options.parallel_types {
            thread::scope(|scope| {
                let handles: Vec<_> = order
                    .iter()
                    .map(|name| {
                        let spawned = thread::Builder::new()
                            .name(format!("digest-{name}"))
                            .spawn_scoped(scope, move || {
                                let _entered = parent_span.enter();
                                let _cancel = CancelOnPanic(run_token);
                                self.digest_type(name, listing, accumulators, barriers, run_token)
                            });
                        (name, spawned)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(name, spawned)| {
                        let result = match spawned {
                            Ok(handle) => handle.join().unwrap_or_else(|panic| {
                                run_token.cancel();
                                std::panic::resume_unwind(panic)
                            }),
                            Err(source) => {
                                run_token.cancel();
                                if let Some(barrier) = barriers.get(name.as_str()) {
                                    drop(barrier.publisher());
                                }
                                Err(ValidationError::Thread {
                                    file_type: name.clone(),
                                    source,
                                })
                            }
                        };
                        (name.clone(), result)
                    })
                    .collect()
            })
        } else {
            let mut results = Vec::with_capacity(order.len());
            for name in order {
                let result = self.digest_type(name, listing, accumulators, barriers, run_token);
                let failed = result.is_err();
                results.push((name.clone(), result));
                if failed {
                    break;
                }
            }
            results
        };

        resolve_results(results, token)
    }

    fn digest_type(
        &self,
        name: &str,
        listing: &BTreeMap<String, Vec<SubmissionFile>>,
        accumulators: &Accumulators,
        barriers: &BTreeMap<&str, KeyBarrier>,
        token: &CancellationToken,
    ) -> Result<TypeDigest> {
        let span = info_span!("digest", file_type = %name);
        let _guard = span.enter();

        let barrier = barriers
            .get(name)
            .ok_or_else(|| SchemaError::UnknownFileType {
                name: name.to_string(),
            })?;
        let publisher = barrier.publisher();

        let result = self.build_digest(name, listing, accumulators, barriers, token);
        match result {
            Ok(digest) => {
                publisher.publish(Arc::clone(&digest.keys));
                Ok(digest)
            }
            Err(err) => {
                if !err.is_secondary() {
                    tracing::warn!(file_type = %name, error = %err, "digest failed");
                }
                token.cancel();
                Err(err)
            }
        }
    }

    fn build_digest(
        &self,
        name: &str,
        listing: &BTreeMap<String, Vec<SubmissionFile>>,
        accumulators: &Accumulators,
        barriers: &BTreeMap<&str, KeyBarrier>,
        token: &CancellationToken,
    ) -> Result<TypeDigest> {
        let file_type = self.schema.schema.require(name)?;
        let mut builder = KeyDigestBuilder::new(file_type, self.access.as_ref(), &self.options);

        for (idx, fk) in file_type.foreign_keys.iter().enumerate() {
            let parent = barriers
                .get(fk.referenced.as_str())
                .and_then(KeyBarrier::wait)
                .ok_or_else(|| ValidationError::Aborted {
                    file_type: name.to_string(),
                })?;
            let mut check = RelationCheck::new(fk, parent);
            if let Some(sink) = accumulators.sink_for(name, idx, fk) {
                check = check.with_sink(sink);
            }
            builder = builder.with_relation(check);
        }

        let files = listing.get(name).map(Vec::as_slice).unwrap_or_default();
        let start = Instant::now();
        let digest = builder.digest(files, token)?;
        tracing::info!(
            files = digest.files,
            rows = digest.rows,
            keys = digest.keys.len(),
            duplicates = digest.keys.duplicate_count(),
            duration_ms = start.elapsed().as_millis(),
            "file type digested"
        );
        Ok(digest)
    }

    fn write_report(&self, project_key: &str, report: &SubmissionReport) -> Result<String> {
        let sink = self
            .access
            .create(project_key, &self.options.report_file_name)?;
        let mut writer = ReportWriter::new(sink.writer);
        let written = writer.write_report(report, &self.schema.schema)?;
        writer.finish()?;
        tracing::debug!(records = written, location = %sink.location, "report written");
        Ok(sink.location)
    }
}

/// Picks the run's outcome from per-type results in dependency order.
///
/// Cancels the run as soon as a digest thread starts unwinding.
struct CancelOnPanic<'a>(&'a CancellationToken);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

/// External cancellation wins; otherwise the first root-cause failure is
/// returned and failures caused by it are dropped.
fn resolve_results(
    results: Vec<(String, Result<TypeDigest>)>,
    token: &CancellationToken,
) -> Result<BTreeMap<String, TypeDigest>> {
    if token.is_cancelled() {
        return Err(ValidationError::Cancelled);
    }
    let mut digests = BTreeMap::new();
    let mut secondary = None;
    for (name, result) in results {
        match result {
            Ok(digest) => {
                digests.insert(name, digest);
            }
            Err(err) if err.is_secondary() => {
                if secondary.is_none() {
                    secondary = Some(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
    match secondary {
        Some(err) => Err(err),
        None => Ok(digests),
    }
}

/// Everything needed to validate one project, as handed over by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValidationRequest {
    pub release: String,
    pub project_key: String,
    pub input_root: PathBuf,
    #[serde(default)]
    pub protocol: AccessProtocol,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
}

impl KeyValidationRequest {
    pub fn new(
        release: impl Into<String>,
        project_key: impl Into<String>,
        input_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            release: release.into(),
            project_key: project_key.into(),
            input_root: input_root.into(),
            protocol: AccessProtocol::File,
            output_root: None,
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: AccessProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(output_root.into());
        self
    }
}

/// Resolves requests into validators: schema by release, file access by
/// protocol.
pub struct KeyValidationService {
    registry: Arc<SchemaRegistry>,
    options: EngineOptions,
    injected: Option<Arc<dyn FileAccess>>,
}

impl KeyValidationService {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            options: EngineOptions::default(),
            injected: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Capability used for [`AccessProtocol::Memory`] requests.
    #[must_use]
    pub fn with_injected_access(mut self, access: Arc<dyn FileAccess>) -> Self {
        self.injected = Some(access);
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn validator_for(&self, request: &KeyValidationRequest) -> Result<KeyValidator> {
        let schema = self.registry.resolve(&request.release)?;
        let access: Arc<dyn FileAccess> = match request.protocol {
            AccessProtocol::File => Arc::new(
                LocalFileAccess::new(&request.input_root)
                    .with_output_root(request.output_root.clone()),
            ),
            AccessProtocol::Memory => self.injected.clone().ok_or_else(|| {
                IngestError::UnsupportedProtocol {
                    protocol: request.protocol.to_string(),
                }
            })?,
        };
        Ok(KeyValidator::new(schema, access).with_options(self.options.clone()))
    }

    /// Runs the full digest, check and report sequence for `request`.
    pub fn invoke(
        &self,
        request: &KeyValidationRequest,
        token: &CancellationToken,
    ) -> Result<KeyValidationOutcome> {
        self.validator_for(request)?
            .validate(&request.project_key, token)
    }
}
