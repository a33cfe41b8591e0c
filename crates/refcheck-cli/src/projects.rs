//! Dictionary loading, project discovery and batch scheduling.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use refcheck_executor::{Outcome, RequestJob, ValidationExecutor, ValidationHandle};
use refcheck_schema::{DictionaryDocument, ResolvedSchema, SchemaRegistry};
use refcheck_validate::{KeyValidationRequest, KeyValidationService};

/// How long the batch loop waits on one running task before checking the
/// others.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Loads a dictionary file into a fresh registry.
///
/// The release is the document's `release` field, or the file stem.
pub fn load_dictionary(path: &Path) -> Result<(Arc<SchemaRegistry>, Arc<ResolvedSchema>)> {
    let document = DictionaryDocument::load(path)
        .with_context(|| format!("load dictionary {}", path.display()))?;
    let release = document.release.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let registry = SchemaRegistry::new();
    let resolved = registry
        .register(&release, &document)
        .with_context(|| format!("resolve dictionary {}", path.display()))?;
    Ok((Arc::new(registry), resolved))
}

/// Project directories directly under `input_root`, sorted by name.
pub fn discover_projects(input_root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(input_root)
        .with_context(|| format!("read input root {}", input_root.display()))?;
    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read input root {}", input_root.display()))?;
        if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            projects.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    projects.sort();
    Ok(projects)
}

/// Runs every request through `executor`, resubmitting rejected ones as
/// slots free up. Results keep the request order.
pub fn run_batch(
    executor: &ValidationExecutor,
    service: &Arc<KeyValidationService>,
    requests: Vec<KeyValidationRequest>,
) -> Result<Vec<(String, Outcome)>> {
    let total = requests.len();
    let mut pending: VecDeque<(usize, KeyValidationRequest)> =
        requests.into_iter().enumerate().collect();
    let mut running: Vec<(usize, ValidationHandle)> = Vec::new();
    let mut finished: Vec<Option<(String, Outcome)>> = vec![None; total];

    while !pending.is_empty() || !running.is_empty() {
        while let Some((idx, request)) = pending.pop_front() {
            let job = RequestJob::new(Arc::clone(service), request.clone());
            match executor.execute(job) {
                Ok(handle) => running.push((idx, handle)),
                Err(err) if err.is_retryable() => {
                    tracing::debug!(project = %request.project_key, "no free slot, retrying later");
                    pending.push_front((idx, request));
                    break;
                }
                Err(err) => return Err(err).context("submit validation"),
            }
        }

        let before = running.len();
        running.retain(|(idx, handle)| match handle.try_outcome() {
            Some(outcome) => {
                finished[*idx] = Some((handle.project_key().to_string(), outcome));
                false
            }
            None => true,
        });
        if running.len() == before
            && let Some((_, handle)) = running.first()
        {
            let _ = handle.wait_timeout(POLL_INTERVAL);
        }
    }

    Ok(finished.into_iter().flatten().collect())
}
