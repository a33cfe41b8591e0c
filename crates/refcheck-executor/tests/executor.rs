use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use refcheck_core::CancellationToken;
use refcheck_executor::{
    ExecutorConfig, ExecutorError, KeyValidationJob, Outcome, RejectReason, RequestJob,
    TaskFailure, TaskState, ValidationExecutor, ValidationJob,
};
use refcheck_ingest::{AccessProtocol, InMemoryFileAccess, IngestError};
use refcheck_model::{FileTypeSchema, ForeignKeySpec, SubmissionSchema};
use refcheck_schema::{ResolvedSchema, SchemaRegistry};
use refcheck_validate::{
    KeyValidationOutcome, KeyValidationRequest, KeyValidationService, KeyValidator,
    ValidationError,
};

const WAIT: Duration = Duration::from_secs(10);

fn schema() -> Arc<ResolvedSchema> {
    let schema = SubmissionSchema::new(vec![
        FileTypeSchema::new("donor", &["donor_id"]).with_primary_key(vec![0]),
        FileTypeSchema::new("specimen", &["specimen_id", "donor_id"])
            .with_primary_key(vec![0])
            .with_foreign_key(ForeignKeySpec::new("donor", vec![1]).surjective()),
    ])
    .expect("schema");
    Arc::new(ResolvedSchema::from_schema("test", schema).expect("resolved"))
}

fn access(projects: &[&str]) -> Arc<InMemoryFileAccess> {
    let access = InMemoryFileAccess::new();
    for project in projects {
        access.insert(project, "donor.txt", "donor_id\nDO1\nDO2\n");
        access.insert(project, "specimen.txt", "specimen_id\tdonor_id\nSP1\tDO1\n");
    }
    Arc::new(access)
}

fn validator(access: Arc<InMemoryFileAccess>) -> Arc<KeyValidator> {
    Arc::new(KeyValidator::new(schema(), access))
}

/// Holds a real validation until its gate opens, polling for cancellation.
struct GatedJob {
    inner: KeyValidationJob,
    project_key: String,
    started: Sender<String>,
    gate: Receiver<()>,
}

impl ValidationJob for GatedJob {
    fn project_key(&self) -> &str {
        &self.project_key
    }

    fn run(&self, token: &CancellationToken) -> Result<KeyValidationOutcome, ValidationError> {
        let name = thread::current().name().unwrap_or_default().to_string();
        let _ = self.started.send(name);
        loop {
            token.check()?;
            if self.gate.recv_timeout(Duration::from_millis(5)).is_ok() {
                break;
            }
        }
        self.inner.run(token)
    }
}

struct Gates {
    started_tx: Sender<String>,
    started: Receiver<String>,
    open_tx: Sender<()>,
    open: Receiver<()>,
}

impl Gates {
    fn new() -> Self {
        let (started_tx, started) = crossbeam_channel::unbounded();
        let (open_tx, open) = crossbeam_channel::unbounded();
        Self {
            started_tx,
            started,
            open_tx,
            open,
        }
    }

    fn job(&self, validator: &Arc<KeyValidator>, project_key: &str) -> GatedJob {
        GatedJob {
            inner: KeyValidationJob::new(Arc::clone(validator), project_key),
            project_key: project_key.to_string(),
            started: self.started_tx.clone(),
            gate: self.open.clone(),
        }
    }

    fn await_start(&self) -> String {
        self.started.recv_timeout(WAIT).expect("job started")
    }

    fn release(&self, count: usize) {
        for _ in 0..count {
            self.open_tx.send(()).expect("open gate");
        }
    }
}

struct PanickingJob;

impl ValidationJob for PanickingJob {
    fn project_key(&self) -> &str {
        "PANIC"
    }

    fn run(&self, _token: &CancellationToken) -> Result<KeyValidationOutcome, ValidationError> {
        panic!("digest exploded");
    }
}

fn wait(handle: &refcheck_executor::ValidationHandle) -> Outcome {
    handle.wait_timeout(WAIT).expect("task finished")
}

#[test]
fn over_capacity_submission_is_rejected_while_slots_run() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let validator = validator(access(&["P1", "P2", "P3"]));
    let gates = Gates::new();

    let first = executor.execute(gates.job(&validator, "P1")).expect("P1 accepted");
    let second = executor.execute(gates.job(&validator, "P2")).expect("P2 accepted");
    gates.await_start();
    gates.await_start();
    assert_eq!(first.state(), TaskState::Running);
    assert_eq!(second.state(), TaskState::Running);

    let err = executor
        .execute(gates.job(&validator, "P3"))
        .expect_err("over capacity");
    assert!(err.is_retryable());
    assert_eq!(
        err.reject_reason(),
        Some(&RejectReason::CapacityExhausted { capacity: 2 })
    );
    assert_eq!(first.state(), TaskState::Running);
    assert_eq!(executor.active_count(), 2);

    gates.release(2);
    assert!(matches!(wait(&first), Outcome::Completed(_)));
    assert!(matches!(wait(&second), Outcome::Completed(_)));
    assert_eq!(executor.active_count(), 0);

    let third = executor
        .execute(KeyValidationJob::new(Arc::clone(&validator), "P3"))
        .expect("slot freed");
    let outcome = wait(&third);
    let completed = outcome.completed().expect("completed");
    assert_eq!(completed.project_key, "P3");
    assert_eq!(completed.report.error_count(), 1);
}

#[test]
fn project_can_only_run_once_at_a_time() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let validator = validator(access(&["P1"]));
    let gates = Gates::new();

    let handle = executor.execute(gates.job(&validator, "P1")).expect("accepted");
    let err = executor
        .execute(gates.job(&validator, "P1"))
        .expect_err("duplicate project");
    assert_eq!(err.reject_reason(), Some(&RejectReason::ProjectActive));
    assert!(executor.is_active("P1"));

    gates.release(1);
    assert_eq!(wait(&handle).state(), TaskState::Completed);
}

#[test]
fn cancelling_a_running_task_discards_its_report() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let files = access(&["P1"]);
    let validator = validator(Arc::clone(&files));
    let gates = Gates::new();

    let handle = executor.execute(gates.job(&validator, "P1")).expect("accepted");
    gates.await_start();
    assert!(executor.cancel("P1"));

    assert!(matches!(wait(&handle), Outcome::Cancelled));
    assert_eq!(handle.state(), TaskState::Cancelled);
    assert!(!files.has_output("P1", "key-errors.jsonl"));
    assert!(!executor.cancel("P1"));
}

#[test]
fn task_cancelled_right_after_submission_ends_cancelled() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let files = access(&["P1"]);
    let gates = Gates::new();
    let handle = executor
        .execute(gates.job(&validator(Arc::clone(&files)), "P1"))
        .expect("accepted");
    handle.cancel();
    // Opened only after the cancel, so the run cannot finish first.
    gates.release(1);

    assert!(matches!(wait(&handle), Outcome::Cancelled));
    assert_eq!(handle.state(), TaskState::Cancelled);
    assert!(!files.has_output("P1", "key-errors.jsonl"));
}

#[test]
fn run_failure_is_propagated_with_its_cause() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let handle = executor
        .execute(KeyValidationJob::new(validator(access(&[])), "MISSING"))
        .expect("accepted");

    let outcome = wait(&handle);
    assert_eq!(outcome.state(), TaskState::Failed);
    match outcome.failure() {
        Some(TaskFailure::Job(err)) => assert!(matches!(
            err.as_ref(),
            ValidationError::Ingest(IngestError::ProjectNotFound { .. })
        )),
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[test]
fn panicking_task_fails_and_frees_its_slot() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default().with_capacity(1))
        .expect("executor");
    let handle = executor.execute(PanickingJob).expect("accepted");

    match wait(&handle) {
        Outcome::Failed(TaskFailure::Panicked(message)) => {
            assert_eq!(message, "digest exploded");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let next = executor
        .execute(KeyValidationJob::new(validator(access(&["P1"])), "P1"))
        .expect("worker survived the panic");
    assert_eq!(wait(&next).state(), TaskState::Completed);
}

#[test]
fn stop_cancels_running_tasks_and_rejects_new_ones() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let validator = validator(access(&["P1", "P2"]));
    let gates = Gates::new();

    let first = executor.execute(gates.job(&validator, "P1")).expect("P1");
    let second = executor.execute(gates.job(&validator, "P2")).expect("P2");
    gates.await_start();

    executor.stop();
    assert!(first.try_outcome().is_some());
    assert!(second.try_outcome().is_some());
    assert_eq!(first.state(), TaskState::Cancelled);
    assert_eq!(second.state(), TaskState::Cancelled);
    assert_eq!(executor.active_count(), 0);

    let err = executor
        .execute(KeyValidationJob::new(validator, "P1"))
        .expect_err("stopped");
    assert_eq!(err.reject_reason(), Some(&RejectReason::Stopped));
    assert!(!err.is_retryable());
}

#[test]
fn workers_carry_the_configured_name_prefix() {
    let config = ExecutorConfig::default()
        .with_capacity(1)
        .with_thread_name_prefix("keycheck");
    let executor = ValidationExecutor::new(&config).expect("executor");
    let validator = validator(access(&["P1"]));
    let gates = Gates::new();

    let handle = executor.execute(gates.job(&validator, "P1")).expect("accepted");
    assert_eq!(gates.await_start(), "keycheck-0");
    gates.release(1);
    wait(&handle);
}

#[test]
fn zero_capacity_is_refused() {
    let result = ValidationExecutor::new(&ExecutorConfig::default().with_capacity(0));
    assert!(matches!(result, Err(ExecutorError::ZeroCapacity)));
}

#[test]
fn request_jobs_resolve_through_the_service() {
    let registry = SchemaRegistry::new();
    let resolved = registry.insert(ResolvedSchema::clone(&schema()));
    let service = KeyValidationService::new(Arc::new(registry))
        .with_injected_access(access(&["P1"]));
    let request = KeyValidationRequest::new(resolved.release.clone(), "P1", "unused")
        .with_protocol(AccessProtocol::Memory);

    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let job = RequestJob::new(Arc::new(service), request);
    let handle = executor.execute(job).expect("accepted");

    let outcome = wait(&handle);
    let completed = outcome.completed().expect("completed");
    assert!(!completed.key_valid);
    assert_eq!(completed.report_location, "memory://P1/key-errors.jsonl");
}

#[test]
fn handles_can_be_waited_from_other_threads() {
    let executor = ValidationExecutor::new(&ExecutorConfig::default()).expect("executor");
    let handle = executor
        .execute(KeyValidationJob::new(validator(access(&["P1"])), "P1"))
        .expect("accepted");
    let states = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|scope| {
        for _ in 0..3 {
            let handle = handle.clone();
            let states = Arc::clone(&states);
            scope.spawn(move || {
                let outcome = handle.wait_timeout(WAIT).expect("finished");
                states.lock().push(outcome.state());
            });
        }
    });

    assert_eq!(*states.lock(), vec![TaskState::Completed; 3]);
}
