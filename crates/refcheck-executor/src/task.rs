//! Per-task state machine: Queued -> Running -> {Completed, Failed, Cancelled}.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use refcheck_core::CancellationToken;
use refcheck_validate::{KeyValidationOutcome, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Cause of a failed task.
#[derive(Debug, Clone)]
pub enum TaskFailure {
    /// The run returned an error other than cancellation.
    Job(Arc<ValidationError>),
    /// The run panicked; carries the panic message.
    Panicked(String),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(err) => write!(f, "{err}"),
            Self::Panicked(message) => write!(f, "validation panicked: {message}"),
        }
    }
}

/// Terminal result of a task.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed(Box<KeyValidationOutcome>),
    Failed(TaskFailure),
    Cancelled,
}

impl Outcome {
    pub fn state(&self) -> TaskState {
        match self {
            Self::Completed(_) => TaskState::Completed,
            Self::Failed(_) => TaskState::Failed,
            Self::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn completed(&self) -> Option<&KeyValidationOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome.as_ref()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

enum Progress {
    Queued,
    Running,
    Done(Outcome),
}

/// Shared between the executor, its worker and every handle.
pub(crate) struct TaskSlot {
    pub(crate) project_key: String,
    pub(crate) token: CancellationToken,
    progress: Mutex<Progress>,
    changed: Condvar,
}

impl TaskSlot {
    pub(crate) fn new(project_key: String) -> Arc<Self> {
        Arc::new(Self {
            project_key,
            token: CancellationToken::new(),
            progress: Mutex::new(Progress::Queued),
            changed: Condvar::new(),
        })
    }

    pub(crate) fn state(&self) -> TaskState {
        match &*self.progress.lock() {
            Progress::Queued => TaskState::Queued,
            Progress::Running => TaskState::Running,
            Progress::Done(outcome) => outcome.state(),
        }
    }

    /// Moves Queued to Running; false when the task already finished.
    pub(crate) fn start(&self) -> bool {
        let mut progress = self.progress.lock();
        match *progress {
            Progress::Queued => {
                *progress = Progress::Running;
                self.changed.notify_all();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn finish(&self, outcome: Outcome) {
        let mut progress = self.progress.lock();
        if !matches!(*progress, Progress::Done(_)) {
            *progress = Progress::Done(outcome);
            self.changed.notify_all();
        }
    }

    fn wait(&self) -> Outcome {
        let mut progress = self.progress.lock();
        loop {
            if let Progress::Done(outcome) = &*progress {
                return outcome.clone();
            }
            self.changed.wait(&mut progress);
        }
    }

    fn wait_until(&self, deadline: Instant) -> Option<Outcome> {
        let mut progress = self.progress.lock();
        let mut timed_out = false;
        loop {
            if let Progress::Done(outcome) = &*progress {
                return Some(outcome.clone());
            }
            if timed_out {
                return None;
            }
            timed_out = self.changed.wait_until(&mut progress, deadline).timed_out();
        }
    }

    fn try_outcome(&self) -> Option<Outcome> {
        match &*self.progress.lock() {
            Progress::Done(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }
}

/// Caller's view of an accepted task.
#[derive(Clone)]
pub struct ValidationHandle {
    slot: Arc<TaskSlot>,
}

impl ValidationHandle {
    pub(crate) fn new(slot: Arc<TaskSlot>) -> Self {
        Self { slot }
    }

    pub fn project_key(&self) -> &str {
        &self.slot.project_key
    }

    pub fn state(&self) -> TaskState {
        self.slot.state()
    }

    /// Signals the task; it ends Cancelled at its next polling point.
    pub fn cancel(&self) {
        self.slot.token.cancel();
    }

    /// Blocks until the task reaches a terminal state.
    pub fn wait(&self) -> Outcome {
        self.slot.wait()
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        self.slot.wait_until(Instant::now() + timeout)
    }

    pub fn try_outcome(&self) -> Option<Outcome> {
        self.slot.try_outcome()
    }
}

impl fmt::Debug for ValidationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationHandle")
            .field("project_key", &self.slot.project_key)
            .field("state", &self.slot.state())
            .finish()
    }
}
