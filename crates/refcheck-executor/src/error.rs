use std::fmt;

use thiserror::Error;

/// Why a submission was refused at admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Every slot is taken by a queued or running task.
    CapacityExhausted { capacity: usize },
    /// The project already has a task in flight.
    ProjectActive,
    /// The executor no longer accepts work.
    Stopped,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExhausted { capacity } => {
                write!(f, "all {capacity} validation slots are busy")
            }
            Self::ProjectActive => f.write_str("project is already being validated"),
            Self::Stopped => f.write_str("executor is stopped"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("validation of {project_key} rejected: {reason}")]
    Rejected {
        project_key: String,
        reason: RejectReason,
    },

    #[error("executor capacity must be at least 1")]
    ZeroCapacity,

    #[error("failed to start worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutorError {
    /// True when retrying after a slot frees up may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                reason: RejectReason::CapacityExhausted { .. } | RejectReason::ProjectActive,
                ..
            }
        )
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
