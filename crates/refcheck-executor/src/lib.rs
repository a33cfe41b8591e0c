//! Bounded, cancellable execution of key validations.
//!
//! Each accepted project runs to completion, failure or cancellation on one
//! worker of a fixed pool. Over-capacity submissions are rejected at once
//! and the caller decides when to retry.

pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod task;

pub use config::{DEFAULT_CAPACITY, DEFAULT_THREAD_NAME_PREFIX, ExecutorConfig};
pub use error::{ExecutorError, RejectReason, Result};
pub use executor::ValidationExecutor;
pub use job::{KeyValidationJob, RequestJob, ValidationJob};
pub use task::{Outcome, TaskFailure, TaskState, ValidationHandle};
