//! Key validation of one submission project.
//!
//! A run digests every file type once in dependency order: primary keys are
//! collected and checked for uniqueness, foreign keys are resolved against
//! their already complete parents, and keys that feed a surjection are
//! accumulated. Surjections are checked after all digests finish, and the
//! combined report is written as JSON lines through the project's file
//! access.

pub mod barrier;
pub mod digest;
pub mod engine;
pub mod error;
pub mod options;
pub mod relation;
pub mod surjection;

pub use barrier::{KeyBarrier, Publisher};
pub use digest::{KeyDigestBuilder, TypeDigest};
pub use engine::{
    KeyValidationOutcome, KeyValidationRequest, KeyValidationService, KeyValidator, RunStats,
};
pub use error::{Result, ValidationError};
pub use options::{
    DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_PROGRESS_INTERVAL, DEFAULT_REPORT_FILE_NAME,
    EngineOptions,
};
pub use relation::{RelationCheck, RelationOutcome};
pub use surjection::{Accumulators, SurjectionCheck, SurjectionKind};
