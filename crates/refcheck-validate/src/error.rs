use thiserror::Error;

use refcheck_core::Cancelled;
use refcheck_ingest::{IngestError, ParseFailure, ReadError};
use refcheck_model::SchemaError;
use refcheck_report::ReportError;
use refcheck_schema::DictionaryError;

/// Why a key validation run did not complete.
///
/// Recoverable violations never appear here; they are only reported
/// through the submission report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    // === Before any file is opened ===
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    // === While digesting ===
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to read {file_name}: {source}")]
    Read {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start digest thread for {file_type}: {source}")]
    Thread {
        file_type: String,
        #[source]
        source: std::io::Error,
    },

    // === Reporting ===
    #[error(transparent)]
    Report(#[from] ReportError),

    // === Execution status ===
    #[error("validation cancelled")]
    Cancelled,

    /// A digest stopped because a type it depends on did not complete.
    /// Never returned from a run; resolved to the failure that caused it.
    #[error("digest of {file_type} aborted after an upstream failure")]
    Aborted { file_type: String },
}

impl ValidationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for errors that only follow from another failure in the run.
    pub(crate) fn is_secondary(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Aborted { .. })
    }
}

impl From<Cancelled> for ValidationError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<ReadError> for ValidationError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Parse(failure) => Self::Parse(failure),
            ReadError::Io { file_name, source } => Self::Read { file_name, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;
