use std::path::PathBuf;

use thiserror::Error;

/// Failures of the file-access capability.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Project directory not found.
    #[error("project directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open a submission file.
    #[error("failed to open file {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create an output file.
    #[error("failed to create file {path}: {source}")]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Capability Errors ===
    /// File not known to an in-memory capability.
    #[error("file not found: {project_key}/{file_name}")]
    FileNotFound {
        project_key: String,
        file_name: String,
    },

    /// Project not known to an in-memory capability.
    #[error("project not found: {project_key}")]
    ProjectNotFound { project_key: String },

    /// Input protocol other than `file` or `memory`.
    #[error("unsupported input protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },
}

/// A file whose contents cannot be keyed.
///
/// Fatal for the run: once column alignment is broken, key extraction
/// cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("{file_name}: missing header row")]
    MissingHeader { file_name: String },

    #[error("{file_name}: header {found:?} does not match declared fields {expected:?}")]
    HeaderMismatch {
        file_name: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("{file_name}:{line}: expected {expected} fields, found {found}")]
    FieldCount {
        file_name: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{file_name}:{line}: invalid UTF-8")]
    Encoding { file_name: String, line: u64 },

    #[error("{file_name}: malformed input: {message}")]
    Malformed { file_name: String, message: String },
}

/// Error while streaming rows out of one file.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("failed to read {file_name}: {source}")]
    Io {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    pub(crate) fn from_csv(file_name: &str, err: csv::Error) -> Self {
        let line = err.position().map_or(0, csv::Position::line);
        match err.into_kind() {
            csv::ErrorKind::Io(source) => Self::Io {
                file_name: file_name.to_string(),
                source,
            },
            csv::ErrorKind::Utf8 { .. } => ParseFailure::Encoding {
                file_name: file_name.to_string(),
                line,
            }
            .into(),
            other => ParseFailure::Malformed {
                file_name: file_name.to_string(),
                message: format!("{other:?}"),
            }
            .into(),
        }
    }
}

/// Result type for file-access operations.
pub type Result<T> = std::result::Result<T, IngestError>;
