use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize error record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("malformed error record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("violation in {file_name} names unknown file type {file_type}")]
    UnknownFileType { file_name: String, file_type: String },
}

pub type Result<T> = std::result::Result<T, ReportError>;
