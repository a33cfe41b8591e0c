use std::path::PathBuf;

use refcheck_model::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("failed to read dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON dictionary {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse TOML dictionary {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported dictionary format: {path} (expected .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("no dictionary found for release {release}")]
    UnknownRelease { release: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl DictionaryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DictionaryError>;
