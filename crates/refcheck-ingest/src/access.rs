//! The file-access capability handed to the digest builder.

use std::fmt;
use std::io::{BufReader, Read, Write};
use std::str::FromStr;

use flate2::read::MultiGzDecoder;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// A physical file of one project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmissionFile {
    /// Bare file name, used in reports.
    pub name: String,
    /// Capability-specific location (a path for local files).
    pub location: String,
}

impl SubmissionFile {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.name.ends_with(".gz")
    }
}

/// An open destination for the error report.
pub struct OutputSink {
    pub location: String,
    pub writer: Box<dyn Write + Send>,
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Lists, opens and creates project files.
///
/// Passed explicitly to every run; implementations must be shareable
/// across the runs of one executor.
pub trait FileAccess: Send + Sync {
    /// Files of `project_key` whose name matches `pattern`, sorted by name.
    fn list(&self, project_key: &str, pattern: &Regex) -> Result<Vec<SubmissionFile>>;

    /// Raw (possibly compressed) contents of `file`.
    fn open_raw(&self, file: &SubmissionFile) -> Result<Box<dyn Read + Send>>;

    /// Creates or truncates `file_name` in the project's output location.
    fn create(&self, project_key: &str, file_name: &str) -> Result<OutputSink>;

    /// Decoded contents of `file`; `.gz` files are decompressed.
    fn open(&self, file: &SubmissionFile) -> Result<Box<dyn Read + Send>> {
        let raw = self.open_raw(file)?;
        if file.is_compressed() {
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(raw))))
        } else {
            Ok(raw)
        }
    }
}

/// How a run reaches its input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessProtocol {
    /// Local file system under the input root.
    #[default]
    File,
    /// The capability injected by the caller, e.g. in-memory contents.
    Memory,
}

impl AccessProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for AccessProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessProtocol {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            _ => Err(IngestError::UnsupportedProtocol {
                protocol: value.to_string(),
            }),
        }
    }
}
