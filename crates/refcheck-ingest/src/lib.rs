//! Submission file access and tab-delimited row streaming.

pub mod access;
pub mod error;
pub mod local;
pub mod memory;
pub mod reader;

pub use access::{AccessProtocol, FileAccess, OutputSink, SubmissionFile};
pub use error::{IngestError, ParseFailure, ReadError, Result};
pub use local::LocalFileAccess;
pub use memory::InMemoryFileAccess;
pub use reader::{Row, TsvReader};
