//! Key validation reports: self-describing error records streamed as JSON
//! lines, read back and summarized.

pub mod error;
pub mod record;
pub mod writer;

pub use error::{ReportError, Result};
pub use record::{ErrorParams, ErrorRecord};
pub use writer::{ReportSummary, ReportWriter, read_records};
