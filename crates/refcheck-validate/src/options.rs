use serde::{Deserialize, Serialize};

/// Default rows between cancellation polls inside one file.
pub const DEFAULT_CANCEL_CHECK_INTERVAL: u64 = 10_000;

/// Default rows between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;

/// Default name of the per-project report file.
pub const DEFAULT_REPORT_FILE_NAME: &str = "key-errors.jsonl";

/// Tuning for one key validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Digest file types with no dependency between them concurrently.
    /// Defaults to true.
    pub parallel_types: bool,

    /// Rows between cancellation polls inside one file.
    /// Defaults to 10 000; a file boundary is always a polling point.
    pub cancel_check_interval: u64,

    /// Rows between progress log lines. Defaults to 1 000 000.
    pub progress_interval: u64,

    /// Values meaning "not applicable" in optional foreign keys.
    /// Defaults to `["-888"]`.
    pub not_applicable_codes: Vec<String>,

    /// Report file written under the project's output directory.
    pub report_file_name: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallel_types: true,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            not_applicable_codes: vec!["-888".to_string()],
            report_file_name: DEFAULT_REPORT_FILE_NAME.to_string(),
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_parallel_types(mut self, parallel: bool) -> Self {
        self.parallel_types = parallel;
        self
    }

    #[must_use]
    pub fn with_cancel_check_interval(mut self, rows: u64) -> Self {
        self.cancel_check_interval = rows;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        self.progress_interval = rows;
        self
    }

    #[must_use]
    pub fn with_not_applicable_codes(mut self, codes: Vec<String>) -> Self {
        self.not_applicable_codes = codes;
        self
    }

    #[must_use]
    pub fn with_report_file_name(mut self, name: impl Into<String>) -> Self {
        self.report_file_name = name.into();
        self
    }

    pub(crate) fn cancel_every(&self) -> u64 {
        self.cancel_check_interval.max(1)
    }
}
