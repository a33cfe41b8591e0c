//! Redaction of key values in log output.
//!
//! Submission keys identify donors, so they stay out of logs unless
//! row-level logging was switched on explicitly.

use std::sync::atomic::{AtomicBool, Ordering};

use refcheck_model::KeyTuple;

static KEY_LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder used when key logging is disabled.
pub const REDACTED_VALUE: &str = "[REDACTED]";

pub fn set_key_logging(enabled: bool) {
    KEY_LOGGING_ENABLED.store(enabled, Ordering::Release);
}

pub fn key_logging_enabled() -> bool {
    KEY_LOGGING_ENABLED.load(Ordering::Relaxed)
}

/// The key as text when key logging is enabled, otherwise a redacted token.
pub fn redact_key(key: &KeyTuple) -> String {
    if key_logging_enabled() {
        key.to_string()
    } else {
        REDACTED_VALUE.to_string()
    }
}
