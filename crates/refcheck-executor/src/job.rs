//! Units of work accepted by the executor.

use std::sync::Arc;

use refcheck_core::CancellationToken;
use refcheck_validate::{
    KeyValidationOutcome, KeyValidationRequest, KeyValidationService, KeyValidator,
    ValidationError,
};

/// One project's full validation run.
///
/// `run` must poll `token` at least once per file and return
/// [`ValidationError::Cancelled`] when it observes a cancellation.
pub trait ValidationJob: Send + 'static {
    fn project_key(&self) -> &str;

    fn run(&self, token: &CancellationToken) -> Result<KeyValidationOutcome, ValidationError>;
}

/// Validates one project with a prepared validator.
pub struct KeyValidationJob {
    validator: Arc<KeyValidator>,
    project_key: String,
}

impl KeyValidationJob {
    pub fn new(validator: Arc<KeyValidator>, project_key: impl Into<String>) -> Self {
        Self {
            validator,
            project_key: project_key.into(),
        }
    }
}

impl ValidationJob for KeyValidationJob {
    fn project_key(&self) -> &str {
        &self.project_key
    }

    fn run(&self, token: &CancellationToken) -> Result<KeyValidationOutcome, ValidationError> {
        self.validator.validate(&self.project_key, token)
    }
}

/// Resolves schema and file access from a request when the job starts.
pub struct RequestJob {
    service: Arc<KeyValidationService>,
    request: KeyValidationRequest,
}

impl RequestJob {
    pub fn new(service: Arc<KeyValidationService>, request: KeyValidationRequest) -> Self {
        Self { service, request }
    }

    pub fn request(&self) -> &KeyValidationRequest {
        &self.request
    }
}

impl ValidationJob for RequestJob {
    fn project_key(&self) -> &str {
        &self.request.project_key
    }

    fn run(&self, token: &CancellationToken) -> Result<KeyValidationOutcome, ValidationError> {
        self.service.invoke(&self.request, token)
    }
}
