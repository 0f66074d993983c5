//! Workflow error types.

use std::fmt;

use crvs_auth::TokenError;
use crvs_core::CoreError;

use crate::gateway::GatewayError;
use crate::status::RegistrationStatus;

/// Errors that abort a registration lifecycle entry point.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The bundle is empty or its first entry carries no resource.
    #[error("Invalid FHIR bundle: {message}")]
    InvalidBundle { message: String },

    /// No Task resource could be found or used.
    #[error("Invalid Task resource: {message}")]
    InvalidTask { message: String },

    /// The acting practitioner is missing or has no id.
    #[error("Invalid practitioner: {message}")]
    InvalidPractitioner { message: String },

    /// The target status equals the persisted one, or the record is already
    /// in a terminal status.
    #[error("Declaration {task_id} is already in {status} state")]
    DuplicateStatus {
        task_id: String,
        status: RegistrationStatus,
    },

    /// A backing store or numbering service call failed.
    #[error("External lookup failed: {0}")]
    ExternalLookup(#[from] GatewayError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    #[must_use]
    pub fn invalid_bundle(message: impl Into<String>) -> Self {
        Self::InvalidBundle {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_task(message: impl Into<String>) -> Self {
        Self::InvalidTask {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_practitioner(message: impl Into<String>) -> Self {
        Self::InvalidPractitioner {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn duplicate_status(task_id: impl Into<String>, status: RegistrationStatus) -> Self {
        Self::DuplicateStatus {
            task_id: task_id.into(),
            status,
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    #[must_use]
    pub fn is_duplicate_status(&self) -> bool {
        matches!(self, Self::DuplicateStatus { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidBundle { .. }
            | Self::InvalidTask { .. }
            | Self::InvalidPractitioner { .. } => ErrorCategory::Validation,
            Self::DuplicateStatus { .. } => ErrorCategory::Conflict,
            Self::ExternalLookup(_) => ErrorCategory::Upstream,
            Self::InvalidToken(_) => ErrorCategory::Authentication,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

impl From<CoreError> for WorkflowError {
    fn from(err: CoreError) -> Self {
        Self::invalid_task(err.to_string())
    }
}

/// Categories of workflow errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    Upstream,
    Authentication,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Upstream => write!(f, "upstream"),
            Self::Authentication => write!(f, "authentication"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Type alias for a workflow result.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::duplicate_status("task-1", RegistrationStatus::Declared);
        assert_eq!(err.to_string(), "Declaration task-1 is already in DECLARED state");
        assert!(err.is_duplicate_status());

        let err = WorkflowError::invalid_bundle("bundle has no entries");
        assert_eq!(err.to_string(), "Invalid FHIR bundle: bundle has no entries");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            WorkflowError::invalid_task("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            WorkflowError::duplicate_status("t", RegistrationStatus::Certified).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            WorkflowError::from(GatewayError::Http {
                url: "http://fhir/Task/1".to_string(),
                status: 500
            })
            .category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            WorkflowError::from(TokenError::Missing).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(ErrorCategory::Upstream.to_string(), "upstream");
    }
}
