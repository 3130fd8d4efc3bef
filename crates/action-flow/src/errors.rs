//! Flow execution error types

use action_locator::LocatorError;
use action_primitives::ActionError;
use cdp_adapter::AdapterError;
use thiserror::Error;

use crate::auth::AuthError;

/// Flow execution errors
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// Flow validation failed
    #[error("Flow validation failed: {0}")]
    ValidationFailed(String),

    /// No candidate of the locator ever matched
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// The element was found but never became ready
    #[error("Wait failed: {0}")]
    Timeout(String),

    /// Every technique of the interaction chain failed
    #[error("Interaction failed: {0}")]
    Interaction(String),

    /// Navigation or load-state wait failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Login could not be completed
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Run-level deadline exhausted
    #[error("Flow deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),
}

impl FlowError {
    /// Errors that end the run regardless of the step's failure policy
    pub fn is_abort_class(&self) -> bool {
        matches!(
            self,
            FlowError::ValidationFailed(_)
                | FlowError::Authentication(_)
                | FlowError::DeadlineExceeded(_)
        )
    }

    /// Short machine-friendly category, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::ValidationFailed(_) => "validation",
            FlowError::Resolution(_) => "resolution",
            FlowError::Timeout(_) => "timeout",
            FlowError::Interaction(_) => "interaction",
            FlowError::Navigation(_) => "navigation",
            FlowError::Authentication(_) => "authentication",
            FlowError::DeadlineExceeded(_) => "deadline",
        }
    }
}

impl From<ActionError> for FlowError {
    fn from(err: ActionError) -> Self {
        match &err {
            ActionError::Timeout {
                resolved: false, ..
            }
            | ActionError::Locator(_) => FlowError::Resolution(err.to_string()),
            ActionError::Timeout { .. } => FlowError::Timeout(err.to_string()),
            ActionError::Interaction { .. } => FlowError::Interaction(err.to_string()),
            ActionError::InvalidChain(_) => FlowError::ValidationFailed(err.to_string()),
            ActionError::Driver(_) => FlowError::Interaction(err.to_string()),
        }
    }
}

impl From<LocatorError> for FlowError {
    fn from(err: LocatorError) -> Self {
        FlowError::Resolution(err.to_string())
    }
}

impl From<AdapterError> for FlowError {
    fn from(err: AdapterError) -> Self {
        FlowError::Navigation(err.to_string())
    }
}
