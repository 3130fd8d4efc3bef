//! Error types for action primitives

use action_locator::LocatorError;
use cdp_adapter::AdapterError;
use thiserror::Error;

use crate::types::ReadyState;

/// Error types for waiting and interaction
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The target never reached the required readiness state in time
    #[error("Timed out after {elapsed_ms}ms waiting for {spec} to be {predicate}{}", last_suffix(.last_error))]
    Timeout {
        spec: String,
        predicate: ReadyState,
        elapsed_ms: u64,
        /// Whether any poll resolved an element at all
        resolved: bool,
        last_error: Option<String>,
    },

    /// Every technique of the chain failed
    #[error("All {attempts} techniques of {chain} failed on {handle}: {last_error}")]
    Interaction {
        handle: String,
        chain: String,
        attempts: usize,
        last_error: String,
    },

    /// Chain without techniques
    #[error("Invalid action chain: {0}")]
    InvalidChain(String),

    /// The locator itself cannot be resolved, regardless of page state
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Driver failure outside of the technique chain
    #[error("Driver error: {0}")]
    Driver(String),
}

fn last_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last: {})", e))
        .unwrap_or_default()
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        ActionError::Driver(err.to_string())
    }
}
