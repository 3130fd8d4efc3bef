//! Error types for element resolution

use thiserror::Error;
use waypoint_core_types::QueryError;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The locator itself is malformed (no candidates, bad pattern)
    #[error("Invalid locator '{label}': {reason}")]
    InvalidSpec { label: String, reason: String },

    /// Every candidate was tried and none matched anything
    #[error("No viable candidate for {spec} in {scope} ({tried} candidates tried)")]
    NoViableCandidate {
        spec: String,
        scope: String,
        tried: usize,
    },
}

impl LocatorError {
    pub(crate) fn invalid(label: &str, err: QueryError) -> Self {
        LocatorError::InvalidSpec {
            label: label.to_string(),
            reason: err.to_string(),
        }
    }

    /// Resolution misses may clear up once the page renders; malformed specs never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::NoViableCandidate { .. })
    }
}
