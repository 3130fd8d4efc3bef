use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by page drivers.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("element not interactable")]
    NotInteractable,
    #[error("stale element handle")]
    StaleHandle,
    #[error("operation timed out")]
    Timeout,
    #[error("invalid query")]
    InvalidQuery,
    #[error("internal error")]
    Internal,
}

/// Error returned by page drivers: a category plus a human-readable hint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }

    pub fn io(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(hint)
    }

    pub fn stale(node_ref: &str) -> Self {
        Self::new(AdapterErrorKind::StaleHandle)
            .with_hint(format!("element '{}' is no longer attached", node_ref))
    }

    pub fn not_interactable(reason: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::NotInteractable).with_hint(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::not_interactable("covered by <div class=\"overlay\">");
        assert_eq!(
            err.to_string(),
            "element not interactable: covered by <div class=\"overlay\">"
        );
        assert_eq!(err.kind, AdapterErrorKind::NotInteractable);
    }

    #[test]
    fn stale_handles_name_the_ref() {
        let err = AdapterError::stale("abcd-1");
        assert_eq!(err.kind, AdapterErrorKind::StaleHandle);
        assert_eq!(
            err.to_string(),
            "stale element handle: element 'abcd-1' is no longer attached"
        );
    }
}
