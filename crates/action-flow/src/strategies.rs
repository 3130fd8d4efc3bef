//! Failure handling: classify a step's result under its failure policy

use crate::errors::FlowError;
use crate::types::{FailurePolicy, StepOutcome};
use tracing::warn;

/// Failure handler trait
pub trait FailureHandler: Send + Sync {
    /// Turn a step result into an outcome according to `policy`
    fn classify(
        &self,
        step: &str,
        policy: FailurePolicy,
        result: &Result<(), FlowError>,
    ) -> StepOutcome;
}

/// Default failure handler implementation
///
/// Abort-class errors (authentication, deadline, invalid flow) hard-fail no matter
/// what the step's policy says.
pub struct DefaultFailureHandler;

impl DefaultFailureHandler {
    /// Create a new default failure handler
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultFailureHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureHandler for DefaultFailureHandler {
    fn classify(
        &self,
        step: &str,
        policy: FailurePolicy,
        result: &Result<(), FlowError>,
    ) -> StepOutcome {
        let error = match result {
            Ok(()) => return StepOutcome::Success,
            Err(error) => error,
        };

        if error.is_abort_class() || policy == FailurePolicy::Abort {
            warn!(step, kind = error.kind(), "Step failed, aborting flow: {}", error);
            StepOutcome::HardFail(error.to_string())
        } else {
            warn!(
                step,
                kind = error.kind(),
                "Step failed, continuing to next step: {}",
                error
            );
            StepOutcome::SoftFail(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn test_success_ignores_policy() {
        let handler = DefaultFailureHandler::new();
        assert_eq!(
            handler.classify("more", FailurePolicy::Abort, &Ok(())),
            StepOutcome::Success
        );
    }

    #[test]
    fn test_policy_decides_soft_or_hard() {
        let handler = DefaultFailureHandler::new();
        let err = Err(FlowError::Resolution("no viable candidate".into()));

        assert!(matches!(
            handler.classify("filters", FailurePolicy::Continue, &err),
            StepOutcome::SoftFail(_)
        ));
        assert!(matches!(
            handler.classify("filters", FailurePolicy::Abort, &err),
            StepOutcome::HardFail(_)
        ));
    }

    #[test]
    fn test_authentication_is_always_hard() {
        let handler = DefaultFailureHandler::default();
        let err = Err(FlowError::Authentication(AuthError::UnexpectedLocation {
            expected: "atlassian.net".into(),
            actual: "https://id.atlassian.com/login".into(),
        }));
        assert!(matches!(
            handler.classify("login", FailurePolicy::Continue, &err),
            StepOutcome::HardFail(_)
        ));
    }
}
