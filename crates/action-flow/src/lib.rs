//! Flow orchestration layer
//!
//! A [`Flow`] is an ordered list of nodes (navigation, settling, login, actions)
//! executed under one run-level deadline. Each action step resolves its locator,
//! waits for readiness, then walks its technique chain. A failing step either
//! hard-fails the run or is recorded as a soft failure, depending on its
//! [`FailurePolicy`] and on the error class.

pub mod auth;
pub mod errors;
pub mod executor;
pub mod strategies;
pub mod types;

pub use auth::{AuthError, AuthStep, Authenticator, Credentials, Session};
pub use errors::FlowError;
pub use executor::{DefaultFlowExecutor, FlowExecutor};
pub use strategies::{DefaultFailureHandler, FailureHandler};
pub use types::{
    Diagnostic, FailurePolicy, FallbackRecord, Flow, FlowNode, FlowReport, NavigateNode,
    RecoveryNavigation, RunOutcome, SettleNode, Step, StepFallback, StepOutcome, StepRecord,
    StepState,
};
