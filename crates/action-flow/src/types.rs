//! Core types for flow orchestration

use action_locator::LocatorSpec;
use action_primitives::{ActionChain, TechniqueKind, WaitPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use waypoint_core_types::{DomScope, LoadState};

use crate::auth::AuthStep;

/// What a failing step does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Hard-fail the run; remaining steps are aborted
    Abort,

    /// Record a soft failure and move on
    Continue,
}

/// Lifecycle of a single step within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    SoftFailed,
    HardFailed,
    Aborted,
}

/// Classified result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    SoftFail(String),
    HardFail(String),
}

impl StepOutcome {
    pub fn state(&self) -> StepState {
        match self {
            StepOutcome::Success => StepState::Succeeded,
            StepOutcome::SoftFail(_) => StepState::SoftFailed,
            StepOutcome::HardFail(_) => StepState::HardFailed,
        }
    }
}

/// Recovery navigation used when a step cannot be completed in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryNavigation {
    /// Absolute URL, or a path joined onto the flow's base URL
    pub target: String,
    pub readiness: LoadState,
    /// Skip the navigation if the current URL already contains this
    pub unless_url_contains: Option<String>,
}

/// What to try once a step's primary path has failed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFallback {
    /// An alternative step, e.g. clicking a label instead of checking a box
    Step(Box<Step>),

    Recover(RecoveryNavigation),
}

/// One semantic interaction: resolve, wait, act
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub name: String,
    pub locator: LocatorSpec,
    #[serde(skip)]
    pub scope: DomScope,
    pub wait: WaitPolicy,
    pub chain: ActionChain,
    pub failure_policy: FailurePolicy,
    pub post_delay_ms: u64,

    /// Scroll the element into view first, then pause this long
    pub scroll_settle_ms: Option<u64>,

    /// Load state to wait for after a successful interaction
    pub settle_after: Option<LoadState>,

    pub fallback: Option<StepFallback>,
}

impl Step {
    /// Create an abort-on-failure step with no post delay
    pub fn new(
        name: impl Into<String>,
        locator: LocatorSpec,
        wait: WaitPolicy,
        chain: ActionChain,
    ) -> Self {
        Self {
            name: name.into(),
            locator,
            scope: DomScope::Document,
            wait,
            chain,
            failure_policy: FailurePolicy::Abort,
            post_delay_ms: 0,
            scroll_settle_ms: None,
            settle_after: None,
            fallback: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn continue_on_failure(self) -> Self {
        self.with_policy(FailurePolicy::Continue)
    }

    pub fn with_post_delay(mut self, delay_ms: u64) -> Self {
        self.post_delay_ms = delay_ms;
        self
    }

    pub fn within(mut self, scope: DomScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scroll_first(mut self, settle_ms: u64) -> Self {
        self.scroll_settle_ms = Some(settle_ms);
        self
    }

    pub fn settle_after(mut self, state: LoadState) -> Self {
        self.settle_after = Some(state);
        self
    }

    pub fn with_fallback(mut self, fallback: StepFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Load a URL
#[derive(Debug, Clone, Serialize)]
pub struct NavigateNode {
    pub name: String,
    /// Absolute URL, or a path joined onto the flow's base URL
    pub target: String,
    pub readiness: LoadState,
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl NavigateNode {
    pub fn new(name: impl Into<String>, target: impl Into<String>, readiness: LoadState) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            readiness,
            timeout_ms: 30_000,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Wait for a load state and/or a fixed delay
#[derive(Debug, Clone, Serialize)]
pub struct SettleNode {
    pub name: String,
    pub load_state: Option<LoadState>,
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl SettleNode {
    pub fn new(name: impl Into<String>, load_state: Option<LoadState>, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            load_state,
            delay_ms,
            timeout_ms: 30_000,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// One entry of the scripted sequence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowNode {
    Navigate(NavigateNode),
    Settle(SettleNode),
    Authenticate(AuthStep),
    Action(Step),
}

impl FlowNode {
    pub fn name(&self) -> &str {
        match self {
            FlowNode::Navigate(node) => &node.name,
            FlowNode::Settle(node) => &node.name,
            FlowNode::Authenticate(step) => &step.name,
            FlowNode::Action(step) => &step.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FlowNode::Navigate(_) => "navigate",
            FlowNode::Settle(_) => "settle",
            FlowNode::Authenticate(_) => "authenticate",
            FlowNode::Action(_) => "action",
        }
    }

    /// Authentication failures always abort the run
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            FlowNode::Navigate(node) => node.failure_policy,
            FlowNode::Settle(node) => node.failure_policy,
            FlowNode::Authenticate(_) => FailurePolicy::Abort,
            FlowNode::Action(step) => step.failure_policy,
        }
    }

    pub fn post_delay_ms(&self) -> u64 {
        match self {
            FlowNode::Action(step) => step.post_delay_ms,
            _ => 0,
        }
    }
}

/// Flow definition: an ordered sequence of nodes under one deadline
#[derive(Debug, Clone, Serialize)]
pub struct Flow {
    pub name: String,
    pub base_url: String,
    pub nodes: Vec<FlowNode>,

    /// Run-level deadline in milliseconds
    pub timeout_ms: u64,
}

impl Flow {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            nodes: Vec::new(),
            timeout_ms: 120_000,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn then(mut self, node: FlowNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn navigate(self, node: NavigateNode) -> Self {
        self.then(FlowNode::Navigate(node))
    }

    pub fn settle(self, node: SettleNode) -> Self {
        self.then(FlowNode::Settle(node))
    }

    pub fn authenticate(self, step: AuthStep) -> Self {
        self.then(FlowNode::Authenticate(step))
    }

    pub fn step(self, step: Step) -> Self {
        self.then(FlowNode::Action(step))
    }

    /// Join a path onto the base URL; absolute URLs pass through.
    pub fn resolve_url(&self, target: &str) -> String {
        resolve_url(&self.base_url, target)
    }
}

/// Unparsable bases are rejected by flow validation; here they leave `target` as is.
pub(crate) fn resolve_url(base: &str, target: &str) -> String {
    if target.is_empty() {
        return base.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(target))
        .map(String::from)
        .unwrap_or_else(|_| target.to_string())
}

/// How a step's fallback went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRecord {
    /// `step:<name>` or `navigate:<url>`
    pub action: String,
    pub recovered: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

/// Per-node entry of the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub kind: String,
    pub policy: FailurePolicy,
    pub state: StepState,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub candidate_index: Option<usize>,
    pub technique: Option<TechniqueKind>,
    pub fallback: Option<FallbackRecord>,
    pub note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub latency_ms: u64,
}

impl StepRecord {
    pub fn pending(node: &FlowNode) -> Self {
        Self {
            name: node.name().to_string(),
            kind: node.kind().to_string(),
            policy: node.failure_policy(),
            state: StepState::Pending,
            error: None,
            error_kind: None,
            candidate_index: None,
            technique: None,
            fallback: None,
            note: None,
            started_at: None,
            latency_ms: 0,
        }
    }
}

/// Non-fatal failure retained for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub step: String,
    pub error: String,
    pub recovered: bool,
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    HardFailed,
}

/// Flow execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    /// Unique id of this run
    pub run_id: String,
    pub flow_name: String,
    pub outcome: RunOutcome,
    pub steps: Vec<StepRecord>,
    pub diagnostics: Vec<Diagnostic>,

    /// Reason for a hard failure
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl FlowReport {
    pub fn new(flow: &Flow) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            flow_name: flow.name.clone(),
            outcome: RunOutcome::Succeeded,
            steps: flow.nodes.iter().map(StepRecord::pending).collect(),
            diagnostics: Vec::new(),
            error: None,
            started_at: now,
            finished_at: now,
            latency_ms: 0,
        }
    }

    /// Mark as failure
    pub fn with_error(mut self, error: String) -> Self {
        self.outcome = RunOutcome::HardFailed;
        self.error = Some(error);
        self
    }

    /// Set finish time and calculate latency
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.name == name)
    }

    pub fn count(&self, state: StepState) -> usize {
        self.steps.iter().filter(|record| record.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_onto_the_base() {
        let flow = Flow::new("jira", "https://acme.atlassian.net/");
        assert_eq!(
            flow.resolve_url("/issues/"),
            "https://acme.atlassian.net/issues/"
        );
        assert_eq!(flow.resolve_url("login"), "https://acme.atlassian.net/login");
        assert_eq!(flow.resolve_url(""), "https://acme.atlassian.net/");
        assert_eq!(
            flow.resolve_url("https://id.example.com/login"),
            "https://id.example.com/login"
        );
        assert_eq!(
            flow.resolve_url("/issues/?filter=all"),
            "https://acme.atlassian.net/issues/?filter=all"
        );
    }

    #[test]
    fn outcome_maps_to_state() {
        assert_eq!(StepOutcome::Success.state(), StepState::Succeeded);
        assert_eq!(
            StepOutcome::SoftFail("x".into()).state(),
            StepState::SoftFailed
        );
        assert_eq!(
            StepOutcome::HardFail("x".into()).state(),
            StepState::HardFailed
        );
    }
}
