//! Flow executor implementation

use crate::auth::Authenticator;
use crate::errors::FlowError;
use crate::strategies::{DefaultFailureHandler, FailureHandler};
use crate::types::*;
use action_locator::{DefaultElementResolver, ElementResolver};
use action_primitives::{
    ActionPrimitives, DefaultActionPrimitives, DefaultWaitStrategy, TechniqueKind, WaitStrategy,
};
use async_trait::async_trait;
use cdp_adapter::PageDriver;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Flow executor trait
#[async_trait]
pub trait FlowExecutor: Send + Sync {
    /// Execute a flow. Only validation problems are returned as `Err`; step
    /// failures are reported in the [`FlowReport`].
    async fn execute(&self, flow: &Flow) -> Result<FlowReport, FlowError>;

    /// Validate flow structure
    fn validate_flow(&self, flow: &Flow) -> Result<(), FlowError>;
}

/// What a step got to before it finished or failed
#[derive(Debug, Default)]
struct StepProgress {
    candidate_index: Option<usize>,
    technique: Option<TechniqueKind>,
}

/// Default flow executor implementation
pub struct DefaultFlowExecutor {
    driver: Arc<dyn PageDriver>,
    waiter: Arc<dyn WaitStrategy>,
    primitives: Arc<dyn ActionPrimitives>,
    failure_handler: Arc<dyn FailureHandler>,
    authenticator: Authenticator,
}

impl DefaultFlowExecutor {
    /// Wire the default resolver, wait strategy and primitives around `driver`
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        let resolver: Arc<dyn ElementResolver> =
            Arc::new(DefaultElementResolver::new(driver.clone()));
        let waiter: Arc<dyn WaitStrategy> =
            Arc::new(DefaultWaitStrategy::new(resolver.clone(), driver.clone()));
        let primitives: Arc<dyn ActionPrimitives> =
            Arc::new(DefaultActionPrimitives::new(driver.clone()));
        Self::with_components(
            driver,
            resolver,
            waiter,
            primitives,
            Arc::new(DefaultFailureHandler::new()),
        )
    }

    pub fn with_components(
        driver: Arc<dyn PageDriver>,
        resolver: Arc<dyn ElementResolver>,
        waiter: Arc<dyn WaitStrategy>,
        primitives: Arc<dyn ActionPrimitives>,
        failure_handler: Arc<dyn FailureHandler>,
    ) -> Self {
        let authenticator = Authenticator::new(
            driver.clone(),
            resolver,
            waiter.clone(),
            primitives.clone(),
        );
        Self {
            driver,
            waiter,
            primitives,
            failure_handler,
            authenticator,
        }
    }

    /// Execute a flow node
    async fn execute_node(
        &self,
        flow: &Flow,
        node: &FlowNode,
        record: &mut StepRecord,
    ) -> Result<(), FlowError> {
        match node {
            FlowNode::Navigate(nav) => {
                let url = flow.resolve_url(&nav.target);
                debug!(url = %url, readiness = nav.readiness.name(), "Navigating");
                self.driver
                    .navigate(&url, nav.readiness, Duration::from_millis(nav.timeout_ms))
                    .await?;
                Ok(())
            }

            FlowNode::Settle(settle) => {
                if let Some(state) = settle.load_state {
                    self.driver
                        .wait_for_load_state(state, Duration::from_millis(settle.timeout_ms))
                        .await?;
                }
                if settle.delay_ms > 0 {
                    self.driver
                        .delay(Duration::from_millis(settle.delay_ms))
                        .await;
                }
                Ok(())
            }

            FlowNode::Authenticate(step) => {
                record.note = Some(match self.authenticator.ensure_session(step).await? {
                    Some(session) => format!("session {} established", session.id.0),
                    None => "already authenticated".to_string(),
                });
                Ok(())
            }

            FlowNode::Action(step) => {
                let mut progress = StepProgress::default();
                let result = self.run_step(step, &mut progress).await;
                record.candidate_index = progress.candidate_index;
                record.technique = progress.technique;

                if let (Err(err), Some(fallback)) = (&result, &step.fallback) {
                    debug!(step = %step.name, "Primary path failed ({}), trying fallback", err);
                    record.fallback = Some(self.run_fallback(flow, fallback).await);
                }
                result
            }
        }
    }

    /// Resolve and wait, optionally scroll, act, optionally settle
    async fn run_step(&self, step: &Step, progress: &mut StepProgress) -> Result<(), FlowError> {
        let resolution = self
            .waiter
            .await_ready(&step.locator, &step.scope, &step.wait)
            .await?;
        progress.candidate_index = Some(resolution.candidate_index);

        if let Some(settle_ms) = step.scroll_settle_ms {
            if let Err(err) = self.primitives.scroll_into_view(&resolution.handle).await {
                warn!(step = %step.name, "Scroll into view failed: {}", err);
            }
            self.driver.delay(Duration::from_millis(settle_ms)).await;
        }

        let report = self
            .primitives
            .perform(&resolution.handle, &step.chain)
            .await?;
        progress.technique = Some(report.technique);

        if let Some(state) = step.settle_after {
            self.driver.wait_for_load_state(state, SETTLE_TIMEOUT).await?;
        }
        Ok(())
    }

    async fn run_fallback(&self, flow: &Flow, fallback: &StepFallback) -> FallbackRecord {
        match fallback {
            StepFallback::Step(alternative) => {
                let action = format!("step:{}", alternative.name);
                let mut progress = StepProgress::default();
                match self.run_step(alternative, &mut progress).await {
                    Ok(()) => {
                        info!(fallback = %action, "Fallback recovered step");
                        FallbackRecord {
                            action,
                            recovered: true,
                            skipped: false,
                            error: None,
                        }
                    }
                    Err(err) => {
                        warn!(fallback = %action, "Fallback failed: {}", err);
                        FallbackRecord {
                            action,
                            recovered: false,
                            skipped: false,
                            error: Some(err.to_string()),
                        }
                    }
                }
            }

            StepFallback::Recover(nav) => {
                let url = flow.resolve_url(&nav.target);
                let action = format!("navigate:{}", url);

                if let Some(marker) = &nav.unless_url_contains {
                    let current = self.driver.current_url().await.unwrap_or_default();
                    if current.contains(marker.as_str()) {
                        info!(fallback = %action, current = %current, "Already at recovery target");
                        return FallbackRecord {
                            action,
                            recovered: true,
                            skipped: true,
                            error: None,
                        };
                    }
                }

                match self
                    .driver
                    .navigate(&url, nav.readiness, RECOVERY_TIMEOUT)
                    .await
                {
                    Ok(()) => {
                        info!(fallback = %action, "Recovered by navigation");
                        FallbackRecord {
                            action,
                            recovered: true,
                            skipped: false,
                            error: None,
                        }
                    }
                    Err(err) => {
                        warn!(fallback = %action, "Recovery navigation failed: {}", err);
                        FallbackRecord {
                            action,
                            recovered: false,
                            skipped: false,
                            error: Some(err.to_string()),
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl FlowExecutor for DefaultFlowExecutor {
    async fn execute(&self, flow: &Flow) -> Result<FlowReport, FlowError> {
        self.validate_flow(flow)?;

        info!(
            flow = %flow.name,
            nodes = flow.nodes.len(),
            timeout_ms = flow.timeout_ms,
            "Executing flow"
        );

        let mut report = FlowReport::new(flow);
        let deadline = Instant::now() + Duration::from_millis(flow.timeout_ms);
        let mut hard_failure: Option<String> = None;

        for (index, node) in flow.nodes.iter().enumerate() {
            let record = &mut report.steps[index];
            if hard_failure.is_some() {
                record.state = StepState::Aborted;
                continue;
            }

            record.state = StepState::Running;
            record.started_at = Some(Utc::now());
            let node_start = Instant::now();
            info!(step = node.name(), kind = node.kind(), "Step running");

            let result = if node_start >= deadline {
                Err(FlowError::DeadlineExceeded(flow.timeout_ms))
            } else {
                let remaining = deadline - node_start;
                match timeout(remaining, self.execute_node(flow, node, record)).await {
                    Ok(result) => result,
                    Err(_) => Err(FlowError::DeadlineExceeded(flow.timeout_ms)),
                }
            };
            record.latency_ms = node_start.elapsed().as_millis() as u64;

            let outcome = self
                .failure_handler
                .classify(node.name(), node.failure_policy(), &result);
            record.state = outcome.state();
            if let Err(err) = &result {
                record.error = Some(err.to_string());
                record.error_kind = Some(err.kind().to_string());
            }

            match outcome {
                StepOutcome::Success => {
                    info!(step = node.name(), latency_ms = record.latency_ms, "Step succeeded");
                }
                StepOutcome::SoftFail(reason) => {
                    let recovered = record
                        .fallback
                        .as_ref()
                        .map(|fallback| fallback.recovered)
                        .unwrap_or(false);
                    report.diagnostics.push(Diagnostic {
                        step: node.name().to_string(),
                        error: reason,
                        recovered,
                    });
                }
                StepOutcome::HardFail(reason) => {
                    hard_failure = Some(format!("{}: {}", node.name(), reason));
                    continue;
                }
            }

            let post_delay = Duration::from_millis(node.post_delay_ms());
            if !post_delay.is_zero() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.driver.delay(post_delay.min(remaining)).await;
            }
        }

        let report = match hard_failure {
            Some(error) => report.with_error(error),
            None => report,
        }
        .finish();

        info!(
            flow = %flow.name,
            outcome = ?report.outcome,
            soft_failures = report.diagnostics.len(),
            latency_ms = report.latency_ms,
            "Flow finished"
        );
        Ok(report)
    }

    fn validate_flow(&self, flow: &Flow) -> Result<(), FlowError> {
        if flow.name.trim().is_empty() {
            return Err(FlowError::ValidationFailed(
                "Flow name cannot be empty".to_string(),
            ));
        }
        if flow.nodes.is_empty() {
            return Err(FlowError::ValidationFailed(
                "Flow has no steps".to_string(),
            ));
        }
        if flow.timeout_ms == 0 {
            return Err(FlowError::ValidationFailed(
                "Flow timeout must be positive".to_string(),
            ));
        }
        if let Err(err) = Url::parse(&flow.base_url) {
            return Err(FlowError::ValidationFailed(format!(
                "Invalid base URL '{}': {}",
                flow.base_url, err
            )));
        }

        let mut names = HashSet::new();
        for node in &flow.nodes {
            if node.name().trim().is_empty() {
                return Err(FlowError::ValidationFailed(format!(
                    "{} step without a name",
                    node.kind()
                )));
            }
            if !names.insert(node.name()) {
                return Err(FlowError::ValidationFailed(format!(
                    "Duplicate step name '{}'",
                    node.name()
                )));
            }
            if let FlowNode::Action(step) = node {
                if let Some(StepFallback::Step(alternative)) = &step.fallback {
                    if alternative.fallback.is_some() {
                        return Err(FlowError::ValidationFailed(format!(
                            "Fallback step '{}' of '{}' declares its own fallback",
                            alternative.name, step.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthStep, Credentials};
    use action_locator::LocatorSpec;
    use action_primitives::{ActionChain, ActionError, InteractionReport, Technique, WaitPolicy};
    use cdp_adapter::{Effect, InputPath, Route, ScriptedDriver, ScriptedElement, ScriptedSite};
    use waypoint_core_types::{CandidateQuery, ElementHandle, Interaction, LoadState, TextMatch};

    const BASE: &str = "https://acme.example.test";

    fn spec(label: &str, candidates: Vec<CandidateQuery>) -> LocatorSpec {
        LocatorSpec::new(label, candidates).unwrap()
    }

    fn click_step(name: &str, role: &str, pattern: &str, wait_ms: u64) -> Step {
        Step::new(
            name,
            spec(name, vec![CandidateQuery::role(role, TextMatch::regex(pattern))]),
            WaitPolicy::visible(wait_ms),
            ActionChain::standard(Interaction::Click, 5_000),
        )
    }

    fn board_site() -> ScriptedSite {
        ScriptedSite::new().route(
            Route::new("/board")
                .element(
                    ScriptedElement::new("more")
                        .role("button")
                        .name("More")
                        .covered()
                        .on_activate(Effect::Show("filters".into())),
                )
                .element(
                    ScriptedElement::new("filters")
                        .role("menuitem")
                        .name("Filters")
                        .hidden(),
                )
                .element(ScriptedElement::new("status").role("button").name("Status"))
                .element(
                    ScriptedElement::new("status-label")
                        .text("Done")
                        .on_activate(Effect::Hide("status".into())),
                ),
        )
    }

    fn executor(driver: Arc<ScriptedDriver>) -> DefaultFlowExecutor {
        DefaultFlowExecutor::new(driver)
    }

    fn board_flow() -> Flow {
        Flow::new("board", BASE).navigate(NavigateNode::new(
            "open board",
            "/board",
            LoadState::DomContentLoaded,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_failure_keeps_run_succeeded() {
        let driver = Arc::new(ScriptedDriver::new(ScriptedSite::new().route(
            Route::new("/board")
                .element(ScriptedElement::new("more").role("button").name("More"))
                .element(ScriptedElement::new("status").role("button").name("Status")),
        )));
        let flow = board_flow()
            .step(click_step("More", "button", "more", 20_000))
            .step(click_step("Filters", "menuitem", "filters?", 15_000).continue_on_failure())
            .step(click_step("Status", "button", "status", 15_000).continue_on_failure());

        let report = executor(driver).execute(&flow).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].step, "Filters");
        assert_eq!(report.step("Filters").unwrap().state, StepState::SoftFailed);
        assert_eq!(
            report.step("Filters").unwrap().error_kind.as_deref(),
            Some("resolution")
        );
        assert_eq!(report.step("Status").unwrap().state, StepState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_failure_aborts_remaining_steps() {
        let driver = Arc::new(ScriptedDriver::new(board_site()));
        let flow = board_flow()
            .step(click_step("Filters", "menuitem", "filters?", 1_000))
            .step(click_step("Status", "button", "status", 1_000).continue_on_failure());

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::HardFailed);
        assert_eq!(report.step("Filters").unwrap().state, StepState::HardFailed);
        assert_eq!(report.step("Status").unwrap().state, StepState::Aborted);
        assert!(report.error.as_deref().unwrap().starts_with("Filters:"));
        assert!(driver.interactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_click_reveals_menu() {
        let driver = Arc::new(ScriptedDriver::new(board_site()));
        let more = Step::new(
            "More",
            spec("more", vec![CandidateQuery::role("button", TextMatch::regex("more"))]),
            WaitPolicy::attached(20_000),
            ActionChain::new(
                Interaction::Click,
                vec![Technique::forced(5_000), Technique::programmatic(5_000)],
            )
            .unwrap(),
        )
        .scroll_first(500)
        .with_post_delay(800);
        let flow = board_flow()
            .step(more)
            .step(click_step("Filters", "menuitem", "filters?", 15_000));

        let started = Instant::now();
        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(
            report.step("More").unwrap().technique,
            Some(TechniqueKind::Forced)
        );
        assert!(started.elapsed() >= Duration::from_millis(1_300));
        let paths: Vec<_> = driver.interactions().iter().map(|r| r.path).collect();
        assert_eq!(paths, vec![InputPath::Forced, InputPath::Standard]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_step_is_recorded_but_step_still_soft_fails() {
        let driver = Arc::new(ScriptedDriver::new(board_site()));
        let label_click = Step::new(
            "click Done label",
            spec("done label", vec![CandidateQuery::text(TextMatch::regex("done"))]),
            WaitPolicy::visible(5_000),
            ActionChain::standard(Interaction::Click, 5_000),
        );
        let check_done = Step::new(
            "Done",
            spec(
                "done checkbox",
                vec![CandidateQuery::role("checkbox", TextMatch::regex("done"))],
            ),
            WaitPolicy::visible(5_000),
            ActionChain::standard(Interaction::Check, 5_000),
        )
        .continue_on_failure()
        .with_fallback(StepFallback::Step(Box::new(label_click)));
        let flow = board_flow().step(check_done);

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert!(report.succeeded());
        let record = report.step("Done").unwrap();
        assert_eq!(record.state, StepState::SoftFailed);
        let fallback = record.fallback.as_ref().unwrap();
        assert!(fallback.recovered);
        assert_eq!(fallback.action, "step:click Done label");
        assert!(report.diagnostics[0].recovered);
        assert_eq!(driver.interactions()[0].element, "status-label");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_navigation_is_skipped_when_already_there() {
        let site = ScriptedSite::new()
            .route(Route::new("/issues"))
            .route(Route::new("/board"));
        let driver = Arc::new(ScriptedDriver::new(site));
        let recover = |unless: Option<&str>| {
            StepFallback::Recover(RecoveryNavigation {
                target: "/issues/".to_string(),
                readiness: LoadState::Load,
                unless_url_contains: unless.map(str::to_string),
            })
        };
        let flow = board_flow()
            .step(
                click_step("Filters", "menuitem", "filters?", 1_000)
                    .continue_on_failure()
                    .with_fallback(recover(None)),
            )
            .step(
                click_step("Search", "searchbox", "search", 1_000)
                    .continue_on_failure()
                    .with_fallback(recover(Some("/issues"))),
            );

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        let filters = report.step("Filters").unwrap().fallback.clone().unwrap();
        assert!(filters.recovered && !filters.skipped);
        let search = report.step("Search").unwrap().fallback.clone().unwrap();
        assert!(search.recovered && search.skipped);
        assert_eq!(
            driver.navigations(),
            vec![
                format!("{}/board", BASE),
                format!("{}/issues/", BASE)
            ]
        );
        assert_eq!(report.diagnostics.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_hard_fails_current_and_aborts_rest() {
        let driver = Arc::new(ScriptedDriver::new(board_site()));
        let flow = board_flow()
            .with_timeout(2_000)
            .step(click_step("Filters", "menuitem", "filters?", 15_000).continue_on_failure())
            .step(click_step("Status", "button", "status", 15_000).continue_on_failure());

        let started = Instant::now();
        let report = executor(driver).execute(&flow).await.unwrap();

        assert!(started.elapsed() <= Duration::from_millis(2_100));
        assert_eq!(report.outcome, RunOutcome::HardFailed);
        let filters = report.step("Filters").unwrap();
        assert_eq!(filters.state, StepState::HardFailed);
        assert_eq!(filters.error_kind.as_deref(), Some("deadline"));
        assert_eq!(report.step("Status").unwrap().state, StepState::Aborted);
    }

    /// Delegates to the default primitives but can never scroll.
    struct NoScroll(DefaultActionPrimitives);

    #[async_trait]
    impl ActionPrimitives for NoScroll {
        async fn perform(
            &self,
            handle: &ElementHandle,
            chain: &ActionChain,
        ) -> Result<InteractionReport, ActionError> {
            self.0.perform(handle, chain).await
        }

        async fn scroll_into_view(&self, _handle: &ElementHandle) -> Result<(), ActionError> {
            Err(ActionError::Driver("scrolling is not supported".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_failure_is_logged_not_fatal() {
        let driver = Arc::new(ScriptedDriver::new(ScriptedSite::new().route(
            Route::new("/board").element(ScriptedElement::new("more").role("button").name("More")),
        )));
        let resolver: Arc<dyn ElementResolver> =
            Arc::new(DefaultElementResolver::new(driver.clone()));
        let executor = DefaultFlowExecutor::with_components(
            driver.clone(),
            resolver.clone(),
            Arc::new(DefaultWaitStrategy::new(resolver, driver.clone())),
            Arc::new(NoScroll(DefaultActionPrimitives::new(driver.clone()))),
            Arc::new(DefaultFailureHandler::new()),
        );
        let flow = board_flow().step(click_step("More", "button", "more", 1_000).scroll_first(500));

        let started = Instant::now();
        let report = executor.execute(&flow).await.unwrap();

        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.step("More").unwrap().state, StepState::Succeeded);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(driver.interactions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_node_waits_for_load_and_delay() {
        let site = ScriptedSite::new().route(
            Route::new("/board").load_delay(Duration::from_millis(1_500)),
        );
        let driver = Arc::new(ScriptedDriver::new(site));
        let flow = board_flow().settle(SettleNode::new("settle", Some(LoadState::Load), 2_000));

        let started = Instant::now();
        let report = executor(driver).execute(&flow).await.unwrap();
        assert!(report.succeeded());
        assert!(started.elapsed() >= Duration::from_millis(3_500));
    }

    fn login_site(post_login_url: &str) -> ScriptedSite {
        ScriptedSite::new()
            .route(
                Route::new("/login")
                    .element(ScriptedElement::new("email").test_id("username"))
                    .element(
                        ScriptedElement::new("continue")
                            .role("button")
                            .name("Continue")
                            .on_activate(Effect::Show("password".into()))
                            .on_activate(Effect::Hide("continue".into())),
                    )
                    .element(
                        ScriptedElement::new("password")
                            .css("input[type=password]")
                            .hidden(),
                    )
                    .element(
                        ScriptedElement::new("login")
                            .role("button")
                            .name("Log in")
                            .on_activate(Effect::Navigate(post_login_url.to_string())),
                    ),
            )
            .route(Route::new("/home").redirect_to(format!("{}/login", BASE)))
            .route(Route::new("/board"))
    }

    fn auth_step() -> AuthStep {
        AuthStep {
            name: "login".to_string(),
            login_path: "/login".to_string(),
            base_url: BASE.to_string(),
            login_marker: "/login".to_string(),
            email_field: spec(
                "email",
                vec![
                    CandidateQuery::test_id(TextMatch::exact("username")),
                    CandidateQuery::css("input[type=email]"),
                ],
            ),
            email_submit: spec(
                "email submit",
                vec![CandidateQuery::role("button", TextMatch::regex("continue|log in"))],
            ),
            password_field: spec(
                "password",
                vec![
                    CandidateQuery::test_id(TextMatch::exact("password")),
                    CandidateQuery::css("input[type=password]"),
                ],
            ),
            password_submit: spec(
                "password submit",
                vec![CandidateQuery::role("button", TextMatch::regex("log in"))],
            ),
            expected_url_fragment: "example.test".to_string(),
            field_timeout_ms: 5_000,
            submit_timeout_ms: 5_000,
            confirm_timeout_ms: 5_000,
            credentials: Credentials::new("me@example.com", "hunter2"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_screen_login() {
        let driver = Arc::new(ScriptedDriver::new(login_site(&format!("{}/board", BASE))));
        let flow = Flow::new("login", BASE)
            .navigate(NavigateNode::new("open", "/home", LoadState::DomContentLoaded))
            .authenticate(auth_step());

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert!(report.succeeded(), "{:?}", report.error);
        assert!(report
            .step("login")
            .unwrap()
            .note
            .as_deref()
            .unwrap()
            .starts_with("session"));
        let clicked: Vec<_> = driver
            .interactions()
            .into_iter()
            .map(|r| r.element)
            .collect();
        assert_eq!(clicked, vec!["email", "continue", "password", "login"]);
        assert!(driver.current_url().await.unwrap().ends_with("/board"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_email_field_triggers_login_off_the_login_url() {
        // A landing page that embeds the sign-in form without a /login URL.
        let inline_email = ScriptedElement::new("inline-email").test_id("username");
        let site = login_site(&format!("{}/board", BASE))
            .route(Route::new("/welcome").element(inline_email));
        let driver = Arc::new(ScriptedDriver::new(site));
        let flow = Flow::new("login", BASE)
            .navigate(NavigateNode::new("open", "/welcome", LoadState::DomContentLoaded))
            .authenticate(auth_step());

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert!(report.succeeded(), "{:?}", report.error);
        assert!(report
            .step("login")
            .unwrap()
            .note
            .as_deref()
            .unwrap()
            .starts_with("session"));
        assert_eq!(
            driver.navigations()[..2],
            [format!("{}/welcome", BASE), format!("{}/login", BASE)]
        );
        assert!(driver.interactions().iter().any(|r| r.element == "login"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_skipped_when_already_authenticated() {
        let driver = Arc::new(ScriptedDriver::new(login_site(&format!("{}/board", BASE))));
        let flow = board_flow().authenticate(auth_step());

        let report = executor(driver.clone()).execute(&flow).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(
            report.step("login").unwrap().note.as_deref(),
            Some("already authenticated")
        );
        assert!(driver.interactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_aborts_run() {
        // Submitting lands back on the login page.
        let driver = Arc::new(ScriptedDriver::new(login_site(&format!("{}/login", BASE))));
        let flow = Flow::new("login", BASE)
            .navigate(NavigateNode::new("open", "/home", LoadState::DomContentLoaded))
            .authenticate(auth_step())
            .step(click_step("More", "button", "more", 1_000).continue_on_failure());

        let report = executor(driver).execute(&flow).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::HardFailed);
        let login = report.step("login").unwrap();
        assert_eq!(login.state, StepState::HardFailed);
        assert_eq!(login.error_kind.as_deref(), Some("authentication"));
        assert_eq!(report.step("More").unwrap().state, StepState::Aborted);
        assert!(!format!("{:?}", report).contains("hunter2"));
    }

    #[test]
    fn test_flow_validation() {
        let driver = Arc::new(ScriptedDriver::new(ScriptedSite::new()));
        let executor = DefaultFlowExecutor::new(driver);

        let empty = Flow::new("empty", BASE);
        assert!(matches!(
            executor.validate_flow(&empty),
            Err(FlowError::ValidationFailed(_))
        ));

        let duplicate = board_flow().navigate(NavigateNode::new(
            "open board",
            "/board",
            LoadState::Load,
        ));
        assert!(executor.validate_flow(&duplicate).is_err());

        let unparsable = Flow::new("board", "acme board")
            .navigate(NavigateNode::new("open board", "/board", LoadState::Load));
        assert!(executor.validate_flow(&unparsable).is_err());

        let label_click = click_step("click Done label", "button", "done", 1_000)
            .with_fallback(StepFallback::Recover(RecoveryNavigation {
                target: "/board".to_string(),
                readiness: LoadState::Load,
                unless_url_contains: None,
            }));
        let nested = board_flow().step(
            click_step("Done", "checkbox", "done", 1_000)
                .with_fallback(StepFallback::Step(Box::new(label_click))),
        );
        match executor.validate_flow(&nested) {
            Err(FlowError::ValidationFailed(message)) => {
                assert!(message.contains("click Done label"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }

        let result = tokio_test::block_on(executor.execute(&empty));
        assert!(result.is_err());
    }
}
