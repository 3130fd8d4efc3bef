//! End-to-end runs of the Jira flow against the simulated site.

use std::collections::HashMap;
use std::sync::Arc;

use action_flow::{DefaultFlowExecutor, FlowExecutor, FlowReport, RunOutcome, StepState};
use action_primitives::TechniqueKind;
use cdp_adapter::{Effect, InputPath, Route, ScriptedDriver, ScriptedElement, ScriptedSite};
use waypoint_cli::jira::flow::{STEP_FILTERS, STEP_LOGIN, STEP_MORE, STEP_SEARCH, STEP_STATUS};
use waypoint_cli::jira::{
    build_flow, jira_site, status_option_name, SiteOptions, DEMO_BASE_URL, DEMO_EMAIL,
    DEMO_PASSWORD,
};
use waypoint_cli::RunConfig;

fn demo_config() -> RunConfig {
    let env: HashMap<String, String> = [
        ("BASE_URL", DEMO_BASE_URL),
        ("LOGIN_EMAIL", DEMO_EMAIL),
        ("LOGIN_PASSWORD", DEMO_PASSWORD),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    RunConfig::from_sources(None, Some(env)).unwrap()
}

async fn run_against(site: ScriptedSite) -> (FlowReport, Arc<ScriptedDriver>) {
    let flow = build_flow(&demo_config()).unwrap();
    let driver = Arc::new(ScriptedDriver::new(site));
    let report = DefaultFlowExecutor::new(driver.clone())
        .execute(&flow)
        .await
        .unwrap();
    (report, driver)
}

fn unchecked(id: &str, name: &str) -> ScriptedElement {
    ScriptedElement::new(id)
        .role("checkbox")
        .name(name)
        .checkbox(false)
}

fn diagnostic_steps(report: &FlowReport) -> Vec<&str> {
    report
        .diagnostics
        .iter()
        .map(|d| d.step.as_str())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn full_flow_succeeds_with_label_fallback_for_missing_checkbox() {
    let (report, driver) = run_against(jira_site(DEMO_BASE_URL, SiteOptions::default())).await;

    assert_eq!(report.outcome, RunOutcome::Succeeded, "{:?}", report.error);
    assert_eq!(diagnostic_steps(&report), vec![status_option_name("To Do")]);
    assert!(report.diagnostics[0].recovered);

    let more = report.step(STEP_MORE).unwrap();
    assert_eq!(more.candidate_index, Some(0));
    assert_eq!(more.technique, Some(TechniqueKind::Programmatic));

    assert_eq!(driver.is_checked("status-done"), Some(true));
    assert_eq!(driver.is_checked("status-in-progress"), Some(true));
    assert!(driver
        .interactions()
        .iter()
        .any(|r| r.element == "status-to-do" && r.path == InputPath::Standard));
    assert_eq!(report.count(StepState::Aborted), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_filters_soft_fails_and_the_run_still_succeeds() {
    let base = DEMO_BASE_URL;
    let site = ScriptedSite::new()
        .route(
            Route::new("/login")
                .element(ScriptedElement::new("email").test_id("username"))
                .element(ScriptedElement::new("password").test_id("password"))
                .element(
                    ScriptedElement::new("login")
                        .role("button")
                        .name("Log in")
                        .on_activate(Effect::Navigate(format!("{}/jira/your-work", base))),
                ),
        )
        .route(
            Route::new("/jira/your-work")
                .element(ScriptedElement::new("more").role("button").name("More")),
        )
        .route(
            Route::new("/issues")
                .element(
                    ScriptedElement::new("search")
                        .role("searchbox")
                        .name("Search"),
                )
                .element(ScriptedElement::new("status").role("button").name("Status"))
                .element(unchecked("done", "Done"))
                .element(unchecked("in-progress", "In Progress"))
                .element(unchecked("to-do", "To Do")),
        )
        .route(Route::new("atlassian.net").redirect_to(format!("{}/login", base)));

    let (report, driver) = run_against(site).await;

    assert_eq!(report.outcome, RunOutcome::Succeeded, "{:?}", report.error);
    assert_eq!(report.step(STEP_LOGIN).unwrap().state, StepState::Succeeded);
    assert_eq!(report.step(STEP_MORE).unwrap().state, StepState::Succeeded);
    assert_eq!(report.step(STEP_FILTERS).unwrap().state, StepState::SoftFailed);
    assert_eq!(report.step(STEP_SEARCH).unwrap().state, StepState::Succeeded);
    assert_eq!(report.step(STEP_STATUS).unwrap().state, StepState::Succeeded);
    assert_eq!(diagnostic_steps(&report), vec![STEP_FILTERS]);

    let fallback = report.step(STEP_FILTERS).unwrap().fallback.clone().unwrap();
    assert!(fallback.recovered);
    assert!(driver
        .navigations()
        .contains(&format!("{}/issues/", DEMO_BASE_URL)));
    for id in ["done", "in-progress", "to-do"] {
        assert_eq!(driver.is_checked(id), Some(true), "{}", id);
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_login_hard_fails_and_aborts_the_rest() {
    let site = jira_site(
        DEMO_BASE_URL,
        SiteOptions {
            reject_login: true,
            ..SiteOptions::default()
        },
    );
    let (report, driver) = run_against(site).await;

    assert_eq!(report.outcome, RunOutcome::HardFailed);
    let login = report.step(STEP_LOGIN).unwrap();
    assert_eq!(login.state, StepState::HardFailed);
    assert_eq!(login.error_kind.as_deref(), Some("authentication"));
    for name in [STEP_MORE, STEP_FILTERS, STEP_STATUS] {
        assert_eq!(report.step(name).unwrap().state, StepState::Aborted, "{}", name);
    }
    assert!(report.diagnostics.is_empty());
    assert!(!driver.interactions().iter().any(|r| r.element == "more"));
}

#[tokio::test(start_paused = true)]
async fn existing_session_skips_login() {
    let site = jira_site(
        DEMO_BASE_URL,
        SiteOptions {
            signed_in: true,
            ..SiteOptions::default()
        },
    );
    let (report, driver) = run_against(site).await;

    assert!(report.succeeded());
    assert_eq!(
        report.step(STEP_LOGIN).unwrap().note.as_deref(),
        Some("already authenticated")
    );
    assert!(!driver
        .interactions()
        .iter()
        .any(|r| r.element == "email" || r.element == "password"));
}

#[tokio::test(start_paused = true)]
async fn short_deadline_hard_fails_mid_flow() {
    let mut config = demo_config();
    config.run_timeout_ms = 4_000;
    let flow = build_flow(&config).unwrap();
    let driver = Arc::new(ScriptedDriver::new(jira_site(
        DEMO_BASE_URL,
        SiteOptions::default(),
    )));

    let report = DefaultFlowExecutor::new(driver)
        .execute(&flow)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::HardFailed);
    let failed: Vec<_> = report
        .steps
        .iter()
        .filter(|s| s.state == StepState::HardFailed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_kind.as_deref(), Some("deadline"));
    assert_eq!(
        report.step(&status_option_name("To Do")).unwrap().state,
        StepState::Aborted
    );
}
