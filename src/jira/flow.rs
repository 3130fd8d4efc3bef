//! The scripted Jira sequence: open the site, log in if needed, then
//! More → Filters → Search work items → Status → status checkboxes.

use action_flow::{
    AuthStep, Credentials, Flow, FlowError, NavigateNode, RecoveryNavigation, SettleNode, Step,
    StepFallback,
};
use action_locator::LocatorSpec;
use action_primitives::{ActionChain, Technique, WaitPolicy};
use waypoint_core_types::{CandidateQuery, Interaction, LoadState, TextMatch};

use crate::config::RunConfig;

pub const FLOW_NAME: &str = "jira-simple";

pub const STEP_OPEN: &str = "open site";
pub const STEP_LOGIN: &str = "login";
pub const STEP_SETTLE: &str = "let navigation render";
pub const STEP_MORE: &str = "More";
pub const STEP_FILTERS: &str = "Filters";
pub const STEP_SEARCH: &str = "Search work items";
pub const STEP_STATUS: &str = "Status";

/// Status options ticked at the end, with the pattern matching each one
pub const STATUS_OPTIONS: [(&str, &str); 3] = [
    ("Done", "done"),
    ("In Progress", "in progress"),
    ("To Do", "to do"),
];

const ISSUES_PATH: &str = "/issues/";
const LOGIN_MARKER: &str = "/login";

/// Build the full flow for `config`
pub fn build_flow(config: &RunConfig) -> Result<Flow, FlowError> {
    let mut flow = Flow::new(FLOW_NAME, config.base_url.clone())
        .with_timeout(config.run_timeout_ms)
        .navigate(NavigateNode::new(STEP_OPEN, "", LoadState::DomContentLoaded))
        .authenticate(login_step(config)?)
        .settle(SettleNode::new(STEP_SETTLE, Some(LoadState::Load), 2_000))
        .step(more_step()?)
        .step(filters_step()?)
        .step(search_step()?)
        .step(status_step()?);

    for (label, pattern) in STATUS_OPTIONS {
        flow = flow.step(status_option_step(label, pattern)?);
    }
    Ok(flow)
}

pub fn status_option_name(label: &str) -> String {
    format!("{}: {}", STEP_STATUS, label)
}

fn login_step(config: &RunConfig) -> Result<AuthStep, FlowError> {
    Ok(AuthStep {
        name: STEP_LOGIN.to_string(),
        login_path: LOGIN_MARKER.to_string(),
        base_url: config.base_url.clone(),
        login_marker: LOGIN_MARKER.to_string(),
        email_field: LocatorSpec::builder("email field")
            .or(CandidateQuery::test_id(TextMatch::exact("username")))
            .or(CandidateQuery::css(r#"input[type="email"]"#))
            .build()?,
        email_submit: LocatorSpec::builder("email submit")
            .or(CandidateQuery::role("button", TextMatch::regex("continue|log in")))
            .build()?,
        password_field: LocatorSpec::builder("password field")
            .or(CandidateQuery::test_id(TextMatch::exact("password")))
            .or(CandidateQuery::css(r#"input[type="password"]"#))
            .build()?,
        password_submit: LocatorSpec::builder("password submit")
            .or(CandidateQuery::role("button", TextMatch::regex("log in|continue")))
            .build()?,
        expected_url_fragment: config.auth_domain.clone(),
        field_timeout_ms: 15_000,
        submit_timeout_ms: 10_000,
        confirm_timeout_ms: 15_000,
        credentials: Credentials::new(
            config.login_email.clone(),
            config.login_password().expose(),
        ),
    })
}

/// The sidebar can keep More collapsed out of view, so it is only required to be
/// attached and is clicked without actionability checks.
fn more_step() -> Result<Step, FlowError> {
    let locator = LocatorSpec::builder("More menu")
        .or(CandidateQuery::test_id(TextMatch::regex_case_sensitive(
            "more-nav-menu-button-trigger$",
        )))
        .or(CandidateQuery::role("button", TextMatch::regex("more")))
        .or(CandidateQuery::role("link", TextMatch::regex("more")))
        .or(CandidateQuery::text(TextMatch::exact("More")))
        .build()?;
    let chain = ActionChain::new(
        Interaction::Click,
        vec![Technique::forced(5_000), Technique::programmatic(5_000)],
    )?;

    Ok(
        Step::new(STEP_MORE, locator, WaitPolicy::attached(20_000), chain)
            .scroll_first(500)
            .with_post_delay(800),
    )
}

fn filters_step() -> Result<Step, FlowError> {
    let locator = LocatorSpec::builder("Filters entry")
        .or(CandidateQuery::role("menuitem", TextMatch::regex("filters?")))
        .or(CandidateQuery::role("link", TextMatch::regex("filters?")))
        .or(CandidateQuery::role("button", TextMatch::regex("filters?")))
        .or(CandidateQuery::text(TextMatch::regex("^filters?$")))
        .or(CandidateQuery::text(TextMatch::contains("View all filters")))
        .build()?;

    Ok(Step::new(
        STEP_FILTERS,
        locator,
        WaitPolicy::visible(15_000),
        ActionChain::standard(Interaction::Click, 10_000),
    )
    .settle_after(LoadState::Load)
    .continue_on_failure()
    .with_fallback(StepFallback::Recover(RecoveryNavigation {
        target: ISSUES_PATH.to_string(),
        readiness: LoadState::Load,
        unless_url_contains: None,
    })))
}

fn search_step() -> Result<Step, FlowError> {
    let locator = LocatorSpec::builder("work item search")
        .or(CandidateQuery::placeholder(TextMatch::regex(
            "search work items|search issues|search for",
        )))
        .or(CandidateQuery::role("searchbox", TextMatch::regex("search")))
        .or(CandidateQuery::label(TextMatch::regex("search")))
        .or(CandidateQuery::css(r#"input[placeholder*="earch"]"#))
        .or(CandidateQuery::css(r#"input[type="search"]"#))
        .build()?;

    Ok(Step::new(
        STEP_SEARCH,
        locator,
        WaitPolicy::visible(15_000),
        ActionChain::standard(Interaction::Click, 10_000),
    )
    .continue_on_failure()
    .with_post_delay(300)
    .with_fallback(StepFallback::Recover(RecoveryNavigation {
        target: ISSUES_PATH.to_string(),
        readiness: LoadState::Load,
        unless_url_contains: Some("/issues".to_string()),
    })))
}

fn status_step() -> Result<Step, FlowError> {
    let locator = LocatorSpec::builder("Status dropdown")
        .or(CandidateQuery::role("button", TextMatch::regex("status")))
        .or(CandidateQuery::role("combobox", TextMatch::regex("status")))
        .or(CandidateQuery::text(TextMatch::exact("Status")))
        .or(CandidateQuery::css(r#"[data-testid*="status"]"#))
        .build()?;

    Ok(Step::new(
        STEP_STATUS,
        locator,
        WaitPolicy::visible(15_000),
        ActionChain::standard(Interaction::Click, 10_000),
    )
    .continue_on_failure()
    .with_post_delay(500))
}

/// Tick one status checkbox; when no checkbox is exposed, click the option text instead.
fn status_option_step(label: &str, pattern: &str) -> Result<Step, FlowError> {
    let checkbox = LocatorSpec::builder(format!("{} checkbox", label))
        .or(CandidateQuery::role("checkbox", TextMatch::regex(pattern)))
        .build()?;
    let option_text = LocatorSpec::builder(format!("{} option", label))
        .or(CandidateQuery::text(TextMatch::regex(pattern)))
        .build()?;

    let label_click = Step::new(
        format!("click {} option", label),
        option_text,
        WaitPolicy::attached(5_000),
        ActionChain::standard(Interaction::Click, 5_000),
    );

    Ok(Step::new(
        status_option_name(label),
        checkbox,
        WaitPolicy::visible(5_000),
        ActionChain::standard(Interaction::Check, 5_000),
    )
    .continue_on_failure()
    .with_fallback(StepFallback::Step(Box::new(label_click))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{FailurePolicy, FlowNode};
    use std::collections::HashMap;

    fn config() -> RunConfig {
        let env: HashMap<String, String> = [
            ("BASE_URL", "https://acme.atlassian.net"),
            ("LOGIN_EMAIL", "me@example.com"),
            ("LOGIN_PASSWORD", "secret"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RunConfig::from_sources(None, Some(env)).unwrap()
    }

    #[test]
    fn test_flow_shape() {
        let flow = build_flow(&config()).unwrap();

        let names: Vec<&str> = flow.nodes.iter().map(FlowNode::name).collect();
        assert_eq!(
            names,
            vec![
                STEP_OPEN,
                STEP_LOGIN,
                STEP_SETTLE,
                STEP_MORE,
                STEP_FILTERS,
                STEP_SEARCH,
                STEP_STATUS,
                "Status: Done",
                "Status: In Progress",
                "Status: To Do",
            ]
        );
        assert_eq!(flow.timeout_ms, 120_000);
    }

    #[test]
    fn test_only_more_aborts_the_run() {
        let flow = build_flow(&config()).unwrap();
        for node in &flow.nodes {
            if let FlowNode::Action(step) = node {
                let expected = if step.name == STEP_MORE {
                    FailurePolicy::Abort
                } else {
                    FailurePolicy::Continue
                };
                assert_eq!(step.failure_policy, expected, "{}", step.name);
            }
        }
    }

    #[test]
    fn test_login_targets_configured_domain() {
        let flow = build_flow(&config()).unwrap();
        let FlowNode::Authenticate(auth) = &flow.nodes[1] else {
            panic!("second node should be the login step");
        };
        assert_eq!(auth.login_url(), "https://acme.atlassian.net/login");
        assert_eq!(auth.expected_url_fragment, "atlassian.net");
        assert_eq!(auth.email_field.candidates().len(), 2);
    }
}
