use std::fmt::Write as _;

use action_flow::{Flow, FlowNode, FlowReport, RunOutcome, StepFallback, StepState};
use anyhow::Result;
use clap::ValueEnum;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

pub fn render_report(report: &FlowReport, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(report)?),
        OutputFormat::Human => Ok(human_report(report)),
    }
}

pub fn render_flow(flow: &Flow, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(flow)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(flow)?),
        OutputFormat::Human => Ok(human_flow(flow)),
    }
}

fn state_label(state: StepState) -> &'static str {
    match state {
        StepState::Pending => "pending",
        StepState::Running => "running",
        StepState::Succeeded => "ok",
        StepState::SoftFailed => "soft-fail",
        StepState::HardFailed => "HARD-FAIL",
        StepState::Aborted => "aborted",
    }
}

fn human_report(report: &FlowReport) -> String {
    let mut out = String::new();
    let outcome = match report.outcome {
        RunOutcome::Succeeded => "SUCCEEDED",
        RunOutcome::HardFailed => "HARD FAILED",
    };
    let _ = writeln!(
        out,
        "Flow '{}' {} in {}ms (run {})",
        report.flow_name, outcome, report.latency_ms, report.run_id
    );

    for step in &report.steps {
        let _ = write!(
            out,
            "  [{:<9}] {:<28} {:>6}ms",
            state_label(step.state),
            step.name,
            step.latency_ms
        );
        if let Some(technique) = step.technique {
            let _ = write!(out, "  via {}", technique.name());
        }
        if let Some(index) = step.candidate_index {
            let _ = write!(out, "  candidate #{}", index + 1);
        }
        if let Some(note) = &step.note {
            let _ = write!(out, "  ({})", note);
        }
        out.push('\n');
        if let Some(error) = &step.error {
            let _ = writeln!(out, "      error: {}", error);
        }
        if let Some(fallback) = &step.fallback {
            let status = match (fallback.recovered, fallback.skipped) {
                (true, true) => "not needed",
                (true, false) => "recovered",
                (false, _) => "failed",
            };
            let _ = writeln!(out, "      fallback {}: {}", fallback.action, status);
        }
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(out, "Soft failures:");
        for diagnostic in &report.diagnostics {
            let _ = writeln!(
                out,
                "  - {}: {}{}",
                diagnostic.step,
                diagnostic.error,
                if diagnostic.recovered { " (fallback recovered)" } else { "" }
            );
        }
    }
    if let Some(error) = &report.error {
        let _ = writeln!(out, "Error: {}", error);
    }
    out
}

fn human_flow(flow: &Flow) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Flow '{}' against {} (deadline {}ms)",
        flow.name, flow.base_url, flow.timeout_ms
    );

    for (index, node) in flow.nodes.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {} [{}] on failure: {:?}",
            index + 1,
            node.name(),
            node.kind(),
            node.failure_policy()
        );
        match node {
            FlowNode::Navigate(nav) => {
                let _ = writeln!(
                    out,
                    "      goto {} until {}",
                    flow.resolve_url(&nav.target),
                    nav.readiness.name()
                );
            }
            FlowNode::Settle(settle) => {
                if let Some(state) = settle.load_state {
                    let _ = writeln!(out, "      wait for {}", state.name());
                }
                let _ = writeln!(out, "      pause {}ms", settle.delay_ms);
            }
            FlowNode::Authenticate(auth) => {
                let _ = writeln!(out, "      login at {}", auth.login_url());
                let _ = writeln!(out, "      email    {}", auth.email_field);
                let _ = writeln!(out, "      password {}", auth.password_field);
                let _ = writeln!(
                    out,
                    "      expect URL containing '{}'",
                    auth.expected_url_fragment
                );
            }
            FlowNode::Action(step) => {
                let _ = writeln!(out, "      target {}", step.locator);
                let _ = writeln!(
                    out,
                    "      wait {} up to {}ms, then {}",
                    step.wait.predicate,
                    step.wait.timeout_ms,
                    step.chain
                );
                if step.post_delay_ms > 0 {
                    let _ = writeln!(out, "      pause {}ms", step.post_delay_ms);
                }
                match &step.fallback {
                    Some(StepFallback::Step(alternative)) => {
                        let _ = writeln!(
                            out,
                            "      fallback: {} {}",
                            alternative.name, alternative.locator
                        );
                    }
                    Some(StepFallback::Recover(nav)) => {
                        let _ = writeln!(
                            out,
                            "      fallback: goto {}{}",
                            flow.resolve_url(&nav.target),
                            nav.unless_url_contains
                                .as_deref()
                                .map(|marker| format!(" unless URL contains '{}'", marker))
                                .unwrap_or_default()
                        );
                    }
                    None => {}
                }
            }
        }
    }
    out
}
