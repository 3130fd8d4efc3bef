//! Core data types for action primitives

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypoint_core_types::{ElementState, Interaction};

use crate::errors::ActionError;

/// Readiness predicate a resolved element must satisfy before interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Present in the DOM, visible or not
    Attached,

    /// Attached and rendered with a non-empty box
    Visible,

    /// Attached and checked
    Checked,
}

impl ReadyState {
    pub fn name(&self) -> &'static str {
        match self {
            ReadyState::Attached => "attached",
            ReadyState::Visible => "visible",
            ReadyState::Checked => "checked",
        }
    }

    pub fn holds(&self, state: &ElementState) -> bool {
        match self {
            ReadyState::Attached => state.attached,
            ReadyState::Visible => state.attached && state.visible,
            ReadyState::Checked => state.attached && state.checked == Some(true),
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounded wait for a readiness predicate. Stateless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub predicate: ReadyState,
    pub timeout_ms: u64,
}

impl WaitPolicy {
    pub fn new(predicate: ReadyState, timeout_ms: u64) -> Self {
        Self {
            predicate,
            timeout_ms,
        }
    }

    pub fn attached(timeout_ms: u64) -> Self {
        Self::new(ReadyState::Attached, timeout_ms)
    }

    pub fn visible(timeout_ms: u64) -> Self {
        Self::new(ReadyState::Visible, timeout_ms)
    }

    pub fn checked(timeout_ms: u64) -> Self {
        Self::new(ReadyState::Checked, timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How an interaction reaches the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueKind {
    /// Simulated input with actionability checks
    Standard,

    /// Simulated input without actionability checks
    Forced,

    /// Direct DOM invocation
    Programmatic,
}

impl TechniqueKind {
    pub fn name(&self) -> &'static str {
        match self {
            TechniqueKind::Standard => "standard",
            TechniqueKind::Forced => "forced",
            TechniqueKind::Programmatic => "programmatic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub kind: TechniqueKind,
    pub timeout_ms: u64,
}

impl Technique {
    pub fn standard(timeout_ms: u64) -> Self {
        Self {
            kind: TechniqueKind::Standard,
            timeout_ms,
        }
    }

    pub fn forced(timeout_ms: u64) -> Self {
        Self {
            kind: TechniqueKind::Forced,
            timeout_ms,
        }
    }

    pub fn programmatic(timeout_ms: u64) -> Self {
        Self {
            kind: TechniqueKind::Programmatic,
            timeout_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}ms)", self.kind.name(), self.timeout_ms)
    }
}

/// An interaction plus the ordered techniques used to deliver it.
///
/// The first technique that completes without error wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionChain {
    #[serde(serialize_with = "interaction_label")]
    interaction: Interaction,
    techniques: Vec<Technique>,
}

fn interaction_label<S: serde::Serializer>(
    interaction: &Interaction,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(interaction)
}

impl ActionChain {
    pub fn new(interaction: Interaction, techniques: Vec<Technique>) -> Result<Self, ActionError> {
        if techniques.is_empty() {
            return Err(ActionError::InvalidChain(format!(
                "{} has no techniques",
                interaction
            )));
        }
        Ok(Self {
            interaction,
            techniques,
        })
    }

    /// Single standard technique, the common case.
    pub fn standard(interaction: Interaction, timeout_ms: u64) -> Self {
        Self {
            interaction,
            techniques: vec![Technique::standard(timeout_ms)],
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }
}

impl fmt::Display for ActionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via ", self.interaction)?;
        for (i, technique) in self.techniques.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", technique)?;
        }
        Ok(())
    }
}

/// One technique attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub technique: TechniqueKind,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Outcome of a successful chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionReport {
    /// Technique that delivered the interaction
    pub technique: TechniqueKind,

    /// Every attempt in order, the winning one last
    pub attempts: Vec<Attempt>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    pub latency_ms: u64,
}

impl InteractionReport {
    pub fn success(
        started_at: DateTime<Utc>,
        latency_ms: u64,
        technique: TechniqueKind,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            technique,
            attempts,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
        }
    }

    /// Whether an earlier technique had to be abandoned
    pub fn fell_back(&self) -> bool {
        self.attempts.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core_types::InputText;

    #[test]
    fn ready_state_predicates() {
        let hidden = ElementState {
            attached: true,
            visible: false,
            checked: Some(true),
        };
        assert!(ReadyState::Attached.holds(&hidden));
        assert!(!ReadyState::Visible.holds(&hidden));
        assert!(ReadyState::Checked.holds(&hidden));
        assert!(!ReadyState::Attached.holds(&ElementState::default()));
    }

    #[test]
    fn empty_chain_is_rejected() {
        let err = ActionChain::new(Interaction::Click, Vec::new()).unwrap_err();
        assert!(matches!(err, ActionError::InvalidChain(_)));
    }

    #[test]
    fn chain_display_redacts_secrets() {
        let chain = ActionChain::new(
            Interaction::Fill(InputText::sensitive("hunter2")),
            vec![Technique::standard(5_000), Technique::programmatic(1_000)],
        )
        .unwrap();
        assert_eq!(
            chain.to_string(),
            "fill(***) via standard(5000ms) -> programmatic(1000ms)"
        );
        let json = serde_json::to_string(&chain).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn serialized_fill_masks_sensitive_text() {
        let secret = serde_json::to_value(Interaction::Fill(InputText::sensitive("hunter2")))
            .unwrap();
        assert_eq!(
            secret,
            serde_json::json!({ "Fill": { "text": "***", "sensitive": true } })
        );

        let plain = serde_json::to_value(Interaction::Fill(InputText::plain("me@example.com")))
            .unwrap();
        assert_eq!(plain["Fill"]["text"], "me@example.com");
    }
}
