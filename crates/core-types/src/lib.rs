//! Shared primitives for the Waypoint engine.
//!
//! Everything here is driver-agnostic: candidate queries describe *how* to find an
//! element, handles are opaque references the driver hands back, and interactions
//! describe *what* to do with a handle once it is ready.

use std::fmt;

use regex::RegexBuilder;
use thiserror::Error;
use uuid::Uuid;

/// Raised when a query or text matcher cannot be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("empty {0}")]
    Empty(&'static str),
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

/// How a piece of text (accessible name, visible text, test id, ...) is matched.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TextMatch {
    /// Whole string, after trimming, compared case-sensitively.
    Exact(String),

    /// Case-insensitive substring.
    Contains(String),

    /// Regular expression; `case_insensitive` mirrors the `i` flag.
    Pattern {
        source: String,
        case_insensitive: bool,
    },
}

impl TextMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains(value.into())
    }

    /// Case-insensitive regular expression.
    pub fn regex(source: impl Into<String>) -> Self {
        Self::Pattern {
            source: source.into(),
            case_insensitive: true,
        }
    }

    pub fn regex_case_sensitive(source: impl Into<String>) -> Self {
        Self::Pattern {
            source: source.into(),
            case_insensitive: false,
        }
    }

    /// Check that the matcher is usable. Patterns must compile.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            TextMatch::Exact(value) | TextMatch::Contains(value) if value.is_empty() => {
                Err(QueryError::Empty("text matcher"))
            }
            TextMatch::Pattern {
                source,
                case_insensitive,
            } => RegexBuilder::new(source)
                .case_insensitive(*case_insensitive)
                .build()
                .map(|_| ())
                .map_err(|err| QueryError::InvalidPattern {
                    pattern: source.clone(),
                    reason: err.to_string(),
                }),
            _ => Ok(()),
        }
    }

    /// Evaluate the matcher against `candidate`. Invalid patterns never match.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        match self {
            TextMatch::Exact(value) => candidate == value.trim(),
            TextMatch::Contains(value) => candidate
                .to_lowercase()
                .contains(&value.trim().to_lowercase()),
            TextMatch::Pattern {
                source,
                case_insensitive,
            } => RegexBuilder::new(source)
                .case_insensitive(*case_insensitive)
                .build()
                .map(|re| re.is_match(candidate))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Exact(value) => write!(f, "'{}'", value),
            TextMatch::Contains(value) => write!(f, "~'{}'", value),
            TextMatch::Pattern {
                source,
                case_insensitive,
            } => write!(f, "/{}/{}", source, if *case_insensitive { "i" } else { "" }),
        }
    }
}

/// One way of identifying a DOM element for a semantic target.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CandidateQuery {
    /// `data-testid` attribute.
    TestId(TextMatch),

    /// ARIA role (explicit or implicit) with an optional accessible-name filter.
    Role {
        role: String,
        name: Option<TextMatch>,
    },

    /// Visible text content.
    Text(TextMatch),

    /// `placeholder` attribute of inputs and text areas.
    Placeholder(TextMatch),

    /// Associated `<label>` text or `aria-label`.
    Label(TextMatch),

    /// Raw CSS selector.
    Css(String),
}

impl CandidateQuery {
    pub fn test_id(matcher: TextMatch) -> Self {
        Self::TestId(matcher)
    }

    pub fn role(role: impl Into<String>, name: TextMatch) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name),
        }
    }

    pub fn any_role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    pub fn text(matcher: TextMatch) -> Self {
        Self::Text(matcher)
    }

    pub fn placeholder(matcher: TextMatch) -> Self {
        Self::Placeholder(matcher)
    }

    pub fn label(matcher: TextMatch) -> Self {
        Self::Label(matcher)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            CandidateQuery::TestId(m)
            | CandidateQuery::Text(m)
            | CandidateQuery::Placeholder(m)
            | CandidateQuery::Label(m) => m.validate(),
            CandidateQuery::Role { role, name } => {
                if role.trim().is_empty() {
                    return Err(QueryError::Empty("role"));
                }
                match name {
                    Some(m) => m.validate(),
                    None => Ok(()),
                }
            }
            CandidateQuery::Css(selector) if selector.trim().is_empty() => {
                Err(QueryError::Empty("css selector"))
            }
            CandidateQuery::Css(_) => Ok(()),
        }
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateQuery::TestId(m) => write!(f, "testid:{}", m),
            CandidateQuery::Role { role, name: Some(m) } => write!(f, "role:{}[name={}]", role, m),
            CandidateQuery::Role { role, name: None } => write!(f, "role:{}", role),
            CandidateQuery::Text(m) => write!(f, "text:{}", m),
            CandidateQuery::Placeholder(m) => write!(f, "placeholder:{}", m),
            CandidateQuery::Label(m) => write!(f, "label:{}", m),
            CandidateQuery::Css(s) => write!(f, "css:{}", s),
        }
    }
}

/// Opaque, page-scoped reference into the driver's live DOM.
///
/// Handles are weak: the engine never owns the element and a handle may go stale
/// as soon as the page navigates or re-renders.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ElementHandle {
    pub page: PageId,
    pub node_ref: String,
}

impl ElementHandle {
    pub fn new(page: PageId, node_ref: impl Into<String>) -> Self {
        Self {
            page,
            node_ref: node_ref.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element<{}>", self.node_ref)
    }
}

/// DOM region a query runs against.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum DomScope {
    #[default]
    Document,
    Within(ElementHandle),
}

impl fmt::Display for DomScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomScope::Document => write!(f, "document"),
            DomScope::Within(handle) => write!(f, "within {}", handle),
        }
    }
}

/// Document readiness milestones used for navigation and settling.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadState {
    #[default]
    DomContentLoaded,
    Load,
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
        }
    }
}

/// Snapshot of the properties readiness predicates look at.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ElementState {
    pub attached: bool,
    pub visible: bool,
    /// `None` when the element has no checked semantics.
    pub checked: Option<bool>,
}

/// Text typed into a field. Sensitive values are redacted from `Debug`, `Display`
/// and serialized output, and cannot be deserialized.
#[derive(Clone, Eq, PartialEq)]
pub struct InputText {
    text: String,
    sensitive: bool,
}

impl InputText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sensitive: false,
        }
    }

    pub fn sensitive(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sensitive: true,
        }
    }

    pub fn expose(&self) -> &str {
        &self.text
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }
}

impl fmt::Debug for InputText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputText({})", self)
    }
}

impl fmt::Display for InputText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            write!(f, "***")
        } else {
            write!(f, "{:?}", self.text)
        }
    }
}

#[cfg(feature = "serde-full")]
impl serde::Serialize for InputText {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("InputText", 2)?;
        if self.sensitive {
            state.serialize_field("text", "***")?;
        } else {
            state.serialize_field("text", &self.text)?;
        }
        state.serialize_field("sensitive", &self.sensitive)?;
        state.end()
    }
}

/// What to do with a ready element.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Interaction {
    Click,
    Fill(InputText),
    /// Idempotent: a no-op when the element is already checked.
    Check,
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Click => "click",
            Interaction::Fill(_) => "fill",
            Interaction::Check => "check",
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interaction::Fill(text) => write!(f, "fill({})", text),
            other => write!(f, "{}", other.name()),
        }
    }
}
