//! Core types for element resolution

use std::fmt;

use serde::Serialize;
use waypoint_core_types::{CandidateQuery, ElementHandle, QueryError};

use crate::errors::LocatorError;

/// Ordered, non-empty list of alternative queries for one semantic target.
///
/// Order encodes preference. The spec is validated on construction and cannot be
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatorSpec {
    label: String,
    candidates: Vec<CandidateQuery>,
}

impl LocatorSpec {
    pub fn new(
        label: impl Into<String>,
        candidates: Vec<CandidateQuery>,
    ) -> Result<Self, LocatorError> {
        let label = label.into();
        if candidates.is_empty() {
            return Err(LocatorError::invalid(
                &label,
                QueryError::Empty("candidate list"),
            ));
        }
        for candidate in &candidates {
            candidate
                .validate()
                .map_err(|err| LocatorError::invalid(&label, err))?;
        }
        Ok(Self { label, candidates })
    }

    /// Start a spec with its most preferred candidate.
    pub fn builder(label: impl Into<String>) -> LocatorSpecBuilder {
        LocatorSpecBuilder {
            label: label.into(),
            candidates: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn candidates(&self) -> &[CandidateQuery] {
        &self.candidates
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.label)?;
        for (i, candidate) in self.candidates.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", candidate)?;
        }
        write!(f, "]")
    }
}

/// Accumulates candidates in preference order.
#[derive(Debug, Clone)]
pub struct LocatorSpecBuilder {
    label: String,
    candidates: Vec<CandidateQuery>,
}

impl LocatorSpecBuilder {
    /// Add the next, less preferred, alternative.
    pub fn or(mut self, candidate: CandidateQuery) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn build(self) -> Result<LocatorSpec, LocatorError> {
        LocatorSpec::new(self.label, self.candidates)
    }
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub handle: ElementHandle,

    /// Position of the winning candidate in the spec
    pub candidate_index: usize,

    /// How many elements the winning candidate matched
    pub match_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core_types::TextMatch;

    #[test]
    fn empty_spec_is_rejected() {
        let err = LocatorSpec::new("more menu", Vec::new()).unwrap_err();
        assert!(matches!(err, LocatorError::InvalidSpec { .. }));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let err = LocatorSpec::builder("filters")
            .or(CandidateQuery::role("menuitem", TextMatch::regex("filters?")))
            .or(CandidateQuery::text(TextMatch::regex("[unclosed")))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn display_lists_candidates_in_order() {
        let spec = LocatorSpec::builder("more menu")
            .or(CandidateQuery::role("button", TextMatch::regex("more")))
            .or(CandidateQuery::text(TextMatch::exact("More")))
            .build()
            .unwrap();
        assert_eq!(
            spec.to_string(),
            "more menu [role:button[name=/more/i] | text:'More']"
        );
        assert_eq!(spec.candidates().len(), 2);
    }
}
