//! Element resolver: first element of the first viable candidate

use crate::{errors::LocatorError, types::*};
use async_trait::async_trait;
use cdp_adapter::PageDriver;
use std::sync::Arc;
use tracing::{debug, warn};
use waypoint_core_types::DomScope;

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve `spec` against the live page. No waiting, no retries, no side effects.
    async fn resolve(
        &self,
        spec: &LocatorSpec,
        scope: &DomScope,
    ) -> Result<Resolution, LocatorError>;
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    driver: Arc<dyn PageDriver>,
}

impl DefaultElementResolver {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(
        &self,
        spec: &LocatorSpec,
        scope: &DomScope,
    ) -> Result<Resolution, LocatorError> {
        debug!(spec = %spec, scope = %scope, "Resolving element");

        for (index, candidate) in spec.candidates().iter().enumerate() {
            match self.driver.query_all(scope, candidate).await {
                Ok(mut handles) if !handles.is_empty() => {
                    let match_count = handles.len();
                    let handle = handles.swap_remove(0);
                    debug!(
                        target_label = spec.label(),
                        candidate = %candidate,
                        index,
                        match_count,
                        "Resolved {}",
                        handle
                    );
                    return Ok(Resolution {
                        handle,
                        candidate_index: index,
                        match_count,
                    });
                }
                Ok(_) => {
                    debug!(candidate = %candidate, "Candidate matched nothing");
                }
                Err(e) => {
                    // A failing query is treated as a miss for that candidate only.
                    warn!(candidate = %candidate, "Candidate query failed: {}", e);
                }
            }
        }

        Err(LocatorError::NoViableCandidate {
            spec: spec.to_string(),
            scope: scope.to_string(),
            tried: spec.candidates().len(),
        })
    }
}
