//! Interaction retry: deliver an interaction through an ordered technique chain

use async_trait::async_trait;
use cdp_adapter::PageDriver;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use waypoint_core_types::ElementHandle;

use crate::{
    errors::ActionError,
    types::{ActionChain, Attempt, InteractionReport, TechniqueKind},
};

/// Action primitives trait
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Try each technique of `chain` in order; stop at the first that succeeds.
    ///
    /// The handle is used as-is for every technique. If the page re-rendered in
    /// between, later techniques fail on a stale handle rather than re-resolving.
    async fn perform(
        &self,
        handle: &ElementHandle,
        chain: &ActionChain,
    ) -> Result<InteractionReport, ActionError>;

    /// Bring the element into the viewport.
    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    driver: Arc<dyn PageDriver>,
}

impl DefaultActionPrimitives {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    /// Steps:
    /// 1. Run the next technique under its own timeout
    /// 2. On success, report the winning technique and every attempt so far
    /// 3. On error or timeout, record the attempt and move on
    /// 4. When the chain is exhausted, fail with the last error
    async fn perform(
        &self,
        handle: &ElementHandle,
        chain: &ActionChain,
    ) -> Result<InteractionReport, ActionError> {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let interaction = chain.interaction();
        let mut attempts = Vec::with_capacity(chain.techniques().len());

        for technique in chain.techniques() {
            debug!(
                handle = %handle,
                interaction = %interaction,
                technique = %technique,
                "Attempting interaction"
            );
            let attempt_start = Instant::now();
            let budget = technique.timeout();

            let outcome = match technique.kind {
                TechniqueKind::Standard => {
                    timeout(budget, self.driver.interact(handle, interaction, budget)).await
                }
                TechniqueKind::Forced => {
                    timeout(
                        budget,
                        self.driver.interact_forced(handle, interaction, budget),
                    )
                    .await
                }
                TechniqueKind::Programmatic => {
                    timeout(budget, self.driver.invoke(handle, interaction)).await
                }
            };

            let latency_ms = attempt_start.elapsed().as_millis() as u64;
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(_) => Some(format!(
                    "{} exceeded {}ms",
                    technique.kind.name(),
                    technique.timeout_ms
                )),
            };

            match error {
                None => {
                    attempts.push(Attempt {
                        technique: technique.kind,
                        latency_ms,
                        error: None,
                    });
                    info!(
                        handle = %handle,
                        interaction = %interaction,
                        technique = technique.kind.name(),
                        attempts = attempts.len(),
                        "Interaction delivered"
                    );
                    return Ok(InteractionReport::success(
                        started_at,
                        start_instant.elapsed().as_millis() as u64,
                        technique.kind,
                        attempts,
                    ));
                }
                Some(message) => {
                    warn!(
                        handle = %handle,
                        technique = technique.kind.name(),
                        "Technique failed: {}",
                        message
                    );
                    attempts.push(Attempt {
                        technique: technique.kind,
                        latency_ms,
                        error: Some(message),
                    });
                }
            }
        }

        let last_error = attempts
            .last()
            .and_then(|attempt| attempt.error.clone())
            .unwrap_or_default();
        Err(ActionError::Interaction {
            handle: handle.to_string(),
            chain: chain.to_string(),
            attempts: attempts.len(),
            last_error,
        })
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), ActionError> {
        self.driver
            .scroll_into_view(handle)
            .await
            .map_err(ActionError::from)
    }
}
