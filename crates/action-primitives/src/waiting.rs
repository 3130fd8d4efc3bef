//! Readiness waiting: re-resolve until the predicate holds or the budget runs out

use crate::{errors::ActionError, types::WaitPolicy};
use action_locator::{ElementResolver, LocatorSpec, Resolution};
use async_trait::async_trait;
use cdp_adapter::PageDriver;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use waypoint_core_types::DomScope;

/// Default interval between readiness polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Waiting strategy trait
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Resolve `spec` and wait until the resolved element satisfies `policy`.
    ///
    /// The spec is resolved afresh on every poll, so a handle that went stale
    /// between polls is never returned.
    async fn await_ready(
        &self,
        spec: &LocatorSpec,
        scope: &DomScope,
        policy: &WaitPolicy,
    ) -> Result<Resolution, ActionError>;
}

/// Default waiting strategy implementation
pub struct DefaultWaitStrategy {
    resolver: Arc<dyn ElementResolver>,
    driver: Arc<dyn PageDriver>,
    poll_interval: Duration,
}

impl DefaultWaitStrategy {
    pub fn new(resolver: Arc<dyn ElementResolver>, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            resolver,
            driver,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One resolution plus state check. `Ok(None)` means "not ready yet".
    async fn probe(
        &self,
        spec: &LocatorSpec,
        scope: &DomScope,
        policy: &WaitPolicy,
        last_error: &mut Option<String>,
        resolved: &mut bool,
    ) -> Result<Option<Resolution>, ActionError> {
        let resolution = match self.resolver.resolve(spec, scope).await {
            Ok(resolution) => {
                *resolved = true;
                resolution
            }
            Err(err) if err.is_retryable() => {
                *last_error = Some(err.to_string());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match self.driver.element_state(&resolution.handle).await {
            Ok(state) if policy.predicate.holds(&state) => Ok(Some(resolution)),
            Ok(state) => {
                *last_error = Some(format!(
                    "{} is not {} (attached={}, visible={}, checked={:?})",
                    resolution.handle,
                    policy.predicate,
                    state.attached,
                    state.visible,
                    state.checked
                ));
                Ok(None)
            }
            Err(err) => {
                *last_error = Some(err.to_string());
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn await_ready(
        &self,
        spec: &LocatorSpec,
        scope: &DomScope,
        policy: &WaitPolicy,
    ) -> Result<Resolution, ActionError> {
        let started = Instant::now();
        let deadline = started + policy.timeout();
        let mut last_error = None;
        let mut resolved = false;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            if let Some(resolution) = self
                .probe(spec, scope, policy, &mut last_error, &mut resolved)
                .await?
            {
                info!(
                    target_label = spec.label(),
                    predicate = %policy.predicate,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Element ready"
                );
                return Ok(resolution);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ActionError::Timeout {
                    spec: spec.to_string(),
                    predicate: policy.predicate,
                    elapsed_ms: now.duration_since(started).as_millis() as u64,
                    resolved,
                    last_error,
                });
            }

            debug!(
                target_label = spec.label(),
                polls,
                "Not ready: {}",
                last_error.as_deref().unwrap_or("unknown")
            );
            // Never sleep past the deadline; the last probe happens exactly at it.
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
