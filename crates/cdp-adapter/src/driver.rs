//! The page driver port consumed by the engine.

use std::time::Duration;

use async_trait::async_trait;
use waypoint_core_types::{
    CandidateQuery, DomScope, ElementHandle, ElementState, Interaction, LoadState,
};

use crate::error::AdapterError;

/// Browser capabilities the engine relies on.
///
/// Implementations own a single page. The engine drives it from one logical flow,
/// so methods take `&self` and implementations only need interior mutability for
/// their own bookkeeping.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the document reaches `readiness`.
    async fn navigate(
        &self,
        url: &str,
        readiness: LoadState,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// All elements in `scope` matching `query`, in document order.
    async fn query_all(
        &self,
        scope: &DomScope,
        query: &CandidateQuery,
    ) -> Result<Vec<ElementHandle>, AdapterError>;

    /// Current readiness-relevant state of `handle`. Detached handles report
    /// `attached: false` rather than failing.
    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError>;

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError>;

    /// Input-simulated interaction that honours visibility, enabled state and
    /// occlusion, re-checking them until `timeout`.
    async fn interact(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// Input-simulated interaction that skips actionability checks.
    async fn interact_forced(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// Direct DOM invocation, bypassing input simulation entirely.
    async fn invoke(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
    ) -> Result<(), AdapterError>;

    async fn current_url(&self) -> Result<String, AdapterError>;

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
