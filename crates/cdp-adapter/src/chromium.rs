//! `PageDriver` backed by a real Chromium instance over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use waypoint_core_types::{
    CandidateQuery, DomScope, ElementHandle, ElementState, Interaction, LoadState, PageId,
};

use crate::config::CdpConfig;
use crate::driver::PageDriver;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
struct QueryOutcome {
    stale: bool,
    error: Option<String>,
    refs: Vec<String>,
}

#[derive(Deserialize)]
struct StateOutcome {
    attached: bool,
    visible: bool,
    checked: Option<bool>,
}

#[derive(Deserialize)]
struct Actionability {
    attached: bool,
    ready: bool,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct InvokeOutcome {
    ok: bool,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct Attached {
    attached: bool,
}

pub struct ChromiumDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    page_id: PageId,
    ref_prefix: String,
}

impl ChromiumDriver {
    /// Launch a browser and open a blank page.
    pub async fn launch(config: CdpConfig) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_millis(config.request_timeout_ms))
            .launch_timeout(Duration::from_millis(config.launch_timeout_ms))
            .window_size(config.window_size.0, config.window_size.1);

        if !config.headless {
            builder = builder.with_head();
        }
        if !config.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(&config.executable);
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        let browser_config = builder
            .build()
            .map_err(|err| AdapterError::internal(format!("invalid browser config: {}", err)))?;

        info!(
            headless = config.headless,
            executable = %config.executable.display(),
            "launching chromium"
        );
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| AdapterError::io(format!("failed to launch browser: {}", err)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!("browser handler error: {}", err);
                }
            }
            debug!("browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| AdapterError::io(format!("failed to open page: {}", err)))?;

        let page_id = PageId::new();
        let ref_prefix = page_id.0.chars().take(8).collect();

        Ok(Self {
            browser,
            handler_task,
            page,
            page_id,
            ref_prefix,
        })
    }

    /// Close the browser and stop the event handler.
    pub async fn close(mut self) -> Result<(), AdapterError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| AdapterError::io(format!("failed to close browser: {}", err)));
        self.handler_task.abort();
        result
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> Result<T, AdapterError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|err| AdapterError::io(format!("evaluation failed: {}", err)))?;
        result
            .into_value()
            .map_err(|err| AdapterError::internal(format!("unexpected script result: {}", err)))
    }

    fn handle(&self, node_ref: String) -> ElementHandle {
        ElementHandle::new(self.page_id.clone(), node_ref)
    }

    /// Poll the actionability script until the element can take pointer input.
    async fn await_actionable(
        &self,
        handle: &ElementHandle,
        deadline: Instant,
    ) -> Result<(), AdapterError> {
        let mut last_reason = String::from("not checked");
        loop {
            let report: Actionability =
                self.eval(scripts::actionability_expression(&handle.node_ref)?).await?;
            if !report.attached {
                return Err(AdapterError::stale(&handle.node_ref));
            }
            if report.ready {
                return Ok(());
            }
            if let Some(reason) = report.reason {
                last_reason = reason;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AdapterError::not_interactable(last_reason));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Pointer/keyboard input through the DevTools input domain.
    async fn simulate(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
    ) -> Result<(), AdapterError> {
        let element = self
            .page
            .find_element(scripts::selector_for(&handle.node_ref))
            .await
            .map_err(|_| AdapterError::stale(&handle.node_ref))?;

        match interaction {
            Interaction::Click => {
                element
                    .click()
                    .await
                    .map_err(|err| AdapterError::not_interactable(err.to_string()))?;
            }
            Interaction::Fill(text) => {
                let cleared: Attached = self
                    .eval(scripts::clear_value_expression(&handle.node_ref)?)
                    .await?;
                if !cleared.attached {
                    return Err(AdapterError::stale(&handle.node_ref));
                }
                element
                    .type_str(text.expose())
                    .await
                    .map_err(|err| AdapterError::not_interactable(err.to_string()))?;
            }
            Interaction::Check => {
                if self.element_state(handle).await?.checked == Some(true) {
                    return Ok(());
                }
                element
                    .click()
                    .await
                    .map_err(|err| AdapterError::not_interactable(err.to_string()))?;
                let state = self.element_state(handle).await?;
                if state.checked != Some(true) {
                    return Err(AdapterError::not_interactable(
                        "element did not become checked",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(
        &self,
        url: &str,
        readiness: LoadState,
        timeout_after: Duration,
    ) -> Result<(), AdapterError> {
        let started = Instant::now();
        debug!(url, readiness = readiness.name(), "navigating");
        match timeout(timeout_after, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                return Err(AdapterError::io(format!("navigation to {} failed: {}", url, err)))
            }
            Err(_) => {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!("navigation to {} exceeded {:?}", url, timeout_after)))
            }
        }
        let remaining = timeout_after.saturating_sub(started.elapsed());
        self.wait_for_load_state(readiness, remaining)
            .await
            .map_err(|err| match err.kind {
                AdapterErrorKind::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint(format!(
                        "{} never reached {}",
                        url,
                        readiness.name()
                    )),
                _ => err,
            })
    }

    async fn query_all(
        &self,
        scope: &DomScope,
        query: &CandidateQuery,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let query_json = serde_json::to_string(query)
            .map_err(|err| AdapterError::internal(format!("failed to encode query: {}", err)))?;
        let scope_ref = match scope {
            DomScope::Document => None,
            DomScope::Within(handle) => Some(handle.node_ref.as_str()),
        };
        let outcome: QueryOutcome = self
            .eval(scripts::query_expression(
                &self.ref_prefix,
                scope_ref,
                &query_json,
            )?)
            .await?;

        if outcome.stale {
            return Err(AdapterError::stale(scope_ref.unwrap_or("document")));
        }
        if let Some(error) = outcome.error {
            return Err(AdapterError::new(AdapterErrorKind::InvalidQuery)
                .with_hint(format!("{}: {}", query, error)));
        }
        Ok(outcome
            .refs
            .into_iter()
            .map(|node_ref| self.handle(node_ref))
            .collect())
    }

    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError> {
        let state: StateOutcome = self
            .eval(scripts::state_expression(&handle.node_ref)?)
            .await?;
        Ok(ElementState {
            attached: state.attached,
            visible: state.visible,
            checked: state.checked,
        })
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout_after: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout_after;
        loop {
            let ready: String = self
                .eval(scripts::READY_STATE_EXPRESSION.to_string())
                .await?;
            let reached = match state {
                LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
                LoadState::Load => ready == "complete",
            };
            if reached {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::Timeout).with_hint(format!(
                    "document stuck in '{}' waiting for {}",
                    ready,
                    state.name()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        let outcome: Attached = self
            .eval(scripts::scroll_expression(&handle.node_ref)?)
            .await?;
        if outcome.attached {
            Ok(())
        } else {
            Err(AdapterError::stale(&handle.node_ref))
        }
    }

    async fn interact(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        timeout_after: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout_after;
        self.await_actionable(handle, deadline).await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        timeout(remaining, self.simulate(handle, interaction))
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::Timeout).with_hint(format!(
                    "{} on {} exceeded {:?}",
                    interaction, handle, timeout_after
                ))
            })?
    }

    async fn interact_forced(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
        timeout_after: Duration,
    ) -> Result<(), AdapterError> {
        timeout(timeout_after, self.simulate(handle, interaction))
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::Timeout).with_hint(format!(
                    "forced {} on {} exceeded {:?}",
                    interaction, handle, timeout_after
                ))
            })?
    }

    async fn invoke(
        &self,
        handle: &ElementHandle,
        interaction: &Interaction,
    ) -> Result<(), AdapterError> {
        let outcome: InvokeOutcome = self
            .eval(scripts::invoke_expression(&handle.node_ref, interaction)?)
            .await?;
        if outcome.ok {
            return Ok(());
        }
        match outcome.reason.as_deref() {
            Some("detached") => Err(AdapterError::stale(&handle.node_ref)),
            Some(reason) => Err(AdapterError::not_interactable(reason.to_string())),
            None => Err(AdapterError::not_interactable("programmatic invocation failed")),
        }
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.page
            .url()
            .await
            .map(|url| url.unwrap_or_default())
            .map_err(|err| AdapterError::io(format!("failed to read url: {}", err)))
    }
}
