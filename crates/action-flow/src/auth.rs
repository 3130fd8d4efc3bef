//! Login flow built from the same resolve / wait / act primitives as regular steps
//!
//! Handles both the combined form (email and password on one screen) and the split
//! form where the password field only appears after submitting the email.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use action_locator::{ElementResolver, LocatorSpec};
use action_primitives::{ActionChain, ActionPrimitives, ReadyState, WaitPolicy, WaitStrategy};
use cdp_adapter::PageDriver;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use waypoint_core_types::{DomScope, InputText, Interaction, LoadState, SessionId};

use crate::types::resolve_url;

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);
const LOGIN_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Login credentials. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: InputText,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: InputText::sensitive(password),
        }
    }

    pub fn password(&self) -> &InputText {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &self.password)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("could not open login page: {0}")]
    Navigation(String),

    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("expected a URL containing '{expected}' after login, still at {actual}")]
    UnexpectedLocation { expected: String, actual: String },
}

/// Authenticated browsing context, established at most once per run
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub url: String,
    pub established_at: DateTime<Utc>,
}

/// Login step description
#[derive(Debug, Clone, Serialize)]
pub struct AuthStep {
    pub name: String,

    /// Absolute URL or path relative to `base_url`
    pub login_path: String,
    pub base_url: String,

    /// The current page counts as the login surface if its URL contains this
    pub login_marker: String,

    pub email_field: LocatorSpec,
    pub email_submit: LocatorSpec,
    pub password_field: LocatorSpec,
    pub password_submit: LocatorSpec,

    /// Substring the post-login URL must contain
    pub expected_url_fragment: String,

    pub field_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub confirm_timeout_ms: u64,

    #[serde(skip)]
    pub credentials: Credentials,
}

impl AuthStep {
    pub fn login_url(&self) -> String {
        resolve_url(&self.base_url, &self.login_path)
    }
}

/// Runs [`AuthStep`]s against a page
pub struct Authenticator {
    driver: Arc<dyn PageDriver>,
    resolver: Arc<dyn ElementResolver>,
    waiter: Arc<dyn WaitStrategy>,
    primitives: Arc<dyn ActionPrimitives>,
}

impl Authenticator {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        resolver: Arc<dyn ElementResolver>,
        waiter: Arc<dyn WaitStrategy>,
        primitives: Arc<dyn ActionPrimitives>,
    ) -> Self {
        Self {
            driver,
            resolver,
            waiter,
            primitives,
        }
    }

    /// Whether the page is showing the login surface right now.
    ///
    /// Probe failures count as "no".
    pub async fn needs_login(&self, step: &AuthStep) -> bool {
        match self.driver.current_url().await {
            Ok(url) if url.contains(&step.login_marker) => return true,
            Ok(_) => {}
            Err(err) => debug!("could not read current url: {}", err),
        }
        self.is_visible_now(&step.email_field).await
    }

    /// Log in unless the page is already past the login surface.
    ///
    /// Returns `None` when an existing session was reused.
    pub async fn ensure_session(&self, step: &AuthStep) -> Result<Option<Session>, AuthError> {
        if !self.needs_login(step).await {
            info!("login surface not detected; reusing existing session");
            return Ok(None);
        }
        self.login(step).await.map(Some)
    }

    pub async fn login(&self, step: &AuthStep) -> Result<Session, AuthError> {
        let login_url = step.login_url();
        info!(url = %login_url, email = %step.credentials.email, "logging in");

        self.driver
            .navigate(
                &login_url,
                LoadState::DomContentLoaded,
                LOGIN_NAVIGATION_TIMEOUT,
            )
            .await
            .map_err(|err| AuthError::Navigation(err.to_string()))?;

        self.fill(
            "email field",
            &step.email_field,
            InputText::plain(step.credentials.email.clone()),
            step,
        )
        .await?;

        // Combined forms already show the password field; split forms need a submit first.
        if self.is_visible_now(&step.password_field).await {
            debug!("password field already visible; single-screen login form");
        } else {
            self.click("email submit", &step.email_submit, step).await?;
        }

        self.fill(
            "password field",
            &step.password_field,
            step.credentials.password().clone(),
            step,
        )
        .await?;
        self.click("password submit", &step.password_submit, step)
            .await?;

        if let Err(err) = self
            .driver
            .wait_for_load_state(
                LoadState::Load,
                Duration::from_millis(step.confirm_timeout_ms),
            )
            .await
        {
            warn!("page did not report load after login: {}", err);
        }

        let url = self.confirm_location(step).await?;
        info!(url = %url, "login confirmed");
        Ok(Session {
            id: SessionId::new(),
            url,
            established_at: Utc::now(),
        })
    }

    async fn is_visible_now(&self, spec: &LocatorSpec) -> bool {
        let resolution = match self.resolver.resolve(spec, &DomScope::Document).await {
            Ok(resolution) => resolution,
            Err(_) => return false,
        };
        self.driver
            .element_state(&resolution.handle)
            .await
            .map(|state| ReadyState::Visible.holds(&state))
            .unwrap_or(false)
    }

    async fn fill(
        &self,
        field: &'static str,
        spec: &LocatorSpec,
        text: InputText,
        step: &AuthStep,
    ) -> Result<(), AuthError> {
        let resolution = self
            .waiter
            .await_ready(
                spec,
                &DomScope::Document,
                &WaitPolicy::visible(step.field_timeout_ms),
            )
            .await
            .map_err(|err| AuthError::Field {
                field,
                reason: err.to_string(),
            })?;
        let chain = ActionChain::standard(Interaction::Fill(text), step.submit_timeout_ms);
        self.primitives
            .perform(&resolution.handle, &chain)
            .await
            .map(|_| ())
            .map_err(|err| AuthError::Field {
                field,
                reason: err.to_string(),
            })
    }

    async fn click(
        &self,
        field: &'static str,
        spec: &LocatorSpec,
        step: &AuthStep,
    ) -> Result<(), AuthError> {
        let resolution = self
            .waiter
            .await_ready(
                spec,
                &DomScope::Document,
                &WaitPolicy::visible(step.field_timeout_ms),
            )
            .await
            .map_err(|err| AuthError::Field {
                field,
                reason: err.to_string(),
            })?;
        let chain = ActionChain::standard(Interaction::Click, step.submit_timeout_ms);
        self.primitives
            .perform(&resolution.handle, &chain)
            .await
            .map(|_| ())
            .map_err(|err| AuthError::Field {
                field,
                reason: err.to_string(),
            })
    }

    /// Poll the URL until it contains the expected fragment; redirects may still be in flight.
    async fn confirm_location(&self, step: &AuthStep) -> Result<String, AuthError> {
        let deadline = Instant::now() + Duration::from_millis(step.confirm_timeout_ms);
        loop {
            let url = self.driver.current_url().await.unwrap_or_default();
            if url.contains(&step.expected_url_fragment) && !url.contains(&step.login_marker) {
                return Ok(url);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AuthError::UnexpectedLocation {
                    expected: step.expected_url_fragment.clone(),
                    actual: url,
                });
            }
            tokio::time::sleep(URL_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.password().expose(), "hunter2");
    }

    #[test]
    fn serialized_step_omits_credentials() {
        let field = |label: &str, id: &str| {
            LocatorSpec::new(
                label,
                vec![waypoint_core_types::CandidateQuery::test_id(
                    waypoint_core_types::TextMatch::exact(id),
                )],
            )
            .unwrap()
        };
        let step = AuthStep {
            name: "login".into(),
            login_path: "/login".into(),
            base_url: "https://acme.atlassian.net/".into(),
            login_marker: "/login".into(),
            email_field: field("email", "username"),
            email_submit: field("email submit", "continue"),
            password_field: field("password", "password"),
            password_submit: field("password submit", "submit"),
            expected_url_fragment: "atlassian.net".into(),
            field_timeout_ms: 15_000,
            submit_timeout_ms: 10_000,
            confirm_timeout_ms: 15_000,
            credentials: Credentials::new("me@example.com", "hunter2"),
        };

        assert_eq!(step.login_url(), "https://acme.atlassian.net/login");
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"login_marker\":\"/login\""));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("me@example.com"));
    }
}
