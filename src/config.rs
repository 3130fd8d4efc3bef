//! Run configuration
//!
//! Sources, lowest priority first: built-in defaults, an optional YAML file, then
//! environment variables (`BASE_URL`, `LOGIN_EMAIL`, `LOGIN_PASSWORD`, ...).
//! Everything is validated once, before the browser is touched.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use waypoint_core_types::InputText;

pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("BASE_URL '{url}' is not a valid http(s) URL: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{key} is invalid: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// Shape of the merged sources before validation
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    base_url: Option<String>,
    login_email: Option<String>,
    login_password: Option<String>,
    run_timeout_ms: Option<u64>,
    headless: Option<bool>,
    chrome_path: Option<PathBuf>,
    user_data_dir: Option<PathBuf>,
    auth_domain: Option<String>,
}

/// Validated, immutable configuration for one run
#[derive(Clone)]
pub struct RunConfig {
    /// Site root without a trailing slash
    pub base_url: String,
    pub login_email: String,
    login_password: InputText,
    pub run_timeout_ms: u64,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Persisted browser profile; lets a run start already authenticated
    pub user_data_dir: Option<PathBuf>,
    /// Post-login URLs must contain this
    pub auth_domain: String,
}

impl RunConfig {
    /// Load from `file` (if given and present) and the process environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(file, None)
    }

    /// Load with an explicit environment instead of the process one
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        let raw: RawConfig = builder
            .add_source(Environment::default().source(env))
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let base_url = non_empty(raw.base_url).ok_or(ConfigError::Missing("BASE_URL"))?;
        let login_email = non_empty(raw.login_email).ok_or(ConfigError::Missing("LOGIN_EMAIL"))?;
        let login_password =
            non_empty(raw.login_password).ok_or(ConfigError::Missing("LOGIN_PASSWORD"))?;

        let parsed = Url::parse(&base_url).map_err(|err| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBaseUrl {
                url: base_url.clone(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        let run_timeout_ms = raw.run_timeout_ms.unwrap_or(DEFAULT_RUN_TIMEOUT_MS);
        if run_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RUN_TIMEOUT_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            login_email,
            login_password: InputText::sensitive(login_password),
            run_timeout_ms,
            headless: raw.headless.unwrap_or(true),
            chrome_path: raw.chrome_path,
            user_data_dir: raw.user_data_dir,
            auth_domain: non_empty(raw.auth_domain).unwrap_or_else(|| site_domain(&host)),
        })
    }

    pub fn login_password(&self) -> &InputText {
        &self.login_password
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("base_url", &self.base_url)
            .field("login_email", &self.login_email)
            .field("login_password", &self.login_password)
            .field("run_timeout_ms", &self.run_timeout_ms)
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .field("user_data_dir", &self.user_data_dir)
            .field("auth_domain", &self.auth_domain)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `acme.atlassian.net` -> `atlassian.net`
fn site_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 || host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}
