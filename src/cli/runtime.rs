use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::RunConfig;

const LOCAL_ENV_PATH: &str = "config/local.env";
const LOCAL_CONFIG_PATH: &str = "config/waypoint.yaml";

/// Copy `config/local.env` entries into the process environment.
///
/// Runs before logging is initialised so a `RUST_LOG` entry takes effect; the
/// caller logs the returned count once the subscriber is installed. `Ok(None)`
/// means there is no local.env file.
pub fn load_local_env_overrides() -> Result<Option<usize>> {
    load_env_file(Path::new(LOCAL_ENV_PATH))
}

/// Apply `path`'s entries, skipping variables that are already set.
/// Returns how many were applied.
pub fn load_env_file(path: &Path) -> Result<Option<usize>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = stdfs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut applied = 0;
    for (key, value) in parse_env_entries(&contents) {
        if env::var(&key).is_ok() {
            continue;
        }
        env::set_var(key, value);
        applied += 1;
    }
    Ok(Some(applied))
}

pub fn local_env_path() -> &'static Path {
    Path::new(LOCAL_ENV_PATH)
}

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Priority: `--config` > ./config/waypoint.yaml > ~/.config/waypoint/config.yaml
pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }

    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }

    let mut path = dirs::config_dir()?;
    path.push("waypoint");
    path.push("config.yaml");
    path.exists().then_some(path)
}

pub fn load_run_config(explicit: Option<&PathBuf>) -> Result<RunConfig> {
    let path = resolve_config_path(explicit);
    match &path {
        Some(path) if path.exists() => info!("Loading configuration from: {}", path.display()),
        Some(path) => warn!("Config file not found, using environment only: {}", path.display()),
        None => info!("No config file; using environment only"),
    }
    RunConfig::load(path.as_deref()).context("Invalid run configuration")
}

fn parse_env_entries(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "invalid local.env entry; skipping");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.push((key.to_string(), unescape_value(value.trim())));
    }
    entries
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
