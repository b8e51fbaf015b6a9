//! Config file discovery and environment overrides.
//!
//! Resolution order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `client.toml` in the user config dir (or an explicit path)
//! 3. `COURIER_*` environment variables
//! 4. Builder calls made by the caller

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{ClientConfig, ConfigFile};
use crate::{ConfigError, Result};

/// Default config filename within the config directory.
const CLIENT_CONFIG_FILE: &str = "client.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "courier";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "COURIER_CONFIG_DIR";

/// Prefix shared by every recognised environment variable.
pub const ENV_PREFIX: &str = "COURIER_";

/// Get the default client config path.
///
/// Checks `COURIER_CONFIG_DIR` first, then the platform config directory
/// (`~/.config/courier/client.toml` on Linux).
pub fn client_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir).join(CLIENT_CONFIG_FILE));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME).join(CLIENT_CONFIG_FILE))
}

/// Load the client config from the default location plus the environment.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_client_config() -> Result<ClientConfig> {
    let mut config = match client_config_path() {
        Some(path) if path.is_file() => load_client_config_file(&path)?,
        _ => ClientConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load the client config from a specific file, then apply the environment.
pub fn load_client_config_from(path: &Path) -> Result<ClientConfig> {
    let mut config = load_client_config_file(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load a config file with no environment overlay.
pub fn load_client_config_file(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: ConfigFile = toml::from_str(&contents)?;

    let mut config = ClientConfig::default();
    if let Some(section) = file.client {
        config.merge(section);
    }
    tracing::debug!(path = %path.display(), "loaded client config file");
    Ok(config)
}

/// Overlay `COURIER_*` variables from the process environment.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<()> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Overlay `COURIER_*` values using an arbitrary lookup.
///
/// Unset keys leave the config untouched; unparseable values are errors.
pub fn apply_overrides_from<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(url) = get("BASE_URL") {
        config.base_url = url;
    }
    if let Some(v) = get("CONNECT_TIMEOUT_MS") {
        config.connect_timeout = parse_millis("CONNECT_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = get("READ_TIMEOUT_MS") {
        config.read_timeout = parse_millis("READ_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = get("WRITE_TIMEOUT_MS") {
        config.write_timeout = parse_millis("WRITE_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = get("AUTH_TOKEN") {
        config.auth_token = Some(v).filter(|s| !s.is_empty());
    }
    if let Some(v) = get("API_KEY") {
        config.api_key = Some(v).filter(|s| !s.is_empty());
    }
    if let Some(v) = get("APP_ID") {
        config.app_id = Some(v).filter(|s| !s.is_empty());
    }
    if let Some(v) = get("TLS_ENABLED") {
        config.tls_enabled = parse_bool("TLS_ENABLED", &v)?;
    }
    if let Some(v) = get("MAX_RETRIES") {
        config.max_retries = parse_number("MAX_RETRIES", &v)?;
    }
    if let Some(v) = get("RETRY_INTERVAL_MS") {
        config.retry_interval = parse_millis("RETRY_INTERVAL_MS", &v)?;
    }
    if let Some(v) = get("WORKER_THREADS") {
        config.worker_threads = parse_number("WORKER_THREADS", &v)?;
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(format!("{ENV_PREFIX}{name}"), e.to_string()))
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    parse_number::<u64>(name, value).map(Duration::from_millis)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(
            format!("{ENV_PREFIX}{name}"),
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
