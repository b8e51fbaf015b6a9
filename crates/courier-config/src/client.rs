//! Connection parameters for a single transport client.
//!
//! The file form lives under a `[client]` table; durations are expressed in
//! milliseconds:
//!
//! ```toml
//! [client]
//! base_url = "https://services.example.com/api/v1"
//! connect_timeout_ms = 5000
//! read_timeout_ms = 30000
//! auth_token = "..."
//! max_retries = 2
//! retry_interval_ms = 500
//!
//! [client.extensions]
//! region = "eu-west"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default base endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Default application id sent with every request.
pub const DEFAULT_APP_ID: &str = "default-app";

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries for client-level calls.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between client-level retries.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default size of the dispatcher worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// Connection parameters for one transport client.
///
/// Immutable once handed to a client; build it with the `with_*` methods or
/// load it with [`crate::load_client_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base endpoint every request path is appended to.
    pub base_url: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Time allowed to receive a response.
    pub read_timeout: Duration,
    /// Time allowed to send a request body.
    pub write_timeout: Duration,
    /// Bearer token for the `Authorization` header.
    pub auth_token: Option<String>,
    /// Value for the `X-API-Key` header.
    pub api_key: Option<String>,
    /// Value for the `X-App-Id` header.
    pub app_id: Option<String>,
    /// Require an `https` endpoint.
    pub tls_enabled: bool,
    /// Retries for client-level calls (model invocation, events, direct service calls).
    pub max_retries: u32,
    /// First backoff interval for client-level calls.
    pub retry_interval: Duration,
    /// Threads in the worker pool that runs proxied calls.
    pub worker_threads: usize,
    /// Arbitrary extension properties.
    pub extensions: BTreeMap<String, Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            auth_token: None,
            api_key: None,
            app_id: Some(DEFAULT_APP_ID.to_string()),
            tls_enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            worker_threads: DEFAULT_WORKER_THREADS,
            extensions: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given endpoint with every other value defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Parse the `[client]` table of a TOML document on top of the defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let mut config = Self::default();
        if let Some(section) = file.client {
            config.merge(section);
        }
        Ok(config)
    }

    /// Overlay the values present in a parsed `[client]` section.
    pub(crate) fn merge(&mut self, section: ClientSection) {
        if let Some(base_url) = section.base_url {
            self.base_url = base_url;
        }
        if let Some(ms) = section.connect_timeout_ms {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = section.read_timeout_ms {
            self.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = section.write_timeout_ms {
            self.write_timeout = Duration::from_millis(ms);
        }
        if section.auth_token.is_some() {
            self.auth_token = non_empty(section.auth_token);
        }
        if section.api_key.is_some() {
            self.api_key = non_empty(section.api_key);
        }
        if section.app_id.is_some() {
            self.app_id = non_empty(section.app_id);
        }
        if let Some(tls) = section.tls_enabled {
            self.tls_enabled = tls;
        }
        if let Some(retries) = section.max_retries {
            self.max_retries = retries;
        }
        if let Some(ms) = section.retry_interval_ms {
            self.retry_interval = Duration::from_millis(ms);
        }
        if let Some(threads) = section.worker_threads {
            self.worker_threads = threads;
        }
        self.extensions.extend(section.extensions);
    }

    /// Set the base endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the application id.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Require TLS.
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }

    /// Set the client-level retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the client-level retry interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Add an extension property.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Look up an extension property.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Check that the config can back a live client.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_url".to_string(),
            });
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;

        match url.scheme() {
            "https" => {}
            "http" if self.tls_enabled => {
                return Err(ConfigError::invalid(
                    "base_url",
                    "tls_enabled requires an https endpoint",
                ));
            }
            "http" => {}
            other => {
                return Err(ConfigError::invalid(
                    "base_url",
                    format!("unsupported scheme '{}'", other),
                ));
            }
        }

        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::invalid(
                "worker_threads",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// File schema
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level TOML document.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub(crate) client: Option<ClientSection>,
}

/// The `[client]` table; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ClientSection {
    pub(crate) base_url: Option<String>,
    pub(crate) connect_timeout_ms: Option<u64>,
    pub(crate) read_timeout_ms: Option<u64>,
    pub(crate) write_timeout_ms: Option<u64>,
    pub(crate) auth_token: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) app_id: Option<String>,
    pub(crate) tls_enabled: Option<bool>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) retry_interval_ms: Option<u64>,
    pub(crate) worker_threads: Option<usize>,
    #[serde(default)]
    pub(crate) extensions: BTreeMap<String, Value>,
}
