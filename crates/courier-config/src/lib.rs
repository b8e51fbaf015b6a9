//! Client configuration for courier.
//!
//! Provides the connection parameters a transport client is built from:
//! - Endpoint, timeouts and credentials
//! - Client-level retry defaults
//! - Worker pool sizing for proxied calls
//! - Free-form extension properties
//!
//! Values are layered: defaults, then a TOML file, then `COURIER_*`
//! environment variables, then builder calls.

pub mod client;
pub mod discovery;
pub mod error;

pub use client::{
    ClientConfig, DEFAULT_APP_ID, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES,
    DEFAULT_READ_TIMEOUT, DEFAULT_RETRY_INTERVAL, DEFAULT_WORKER_THREADS, DEFAULT_WRITE_TIMEOUT,
};
pub use discovery::{
    ENV_PREFIX, apply_env_overrides, apply_overrides_from, client_config_path, load_client_config,
    load_client_config_file, load_client_config_from,
};
pub use error::{ConfigError, Result};
