//! Process-wide table of named transport clients.
//!
//! The [`ClientRegistry`] owns live clients keyed by id. Entries are sharded
//! so unrelated ids never contend on a single lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_client::ClientRegistry;
//! use courier_config::ClientConfig;
//!
//! let registry = ClientRegistry::global();
//! let client = registry.create_client("orders", ClientConfig::new("http://orders:8080/api/v1"))?;
//!
//! // ... later
//! registry.remove_client("orders");
//! registry.shutdown_all();
//! ```

use std::sync::{Arc, OnceLock};

use courier_config::ClientConfig;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::transport::{SharedTransport, Transport};

/// Id used by [`ClientRegistry::create_default_client`].
pub const DEFAULT_CLIENT_ID: &str = "default";

/// Concurrency-safe table of named clients.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<String, SharedTransport>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ClientRegistry {
        static GLOBAL: OnceLock<ClientRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ClientRegistry::new)
    }

    /// Build, initialize, and register an HTTP client under `id`.
    ///
    /// An existing entry for `id` is replaced but not shut down; call
    /// [`remove_client`](Self::remove_client) first to release it.
    pub fn create_client(&self, id: &str, config: ClientConfig) -> Result<SharedTransport> {
        validate_id(id)?;
        let transport = HttpTransport::new(config)?;
        transport.initialize()?;

        let client: SharedTransport = Arc::new(transport);
        self.register(id, Arc::clone(&client))?;
        tracing::info!(client = %id, endpoint = %client.endpoint(), "created courier client");
        Ok(client)
    }

    /// Create the `"default"` client from the default config.
    pub fn create_default_client(&self) -> Result<SharedTransport> {
        self.create_client(DEFAULT_CLIENT_ID, ClientConfig::default())
    }

    /// Create the `"default"` client from `config`.
    pub fn create_client_with(&self, config: ClientConfig) -> Result<SharedTransport> {
        self.create_client(DEFAULT_CLIENT_ID, config)
    }

    /// Register an externally built client under `id`.
    ///
    /// Returns the entry it replaced, which is left running.
    pub fn register(&self, id: &str, client: SharedTransport) -> Result<Option<SharedTransport>> {
        validate_id(id)?;
        let previous = self.clients.insert(id.to_string(), client);
        if previous.is_some() {
            tracing::warn!(
                client = %id,
                "replaced a registered client without shutting it down"
            );
        }
        Ok(previous)
    }

    /// Get a client by id.
    pub fn get_client(&self, id: &str) -> Option<SharedTransport> {
        self.clients.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Shut down and evict a client.
    ///
    /// Returns true if the client was registered. A failing shutdown is
    /// logged; the entry is evicted regardless.
    pub fn remove_client(&self, id: &str) -> bool {
        let Some((_, client)) = self.clients.remove(id) else {
            return false;
        };

        match client.shutdown() {
            Ok(()) => tracing::info!(client = %id, "removed courier client"),
            Err(e) => tracing::error!(client = %id, error = %e, "failed to shut down removed client"),
        }
        true
    }

    /// Evict and shut down every client.
    ///
    /// Individual shutdown failures are logged and do not stop the rest.
    /// Clients registered while this runs are evicted and shut down too.
    pub fn shutdown_all(&self) {
        tracing::info!(client_count = self.clients.len(), "shutting down all courier clients");

        // Only evict what this pass shuts down; no shard lock is held during shutdown.
        loop {
            let ids = self.client_ids();
            if ids.is_empty() {
                break;
            }
            for id in ids {
                let Some((id, client)) = self.clients.remove(&id) else {
                    continue;
                };
                if let Err(e) = client.shutdown() {
                    tracing::error!(client = %id, error = %e, "failed to shut down client");
                }
            }
        }
    }

    /// Check if a client is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Ids of all registered clients.
    pub fn client_ids(&self) -> Vec<String> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::validation("client id cannot be empty"));
    }
    Ok(())
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.client_ids())
            .finish()
    }
}
