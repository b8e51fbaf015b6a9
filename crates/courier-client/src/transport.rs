//! The narrow interface the invocation core needs from a transport client.
//!
//! A transport moves one [`RequestEnvelope`] to the remote endpoint and
//! returns the decoded reply. It owns its connection resources and moves
//! through [`LifecycleState`] monotonically:
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initialized ──shutdown()──▶ Shutdown
//! ```
//!
//! A shut-down transport is never revived; build a new one instead.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::envelope::{EventEnvelope, RequestEnvelope};
use crate::error::{Error, Result};

/// Lifecycle position of a transport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, no connection resources yet.
    Uninitialized,
    /// Ready to serve calls.
    Initialized,
    /// Resources released; terminal.
    Shutdown,
}

/// A client able to deliver request envelopes to a remote endpoint.
///
/// Implementations must be safe for concurrent use without caller-side
/// locking. `send` performs exactly one attempt; retries are layered on top.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Label used in logs (usually the endpoint).
    fn endpoint(&self) -> &str;

    /// Deliver one envelope and return the decoded reply.
    async fn send(&self, envelope: &RequestEnvelope) -> Result<Value>;

    /// Probe the remote side. Never errors; unreachable means `false`.
    async fn health_check(&self) -> bool;

    /// Acquire connection resources. A no-op when already initialized.
    fn initialize(&self) -> Result<()>;

    /// Release connection resources. A no-op when not initialized.
    fn shutdown(&self) -> Result<()>;

    /// Current lifecycle position.
    fn state(&self) -> LifecycleState;

    /// Check if the client is initialized and not shut down.
    fn is_available(&self) -> bool {
        self.state() == LifecycleState::Initialized
    }

    /// Check if the client has been shut down.
    fn is_shutdown(&self) -> bool {
        self.state() == LifecycleState::Shutdown
    }

    /// Invoke a model endpoint with a raw payload.
    async fn invoke_model(&self, _model_id: &str, _payload: Value) -> Result<Value> {
        Err(Error::Unsupported("invoke_model".to_string()))
    }

    /// Publish an event; the reply reports whether it was accepted.
    async fn publish_event(&self, _event: &EventEnvelope) -> Result<bool> {
        Err(Error::Unsupported("publish_event".to_string()))
    }
}

/// A transport that can be shared across threads.
pub type SharedTransport = Arc<dyn Transport>;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

enum Phase<T> {
    Uninitialized,
    Initialized(T),
    Shutdown,
}

/// Monotonic lifecycle holder for a transport's connection resource.
///
/// `T` is whatever the transport needs per call (an HTTP client handle, or
/// `()` for transports without one); it is cloned out so no lock is held
/// across I/O.
pub struct Lifecycle<T> {
    phase: Mutex<Phase<T>>,
}

impl<T: Clone> Default for Lifecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Lifecycle<T> {
    /// Start uninitialized.
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Uninitialized),
        }
    }

    /// Current lifecycle position.
    pub fn state(&self) -> LifecycleState {
        match &*self.phase.lock() {
            Phase::Uninitialized => LifecycleState::Uninitialized,
            Phase::Initialized(_) => LifecycleState::Initialized,
            Phase::Shutdown => LifecycleState::Shutdown,
        }
    }

    /// Build the resource on the first call; later calls are no-ops.
    ///
    /// Returns `true` when this call performed the transition.
    pub fn initialize(&self, build: impl FnOnce() -> Result<T>) -> Result<bool> {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Initialized(_) => Ok(false),
            Phase::Shutdown => Err(Error::Shutdown),
            Phase::Uninitialized => {
                *phase = Phase::Initialized(build()?);
                Ok(true)
            }
        }
    }

    /// Release the resource.
    ///
    /// Returns `true` when this call performed the transition; an
    /// uninitialized or already shut-down holder is left untouched.
    pub fn shutdown(&self) -> bool {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Initialized(_) => {
                *phase = Phase::Shutdown;
                true
            }
            Phase::Uninitialized | Phase::Shutdown => false,
        }
    }

    /// Get the resource, initializing lazily if needed.
    pub fn acquire(&self, build: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Initialized(resource) => Ok(resource.clone()),
            Phase::Shutdown => Err(Error::Shutdown),
            Phase::Uninitialized => {
                let resource = build()?;
                *phase = Phase::Initialized(resource.clone());
                Ok(resource)
            }
        }
    }

    /// Get the resource only if already initialized.
    pub fn current(&self) -> Option<T> {
        match &*self.phase.lock() {
            Phase::Initialized(resource) => Some(resource.clone()),
            _ => None,
        }
    }
}
