//! Transport clients for courier.
//!
//! This crate provides the transport side of a courier call: the envelope
//! sent to a remote service, the [`Transport`] trait the invocation core
//! depends on, an HTTP implementation, retry with backoff, and a registry
//! of named clients.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ClientRegistry                                             │
//! │  - Named, shared clients (create / get / remove / shutdown) │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport (HttpTransport, MockTransport)                   │
//! │  - One attempt per send, lifecycle Uninit → Init → Shutdown │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  with_retry + RetryPolicy                                   │
//! │  - Exponential backoff on transient failures                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use courier_client::{HttpTransport, Params};
//! use courier_config::ClientConfig;
//!
//! let client = HttpTransport::new(ClientConfig::new("http://localhost:8080/api/v1"))?;
//! client.initialize()?;
//!
//! let mut params = Params::new();
//! params.insert("orderId".into(), "A-17".into());
//! let reply = client.invoke_service("orders", "getOrder", params).await?;
//! ```

pub mod envelope;
pub mod error;
pub mod http;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod transport;

// Re-export main types
pub use envelope::{
    EventEnvelope, Params, RequestEnvelope, ResponseStatus, ServiceResponse, decode_reply,
};
pub use error::{Error, ErrorKind, Result};
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use registry::{ClientRegistry, DEFAULT_CLIENT_ID};
pub use retry::{CallTarget, RetryPolicy, with_retry};
pub use transport::{Lifecycle, LifecycleState, SharedTransport, Transport};
