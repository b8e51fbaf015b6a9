//! Service contracts and proxy synthesis for courier.
//!
//! A contract names a remote service and the methods it offers. This crate
//! turns a contract into a callable object whose every method is routed to
//! a transport, with per-method timeouts, retries and execution mode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  service_contract! → trait + proxy struct + ServiceContract │
//! └─────────────────────────────────────────────────────────────┘
//!                           │ synthesize()
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ServiceProxy                                               │
//! │  - Looks up the method slot, checks arity and descriptor    │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                 │
//! │  - Names params, builds the envelope, picks sync/async      │
//! │  - timeout(with_retry(transport.send)) on the WorkerPool    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use courier_proxy::{ServiceContract, ServiceDescriptor, MethodDescriptor, ReturnShape, synthesize};
//!
//! let contract = ServiceContract::new("Orders")
//!     .with_service(ServiceDescriptor::new("orders"))
//!     .declare("get_order", ReturnShape::Blocking, 1,
//!         Some(MethodDescriptor::new().with_name("getOrder").with_params(["orderId"])));
//!
//! let proxy = synthesize(contract, transport)?;
//! let order: Order = proxy.call_blocking("get_order", vec!["A-17".into()])?;
//! ```

pub mod contract;
pub mod descriptor;
pub mod dispatcher;
pub mod fallback;
pub mod handle;
mod macros;
pub mod pool;
pub mod proxy;

// Re-export main types
pub use contract::{MethodSlot, ServiceContract};
pub use courier_client::{Error, Result, SharedTransport};
pub use descriptor::{
    DEFAULT_RETRY_COUNT, DEFAULT_RETRY_INTERVAL_MS, DEFAULT_TIMEOUT_MS, DEFAULT_VERSION,
    ExecutionMode, MethodDescriptor, ParamSpec, ReturnShape, ServiceDescriptor,
};
pub use dispatcher::{Dispatcher, PreparedCall, Reply};
pub use fallback::{Fallback, StaticFallback};
pub use handle::{CallHandle, Deferred};
pub use pool::WorkerPool;
pub use proxy::{ServiceProxy, encode_arg, synthesize, synthesize_with_pool};
