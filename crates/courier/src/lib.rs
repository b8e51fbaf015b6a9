//! Courier - call remote services through declared contracts.
//!
//! Declare what a remote service offers, bind it to a transport client,
//! and call it like a local trait. Timeouts, retries with backoff, and
//! blocking or non-blocking execution are handled per method.
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! courier::service_contract! {
//!     #[service(id = "orders")]
//!     pub trait OrderService as OrderServiceProxy {
//!         #[method(name = "getOrder", timeout_ms = 2000, retry_count = 2, params = ["orderId"])]
//!         blocking fn get_order(order_id: String) -> serde_json::Value;
//!     }
//! }
//!
//! courier::init_logging(LogFormat::Pretty, false)?;
//! let config = courier::config::load_client_config()?;
//! let client = ClientRegistry::global().create_client("orders", config)?;
//! let orders = OrderServiceProxy::synthesize(client)?;
//! let order = orders.get_order("A-17".into())?;
//!
//! ClientRegistry::global().shutdown_all();
//! ```

pub mod logging;

pub use courier_client as client;
pub use courier_config as config;
pub use courier_proxy as proxy;

pub use courier_client::{
    ClientRegistry, Error, ErrorKind, EventEnvelope, HttpTransport, MockTransport, Params,
    RequestEnvelope, Result, RetryPolicy, SharedTransport, Transport,
};
pub use courier_config::{ClientConfig, ConfigError};
pub use courier_proxy::{
    CallHandle, Deferred, Fallback, MethodDescriptor, Reply, ReturnShape, ServiceContract,
    ServiceDescriptor, ServiceProxy, StaticFallback, WorkerPool, service_contract, synthesize,
    synthesize_with_pool,
};
pub use logging::{LogFormat, init_logging};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        CallHandle, ClientConfig, ClientRegistry, Deferred, Error, LogFormat, Result,
        ServiceProxy, SharedTransport, Transport,
    };
}
