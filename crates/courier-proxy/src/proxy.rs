//! Proxy synthesis.
//!
//! [`synthesize`] turns a [`ServiceContract`] and a transport into a
//! [`ServiceProxy`]: one object that routes every declared method through
//! the dispatcher. Typed contracts generated by `service_contract!` wrap a
//! `ServiceProxy` and call its typed helpers.

use std::sync::Arc;

use courier_client::{Error, Result, SharedTransport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::contract::ServiceContract;
use crate::descriptor::ServiceDescriptor;
use crate::dispatcher::{Dispatcher, Reply};
use crate::fallback::Fallback;
use crate::handle::{CallHandle, Deferred, decode};
use crate::pool::WorkerPool;

/// Synthesize a proxy for `contract` on the shared worker pool.
///
/// Performs no network I/O.
pub fn synthesize(contract: ServiceContract, transport: SharedTransport) -> Result<ServiceProxy> {
    synthesize_with_pool(contract, transport, WorkerPool::shared()?)
}

/// Synthesize a proxy for `contract` on a specific worker pool.
pub fn synthesize_with_pool(
    contract: ServiceContract,
    transport: SharedTransport,
    pool: Arc<WorkerPool>,
) -> Result<ServiceProxy> {
    let service = contract.validate()?.clone();
    tracing::debug!(
        contract = %contract.name(),
        service = %service.service_id,
        methods = contract.len(),
        endpoint = %transport.endpoint(),
        "synthesized service proxy"
    );

    Ok(ServiceProxy {
        contract: Arc::new(contract),
        service,
        dispatcher: Dispatcher::new(transport, pool),
    })
}

/// Encode one argument for the request envelope.
pub fn encode_arg<A: Serialize + ?Sized>(arg: &A) -> Result<Value> {
    Ok(serde_json::to_value(arg)?)
}

/// A synthesized implementation of a contract.
#[derive(Debug, Clone)]
pub struct ServiceProxy {
    contract: Arc<ServiceContract>,
    service: ServiceDescriptor,
    dispatcher: Dispatcher,
}

impl ServiceProxy {
    /// The bound service id.
    pub fn service_id(&self) -> &str {
        &self.service.service_id
    }

    /// The service descriptor.
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// The contract this proxy implements.
    pub fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    /// The bound transport.
    pub fn transport(&self) -> &SharedTransport {
        self.dispatcher.transport()
    }

    /// Install a fallback for transient failures.
    ///
    /// Fails unless the service descriptor enables fallback.
    pub fn with_fallback(mut self, fallback: impl Fallback + 'static) -> Result<Self> {
        if !self.service.fallback_enabled {
            return Err(Error::config(format!(
                "service '{}' does not enable fallback",
                self.service.service_id
            )));
        }
        self.dispatcher = self.dispatcher.with_fallback(Arc::new(fallback));
        Ok(self)
    }

    /// Invoke a declared method with positional arguments.
    ///
    /// The reply's variant follows the method's declared shape and
    /// descriptor: `Ready` for synchronous calls, `Pending` or `Deferred`
    /// otherwise.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Reply> {
        let slot = self.contract.method(method).ok_or_else(|| {
            Error::config(format!(
                "method '{}' is not declared by contract '{}'",
                method,
                self.contract.name()
            ))
        })?;
        let descriptor = slot.descriptor.as_ref().ok_or_else(|| {
            Error::config(format!(
                "method '{}' of contract '{}' has no method descriptor",
                method,
                self.contract.name()
            ))
        })?;
        if args.len() != slot.arity {
            return Err(Error::config(format!(
                "method '{}' takes {} arguments, got {}",
                method,
                slot.arity,
                args.len()
            )));
        }

        self.dispatcher
            .invoke(&self.service.service_id, method, descriptor, slot.shape, args)
    }

    /// Invoke and wait for a typed result.
    pub fn call_blocking<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        match self.invoke(method, args)? {
            Reply::Ready(value) => decode(value),
            Reply::Pending(handle) => handle.cast().wait(),
            Reply::Deferred(deferred) => deferred.cast().wait(),
        }
    }

    /// Invoke and get a handle to the running call.
    pub fn call_future<T>(&self, method: &str, args: Vec<Value>) -> Result<CallHandle<T>> {
        match self.invoke(method, args)? {
            Reply::Pending(handle) => Ok(handle.cast()),
            _ => Err(shape_mismatch(method, "future")),
        }
    }

    /// Invoke lazily; the call starts when the value is first polled.
    pub fn call_deferred<T>(&self, method: &str, args: Vec<Value>) -> Result<Deferred<T>> {
        match self.invoke(method, args)? {
            Reply::Deferred(deferred) => Ok(deferred.cast()),
            _ => Err(shape_mismatch(method, "deferred")),
        }
    }
}

fn shape_mismatch(method: &str, expected: &str) -> Error {
    Error::config(format!("method '{}' is not declared as {}", method, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodDescriptor, ReturnShape};
    use crate::fallback::StaticFallback;
    use courier_client::MockTransport;
    use serde_json::json;

    fn contract() -> ServiceContract {
        ServiceContract::new("Echo")
            .with_service(ServiceDescriptor::new("echo").with_fallback(true))
            .declare("say", ReturnShape::Blocking, 1, Some(MethodDescriptor::new()))
            .declare("say_later", ReturnShape::Future, 1, Some(MethodDescriptor::new()))
            .declare("say_lazily", ReturnShape::Deferred, 0, Some(MethodDescriptor::new()))
            .declare("undescribed", ReturnShape::Blocking, 0, None)
    }

    fn proxy(mock: Arc<MockTransport>) -> ServiceProxy {
        synthesize_with_pool(contract(), mock, Arc::new(WorkerPool::new(2).unwrap())).unwrap()
    }

    #[test]
    fn test_synthesize_rejects_bad_contracts() {
        let mock: SharedTransport = Arc::new(MockTransport::new());
        let missing = ServiceContract::new("X").declare("m", ReturnShape::Blocking, 0, None);
        assert!(matches!(
            synthesize(missing, mock.clone()),
            Err(Error::Config(_))
        ));

        let empty = ServiceContract::new("X").with_service(ServiceDescriptor::new("x"));
        assert!(synthesize(empty, mock).is_err());
    }

    #[test]
    fn test_synthesize_performs_no_io() {
        let mock = Arc::new(MockTransport::new());
        let proxy = proxy(mock.clone());
        assert_eq!(proxy.service_id(), "echo");
        assert_eq!(proxy.contract().len(), 4);
        assert_eq!(mock.attempt_count(), 0);
    }

    #[test]
    fn test_blocking_call() {
        let mock = Arc::new(MockTransport::new());
        let reply: serde_json::Map<String, Value> = proxy(mock)
            .call_blocking("say", vec![json!("hi")])
            .unwrap();
        assert_eq!(reply["param1"], "hi");
    }

    #[test]
    fn test_undeclared_and_undescribed_methods() {
        let mock = Arc::new(MockTransport::new());
        let proxy = proxy(mock.clone());

        assert!(matches!(proxy.invoke("nope", vec![]), Err(Error::Config(_))));
        assert!(matches!(proxy.invoke("undescribed", vec![]), Err(Error::Config(_))));
        assert!(matches!(proxy.invoke("say", vec![]), Err(Error::Config(_))));
        assert_eq!(mock.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_future_and_deferred_calls() {
        let mock = Arc::new(MockTransport::replying(json!(5)));
        let proxy = proxy(mock.clone());

        let handle: CallHandle<u32> = proxy.call_future("say_later", vec![json!(1)]).unwrap();
        assert_eq!(handle.await.unwrap(), 5);

        let deferred: Deferred<u32> = proxy.call_deferred("say_lazily", vec![]).unwrap();
        assert_eq!(mock.attempt_count(), 1);
        assert_eq!(deferred.await.unwrap(), 5);
        assert_eq!(mock.attempt_count(), 2);
    }

    #[test]
    fn test_shape_mismatch() {
        let proxy = proxy(Arc::new(MockTransport::new()));
        assert!(proxy.call_future::<Value>("say", vec![json!(1)]).is_err());
    }

    #[test]
    fn test_fallback_requires_enabled_service() {
        let mock: SharedTransport = Arc::new(MockTransport::failing("down"));
        let contract = ServiceContract::new("X")
            .with_service(ServiceDescriptor::new("x"))
            .declare("m", ReturnShape::Blocking, 0, Some(MethodDescriptor::new()));
        let proxy = synthesize(contract, mock).unwrap();
        assert!(proxy.with_fallback(StaticFallback(json!(null))).is_err());
    }

    #[test]
    fn test_fallback_replaces_exhausted_call() {
        let mock = Arc::new(MockTransport::failing("down"));
        let proxy = proxy(mock)
            .with_fallback(|method: &str, _: &courier_client::Params, _: &Error| {
                Ok(json!(format!("fallback for {}", method)))
            })
            .unwrap();
        let reply: String = proxy.call_blocking("say", vec![json!("x")]).unwrap();
        assert_eq!(reply, "fallback for say");
    }
}
