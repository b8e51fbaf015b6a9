//! Invocation dispatcher.
//!
//! Turns one method call into one transport exchange:
//!
//! ```text
//! args ──prepare──▶ RequestEnvelope ──▶ timeout(with_retry(send)) ──▶ fallback? ──▶ Reply
//!                                       (always on the worker pool)
//! ```
//!
//! Preparation errors (configuration, validation, serialization) return
//! before anything is spawned, whatever the execution mode. The deadline
//! covers every attempt and every backoff wait of a call.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_client::{
    CallTarget, Error, Params, RequestEnvelope, Result, RetryPolicy, SharedTransport, with_retry,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::descriptor::{ExecutionMode, MethodDescriptor, ReturnShape};
use crate::fallback::Fallback;
use crate::handle::{CallHandle, Deferred};
use crate::pool::WorkerPool;

/// Result of a dispatched call, shaped by its execution mode.
#[derive(Debug)]
pub enum Reply {
    /// The call completed on the caller's behalf.
    Ready(Value),
    /// The call is running; await or wait on the handle.
    Pending(CallHandle<Value>),
    /// The call starts when the value is first polled.
    Deferred(Deferred<Value>),
}

/// A call ready to be executed.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    /// Names the call in logs and errors.
    pub target: CallTarget,
    /// Envelope shared by every attempt.
    pub envelope: RequestEnvelope,
    /// Retry budget and backoff.
    pub policy: RetryPolicy,
    /// Deadline for the whole call.
    pub timeout: Duration,
}

/// Executes prepared calls against one transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: SharedTransport,
    pool: Arc<WorkerPool>,
    fallback: Option<Arc<dyn Fallback>>,
}

impl Dispatcher {
    /// Create a dispatcher over `transport`, running calls on `pool`.
    pub fn new(transport: SharedTransport, pool: Arc<WorkerPool>) -> Self {
        Self {
            transport,
            pool,
            fallback: None,
        }
    }

    /// Replace eligible failures with `fallback`'s value.
    pub fn with_fallback(mut self, fallback: Arc<dyn Fallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The transport calls are sent through.
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Map arguments to named params and build the envelope.
    pub fn prepare(
        service_id: &str,
        declared: &str,
        descriptor: &MethodDescriptor,
        args: Vec<Value>,
    ) -> Result<PreparedCall> {
        let method_name = descriptor.effective_name(declared);
        let names = descriptor.param_names(args.len())?;

        let mut params = Params::new();
        for (i, (name, value)) in names.into_iter().zip(args).enumerate() {
            if descriptor.is_required(i) && is_blank(&value) {
                return Err(Error::validation(format!(
                    "required parameter '{}' of {}#{} is empty",
                    name, service_id, method_name
                )));
            }
            params.insert(name, value);
        }

        let envelope = RequestEnvelope::new(service_id, method_name, params);
        envelope.validate()?;

        Ok(PreparedCall {
            target: CallTarget::new(service_id, method_name),
            envelope,
            policy: descriptor.retry_policy(),
            timeout: descriptor.timeout(),
        })
    }

    /// Prepare and run one call in the mode its shape and descriptor select.
    pub fn invoke(
        &self,
        service_id: &str,
        declared: &str,
        descriptor: &MethodDescriptor,
        shape: ReturnShape,
        args: Vec<Value>,
    ) -> Result<Reply> {
        let call = Self::prepare(service_id, declared, descriptor, args)?;
        tracing::trace!(
            service = %call.target.service,
            method = %call.target.method,
            request_id = %call.envelope.request_id,
            params = ?call.envelope.params,
            "dispatching call"
        );

        match (descriptor.execution_mode(shape), shape) {
            (ExecutionMode::Sync, _) => {
                // Submit to the pool, then park this thread on the result.
                let handle: CallHandle<Value> = CallHandle::new(self.pool.spawn(self.execute(call))?);
                Ok(Reply::Ready(handle.wait()?))
            }
            (ExecutionMode::Async, ReturnShape::Deferred) => {
                Ok(Reply::Deferred(Deferred::new(self.pool.handle()?, self.execute(call))))
            }
            (ExecutionMode::Async, _) => {
                Ok(Reply::Pending(CallHandle::new(self.pool.spawn(self.execute(call))?)))
            }
        }
    }

    /// Build the future that performs a prepared call.
    ///
    /// A panic in the transport or fallback is logged here with full detail
    /// and surfaces to the caller as a short internal error.
    pub fn execute(&self, call: PreparedCall) -> BoxFuture<'static, Result<Value>> {
        let service = call.target.service.clone();
        let method = call.target.method.clone();
        let request_id = call.envelope.request_id.clone();
        let transport = Arc::clone(&self.transport);
        let fallback = self.fallback.clone();

        let run = async move {
            let PreparedCall {
                target,
                envelope,
                policy,
                timeout,
            } = call;
            let started = Instant::now();

            let attempts = {
                let transport = &transport;
                let envelope = &envelope;
                with_retry(&policy, &target, move |attempt| {
                    tracing::trace!(
                        request_id = %envelope.request_id,
                        attempt = attempt + 1,
                        "sending attempt"
                    );
                    transport.send(envelope)
                })
            };

            let result = match tokio::time::timeout(timeout, attempts).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    service: target.service.clone(),
                    method: target.method.clone(),
                    timeout,
                }),
            };

            match result {
                Ok(value) => {
                    tracing::debug!(
                        service = %target.service,
                        method = %target.method,
                        request_id = %envelope.request_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "call completed"
                    );
                    Ok(value)
                }
                Err(e) => match fallback.filter(|_| e.is_fallback_eligible()) {
                    Some(fallback) => {
                        tracing::warn!(
                            service = %target.service,
                            method = %target.method,
                            request_id = %envelope.request_id,
                            error = %e,
                            "call failed, using fallback"
                        );
                        fallback.fallback(&target.method, &envelope.params, &e)
                    }
                    None => {
                        tracing::error!(
                            service = %target.service,
                            method = %target.method,
                            request_id = %envelope.request_id,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            error = %e,
                            "call failed"
                        );
                        Err(e)
                    }
                },
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    tracing::error!(
                        service = %service,
                        method = %method,
                        request_id = %request_id,
                        panic = %panic_message(panic.as_ref()),
                        "call panicked"
                    );
                    Err(Error::internal(UNEXPECTED_FAILURE))
                }
            }
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoint", &self.transport.endpoint())
            .field("pool", &self.pool)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Message returned to callers when a call dies unexpectedly.
pub(crate) const UNEXPECTED_FAILURE: &str = "call failed unexpectedly";

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::StaticFallback;
    use courier_client::{MockTransport, Transport};
    use serde_json::json;

    fn dispatcher(mock: &Arc<MockTransport>) -> Dispatcher {
        Dispatcher::new(mock.clone(), Arc::new(WorkerPool::new(2).unwrap()))
    }

    #[test]
    fn test_prepare_positional_names() {
        let call = Dispatcher::prepare(
            "svc",
            "m",
            &MethodDescriptor::new(),
            vec![json!("a"), json!(2)],
        )
        .unwrap();
        assert_eq!(call.envelope.params.len(), 2);
        assert_eq!(call.envelope.params["param1"], "a");
        assert_eq!(call.envelope.params["param2"], 2);
        assert_eq!(call.envelope.method_name, "m");
        assert_eq!(call.target.to_string(), "svc#m");
    }

    #[test]
    fn test_prepare_mapped_names() {
        let descriptor = MethodDescriptor::new()
            .with_name("getOrder")
            .with_params(["orderId"]);
        let call = Dispatcher::prepare("orders", "get_order", &descriptor, vec![json!("A-1")]).unwrap();
        assert_eq!(call.envelope.method_name, "getOrder");
        assert_eq!(call.envelope.params["orderId"], "A-1");
    }

    #[test]
    fn test_prepare_required() {
        let descriptor = MethodDescriptor::new().with_required(["id"]);
        for blank in [Value::Null, json!("")] {
            let err = Dispatcher::prepare("s", "m", &descriptor, vec![blank]).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert!(Dispatcher::prepare("s", "m", &descriptor, vec![json!(0)]).is_ok());
    }

    #[test]
    fn test_sync_call_returns_ready() {
        let mock = Arc::new(MockTransport::replying(json!({"ok": true})));
        let reply = dispatcher(&mock)
            .invoke("s", "m", &MethodDescriptor::new(), ReturnShape::Blocking, vec![])
            .unwrap();
        assert!(matches!(reply, Reply::Ready(ref v) if v["ok"] == true));
        assert_eq!(mock.attempt_count(), 1);
    }

    #[test]
    fn test_async_flag_returns_pending() {
        let mock = Arc::new(MockTransport::new());
        let descriptor = MethodDescriptor::new().with_async(true);
        let reply = dispatcher(&mock)
            .invoke("s", "m", &descriptor, ReturnShape::Blocking, vec![json!(1)])
            .unwrap();
        match reply {
            Reply::Pending(handle) => assert_eq!(handle.wait().unwrap(), json!({"param1": 1})),
            other => panic!("expected pending reply, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_error_is_immediate_for_async() {
        let mock = Arc::new(MockTransport::new());
        let descriptor = MethodDescriptor::new().with_required(["id"]);
        let err = dispatcher(&mock)
            .invoke("s", "m", &descriptor, ReturnShape::Future, vec![Value::Null])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(mock.attempt_count(), 0);
    }

    #[test]
    fn test_retry_count_invariant() {
        let mock = Arc::new(MockTransport::failing("connection refused"));
        let descriptor = MethodDescriptor::new()
            .with_retry_count(3)
            .with_retry_interval_ms(1);
        let err = dispatcher(&mock)
            .invoke("s", "m", &descriptor, ReturnShape::Blocking, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(mock.attempt_count(), 4);

        // Every attempt carries the same request id
        let requests = mock.requests();
        assert!(requests.iter().all(|r| r.request_id == requests[0].request_id));
    }

    #[test]
    fn test_non_retryable_single_attempt() {
        let mock = Arc::new(MockTransport::with_script(vec![Err(Error::remote(
            "ERROR", "rejected", None,
        ))]));
        let descriptor = MethodDescriptor::new().with_retry_count(5).with_retry_interval_ms(1);
        let err = dispatcher(&mock)
            .invoke("s", "m", &descriptor, ReturnShape::Blocking, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
        assert_eq!(mock.attempt_count(), 1);
    }

    #[test]
    fn test_timeout_bounds_whole_call() {
        let mock = Arc::new(MockTransport::new().with_delay(Duration::from_secs(10)));
        let descriptor = MethodDescriptor::new().with_timeout_ms(100);

        let started = Instant::now();
        let err = dispatcher(&mock)
            .invoke("s", "slow", &descriptor, ReturnShape::Blocking, vec![])
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_fallback_on_transient_only() {
        let mock = Arc::new(MockTransport::with_script(vec![
            Err(Error::transport("down")),
            Err(Error::remote("ERROR", "denied", None)),
        ]));
        let dispatcher =
            dispatcher(&mock).with_fallback(Arc::new(StaticFallback(json!("cached"))));

        let reply = dispatcher
            .invoke("s", "m", &MethodDescriptor::new(), ReturnShape::Blocking, vec![])
            .unwrap();
        assert!(matches!(reply, Reply::Ready(ref v) if v == "cached"));

        let err = dispatcher
            .invoke("s", "m", &MethodDescriptor::new(), ReturnShape::Blocking, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[test]
    fn test_shutdown_transport_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.initialize().unwrap();
        mock.shutdown().unwrap();

        let descriptor = MethodDescriptor::new().with_retry_count(3).with_retry_interval_ms(1);
        let err = dispatcher(&mock)
            .invoke("s", "m", &descriptor, ReturnShape::Blocking, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Shutdown));
    }

    #[test]
    fn test_panic_is_contained_and_terse() {
        let mock = Arc::new(MockTransport::failing("connection refused"));
        let dispatcher = dispatcher(&mock).with_fallback(Arc::new(
            |_: &str, _: &Params, _: &Error| -> Result<Value> { panic!("boom in fallback") },
        ));

        let err = dispatcher
            .invoke("s", "m", &MethodDescriptor::new(), ReturnShape::Blocking, vec![])
            .unwrap_err();
        match err {
            Error::Internal(message) => assert_eq!(message, UNEXPECTED_FAILURE),
            other => panic!("expected internal error, got {:?}", other),
        }

        // The pool survives and serves the next call
        let mock = Arc::new(MockTransport::replying(json!(1)));
        let reply = Dispatcher::new(mock.clone(), Arc::clone(&dispatcher.pool))
            .invoke("s", "m", &MethodDescriptor::new(), ReturnShape::Future, vec![])
            .unwrap();
        match reply {
            Reply::Pending(handle) => assert_eq!(handle.wait().unwrap(), json!(1)),
            other => panic!("expected pending reply, got {:?}", other),
        }
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
