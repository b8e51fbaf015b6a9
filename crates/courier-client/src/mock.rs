//! Scriptable in-memory transport for testing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::envelope::{EventEnvelope, RequestEnvelope};
use crate::error::{Error, Result};
use crate::transport::{Lifecycle, LifecycleState, Transport};

/// What the mock does once its script runs out.
#[derive(Debug, Clone)]
enum Fallthrough {
    /// Reply with the request params as a JSON object.
    Echo,
    /// Reply with a fixed value.
    Reply(Value),
    /// Fail with a retryable transport error.
    Fail(String),
}

/// A transport that replays scripted outcomes and logs every attempt.
///
/// Scripted outcomes are consumed in order, one per `send`. Once the script
/// is empty the fallthrough applies (echoing params by default).
pub struct MockTransport {
    endpoint: String,
    script: Mutex<VecDeque<Result<Value>>>,
    fallthrough: Fallthrough,
    delay: Option<Duration>,
    healthy: bool,
    fail_shutdown: bool,
    request_log: Mutex<Vec<(Instant, RequestEnvelope)>>,
    event_log: Mutex<Vec<EventEnvelope>>,
    lifecycle: Lifecycle<()>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock that echoes params back.
    pub fn new() -> Self {
        Self {
            endpoint: "mock://courier".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallthrough: Fallthrough::Echo,
            delay: None,
            healthy: true,
            fail_shutdown: false,
            request_log: Mutex::new(Vec::new()),
            event_log: Mutex::new(Vec::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Create a mock that always replies with `value`.
    pub fn replying(value: Value) -> Self {
        Self {
            fallthrough: Fallthrough::Reply(value),
            ..Self::new()
        }
    }

    /// Create a mock whose every attempt fails with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallthrough: Fallthrough::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Create a mock that replays `outcomes` in order.
    pub fn with_script(outcomes: Vec<Result<Value>>) -> Self {
        let mock = Self::new();
        *mock.script.lock() = outcomes.into();
        mock
    }

    /// Set the endpoint label.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sleep this long before answering each attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the health probe result.
    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Make `shutdown` fail (after still transitioning to shut down).
    pub fn with_failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: Result<Value>) {
        self.script.lock().push_back(outcome);
    }

    /// Get all envelopes sent, one per attempt.
    pub fn requests(&self) -> Vec<RequestEnvelope> {
        self.request_log
            .lock()
            .iter()
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Get the number of attempts made.
    pub fn attempt_count(&self) -> usize {
        self.request_log.lock().len()
    }

    /// Gaps between consecutive attempts.
    pub fn attempt_gaps(&self) -> Vec<Duration> {
        let log = self.request_log.lock();
        log.windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }

    /// Get all published events.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.event_log.lock().clone()
    }

    fn next_outcome(&self, envelope: &RequestEnvelope) -> Result<Value> {
        if let Some(outcome) = self.script.lock().pop_front() {
            return outcome;
        }
        match &self.fallthrough {
            Fallthrough::Echo => Ok(Value::Object(envelope.params.clone())),
            Fallthrough::Reply(value) => Ok(value.clone()),
            Fallthrough::Fail(message) => Err(Error::transport(message.clone())),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, envelope: &RequestEnvelope) -> Result<Value> {
        self.lifecycle.acquire(|| Ok(()))?;
        self.request_log
            .lock()
            .push((Instant::now(), envelope.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome(envelope)
    }

    async fn health_check(&self) -> bool {
        self.is_available() && self.healthy
    }

    fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize(|| Ok(()))?;
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.lifecycle.shutdown();
        if self.fail_shutdown {
            return Err(Error::internal(format!(
                "{}: failed to release resources",
                self.endpoint
            )));
        }
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    async fn invoke_model(&self, _model_id: &str, payload: Value) -> Result<Value> {
        self.lifecycle.acquire(|| Ok(()))?;
        Ok(payload)
    }

    async fn publish_event(&self, event: &EventEnvelope) -> Result<bool> {
        self.lifecycle.acquire(|| Ok(()))?;
        self.event_log.lock().push(event.clone());
        Ok(true)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("endpoint", &self.endpoint)
            .field("state", &self.lifecycle.state())
            .field("attempts", &self.attempt_count())
            .finish()
    }
}
