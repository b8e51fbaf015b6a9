//! HTTP transport client.
//!
//! Routes every logical call to a JSON POST under the configured base URL:
//!
//! ```text
//! send            POST {base}/services/{serviceId}/methods/{methodName}
//! invoke_model    POST {base}/models/{modelId}/invoke
//! publish_event   POST {base}/events/publish
//! health_check    GET  {base}/health
//! ```

use std::time::Duration;

use async_trait::async_trait;
use courier_config::ClientConfig;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::envelope::{EventEnvelope, Params, RequestEnvelope, decode_reply};
use crate::error::{Error, Result};
use crate::retry::{CallTarget, RetryPolicy, with_retry};
use crate::transport::{Lifecycle, LifecycleState, Transport};

/// Bound on the health probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on [`HttpTransport::send_event`].
const SEND_EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the application id.
const APP_ID_HEADER: &str = "x-app-id";

/// A transport client speaking JSON over HTTP.
///
/// Cheap to share behind an `Arc`; the underlying `reqwest::Client` pools
/// connections and is cloned out of the lifecycle lock for every call.
pub struct HttpTransport {
    config: ClientConfig,
    base_url: Url,
    retry: RetryPolicy,
    lifecycle: Lifecycle<reqwest::Client>,
}

impl HttpTransport {
    /// Create an uninitialized transport from a validated config.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        Ok(Self {
            retry: RetryPolicy::from_config(&config),
            config,
            base_url,
            lifecycle: Lifecycle::new(),
        })
    }

    /// The config this transport was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The client-level retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.config.auth_token {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }
        if let Some(key) = &self.config.api_key {
            headers.insert(HeaderName::from_static(API_KEY_HEADER), header_value(key)?);
        }
        if let Some(app_id) = &self.config.app_id {
            headers.insert(HeaderName::from_static(APP_ID_HEADER), header_value(app_id)?);
        }

        // reqwest has no separate write deadline; it is folded into the
        // per-request total together with the read timeout.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.read_timeout + self.config.write_timeout)
            .https_only(self.config.tls_enabled)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(client)
    }

    /// Get the HTTP client, initializing on first use.
    fn client(&self) -> Result<reqwest::Client> {
        let client = self.lifecycle.acquire(|| self.build_client())?;
        Ok(client)
    }

    /// Build a URL by appending path segments to the base.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// POST a JSON body and decode the reply.
    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Value> {
        let client = self.client()?;
        tracing::trace!(url = %url, "sending courier HTTP request");

        let response = client.post(url).json(body).send().await?;
        let value = read_json(response).await?;

        tracing::trace!(json = %value, "received courier HTTP response");
        Ok(value)
    }

    /// Invoke a service method directly, retried with the client-level policy.
    pub async fn invoke_service(
        &self,
        service_id: &str,
        method_name: &str,
        params: Params,
    ) -> Result<Value> {
        let envelope = RequestEnvelope::new(service_id, method_name, params);
        envelope.validate()?;

        let target = CallTarget::new(service_id, method_name);
        with_retry(&self.retry, &target, |_| self.send(&envelope))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    service = %service_id,
                    method = %method_name,
                    request_id = %envelope.request_id,
                    error = %e,
                    "service invocation failed"
                );
            })
    }

    /// Publish an event and report the outcome as a boolean.
    ///
    /// Bounded at ten seconds; failures are logged and reported as `false`.
    pub async fn send_event(&self, event_type: &str, event_data: Params) -> bool {
        let event = EventEnvelope::new(event_type, event_data);
        match tokio::time::timeout(SEND_EVENT_TIMEOUT, self.publish_event(&event)).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                tracing::error!(event_type = %event_type, error = %e, "failed to send event");
                false
            }
            Err(_) => {
                tracing::error!(event_type = %event_type, "timed out sending event");
                false
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.config.base_url
    }

    async fn send(&self, envelope: &RequestEnvelope) -> Result<Value> {
        envelope.validate()?;
        let url = self.url(&["services", &envelope.service_id, "methods", &envelope.method_name])?;
        let body = self.post(url, envelope).await?;
        decode_reply(body)
    }

    async fn health_check(&self) -> bool {
        let Some(client) = self.lifecycle.current() else {
            return false;
        };
        let url = match self.url(&["health"]) {
            Ok(url) => url,
            Err(_) => return false,
        };

        let response = match client.get(url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(endpoint = %self.config.base_url, error = %e, "health check failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "health check returned non-success status");
            return false;
        }

        // A boolean body is the verdict; any other successful body counts as healthy.
        match response.json::<Value>().await {
            Ok(Value::Bool(healthy)) => healthy,
            _ => true,
        }
    }

    fn initialize(&self) -> Result<()> {
        if self.lifecycle.initialize(|| self.build_client())? {
            tracing::info!(base_url = %self.config.base_url, "courier client initialized");
        } else {
            tracing::warn!(base_url = %self.config.base_url, "courier client already initialized");
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if self.lifecycle.shutdown() {
            tracing::info!(base_url = %self.config.base_url, "courier client shut down");
        } else {
            tracing::warn!(base_url = %self.config.base_url, "courier client is not initialized");
        }
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    async fn invoke_model(&self, model_id: &str, payload: Value) -> Result<Value> {
        if model_id.trim().is_empty() {
            return Err(Error::validation("model id cannot be empty"));
        }

        let url = self.url(&["models", model_id, "invoke"])?;
        let target = CallTarget::new("models", model_id);
        with_retry(&self.retry, &target, |_| self.post(url.clone(), &payload))
            .await
            .inspect_err(|e| {
                tracing::error!(model = %model_id, error = %e, "model invocation failed");
            })
    }

    async fn publish_event(&self, event: &EventEnvelope) -> Result<bool> {
        if event.event_type.trim().is_empty() {
            return Err(Error::validation("event type cannot be empty"));
        }

        let url = self.url(&["events", "publish"])?;
        let target = CallTarget::new("events", &event.event_type);
        let reply = with_retry(&self.retry, &target, |_| self.post(url.clone(), event))
            .await
            .inspect_err(|e| {
                tracing::error!(event_type = %event.event_type, error = %e, "event publish failed");
            })?;

        match reply {
            Value::Bool(accepted) => Ok(accepted),
            other => Err(Error::internal(format!(
                "unexpected event publish reply: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.config.base_url)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::config(format!("invalid header value: {}", e)))
}

/// Classify the status and decode the JSON body.
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();

    if status.is_success() {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("failed to read response body: {}", e)))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body
    };

    if is_retryable_status(status) {
        Err(Error::Unavailable {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(Error::remote(status.as_u16().to_string(), message, None))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}
