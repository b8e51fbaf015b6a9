//! Logical request and response shapes exchanged with a transport.
//!
//! ```text
//! request:  {"serviceId": "...", "methodName": "...", "params": {...}, "requestId": "..."}
//! response: {"code": "SUCCESS" | "ERROR" | "PENDING", "message": "...", "data": ...}
//! ```
//!
//! Responses that do not carry a recognised `code` are passed through as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Named call parameters; keys are unique by construction.
pub type Params = Map<String, Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// A request to invoke one method of one remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Target service id.
    pub service_id: String,
    /// Remote method name.
    pub method_name: String,
    /// Named parameters.
    #[serde(default)]
    pub params: Params,
    /// Correlation id, unique per call and shared by its retries.
    pub request_id: String,
}

impl RequestEnvelope {
    /// Create an envelope with a fresh request id.
    pub fn new(service_id: impl Into<String>, method_name: impl Into<String>, params: Params) -> Self {
        Self {
            service_id: service_id.into(),
            method_name: method_name.into(),
            params,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check the ids a transport needs to route the call.
    pub fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() || self.method_name.trim().is_empty() {
            return Err(Error::config("service id and method name cannot be empty"));
        }
        Ok(())
    }
}

/// An event published to the remote event endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event type.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub event_data: Params,
    /// Unique event id.
    pub event_id: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

impl EventEnvelope {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(event_type: impl Into<String>, event_data: Params) -> Self {
        Self {
            event_type: event_type.into(),
            event_data,
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Status carried by a wrapped service response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The call succeeded.
    Success,
    /// The call failed on the remote side.
    Error,
    /// The call was accepted and is still being processed.
    Pending,
}

impl ResponseStatus {
    fn parse(code: &str) -> Option<Self> {
        match code {
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            "PENDING" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// A wrapped service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    /// Outcome.
    pub code: ResponseStatus,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Echo of the request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Response time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Additional information.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ServiceResponse {
    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.code == ResponseStatus::Error
    }

    /// Get the payload, or a remote error if the response signals failure.
    pub fn into_result(self) -> Result<Value> {
        match self.code {
            ResponseStatus::Error => Err(Error::remote(
                "ERROR",
                self.message.unwrap_or_else(|| "remote call failed".to_string()),
                self.data,
            )),
            ResponseStatus::Success | ResponseStatus::Pending => {
                Ok(self.data.unwrap_or(Value::Null))
            }
        }
    }
}

/// Unwrap a raw response body.
///
/// Bodies carrying a recognised `code` are treated as [`ServiceResponse`];
/// anything else is returned unchanged.
pub fn decode_reply(body: Value) -> Result<Value> {
    let wrapped = body
        .get("code")
        .and_then(Value::as_str)
        .and_then(ResponseStatus::parse)
        .is_some();

    if wrapped {
        let response: ServiceResponse = serde_json::from_value(body)?;
        response.into_result()
    } else {
        Ok(body)
    }
}
