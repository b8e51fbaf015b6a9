//! Substitute results for calls that could not reach the remote side.

use courier_client::{Error, Params, Result};
use serde_json::Value;

/// Produces a value in place of a failed call.
///
/// Only consulted for services with fallback enabled, and only for
/// transient, timed-out, or exhausted-retry failures.
pub trait Fallback: Send + Sync {
    /// Produce the substitute reply for `method`.
    fn fallback(&self, method: &str, params: &Params, error: &Error) -> Result<Value>;
}

impl<F> Fallback for F
where
    F: Fn(&str, &Params, &Error) -> Result<Value> + Send + Sync,
{
    fn fallback(&self, method: &str, params: &Params, error: &Error) -> Result<Value> {
        self(method, params, error)
    }
}

/// A fallback that always answers with the same value.
#[derive(Debug, Clone)]
pub struct StaticFallback(pub Value);

impl Fallback for StaticFallback {
    fn fallback(&self, _method: &str, _params: &Params, _error: &Error) -> Result<Value> {
        Ok(self.0.clone())
    }
}
