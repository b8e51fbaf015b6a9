//! Static metadata describing a service contract and its methods.

use std::collections::HashSet;
use std::time::Duration;

use courier_client::{Error, Result, RetryPolicy};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default retries after the first attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 0;

/// Default wait before the first retry.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1_000;

/// Default service version.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Identity and behavior of a remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Unique service id; routes every call.
    pub service_id: String,
    /// Service version.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Whether a fallback may replace transient failures.
    pub fallback_enabled: bool,
}

impl ServiceDescriptor {
    /// Create a descriptor for `service_id` with default settings.
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            version: DEFAULT_VERSION.to_string(),
            description: String::new(),
            fallback_enabled: false,
        }
    }

    /// Set the service id.
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = service_id.into();
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Enable or disable fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Check that the descriptor can route calls.
    pub fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() {
            return Err(Error::config("service id cannot be empty"));
        }
        Ok(())
    }
}

/// How a declared method hands its result back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// A plain value; the caller waits.
    Blocking,
    /// A handle to a call that is already running.
    Future,
    /// A lazy single value; the call starts when first polled.
    Deferred,
}

/// Whether a call occupies the caller until it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// The caller blocks until completion or timeout.
    Sync,
    /// The caller gets a handle immediately.
    Async,
}

/// Name of one positional parameter on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Wire name.
    pub name: String,
    /// Reject null and empty-string values before sending.
    pub required: bool,
}

impl ParamSpec {
    /// An optional parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }

    /// A required parameter.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }
}

impl From<&str> for ParamSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ParamSpec {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Per-method invocation behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Remote method name; the declared name when unset.
    pub method_name: Option<String>,
    /// Deadline for the whole call, retries included.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// Wait before the first retry.
    pub retry_interval_ms: u64,
    /// Run asynchronously even for a blocking return shape.
    pub asynchronous: bool,
    /// Positional parameter names; unmapped positions become `paramN`.
    pub params: Vec<ParamSpec>,
}

impl Default for MethodDescriptor {
    fn default() -> Self {
        Self {
            method_name: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            asynchronous: false,
            params: Vec::new(),
        }
    }
}

impl MethodDescriptor {
    /// A descriptor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote method name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = Some(name.into());
        self
    }

    /// Set the call deadline in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the retry interval in milliseconds.
    pub fn with_retry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.retry_interval_ms = interval_ms;
        self
    }

    /// Mark the method asynchronous.
    pub fn with_async(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Set positional parameter names.
    pub fn with_params<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ParamSpec>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the named parameters required.
    ///
    /// Names not yet mapped are appended as the next positions.
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            match self.params.iter_mut().find(|p| p.name == name) {
                Some(param) => param.required = true,
                None => self.params.push(ParamSpec::required(name)),
            }
        }
        self
    }

    /// The remote method name, falling back to the declared one.
    pub fn effective_name<'a>(&'a self, declared: &'a str) -> &'a str {
        self.method_name.as_deref().unwrap_or(declared)
    }

    /// The call deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The per-call retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_interval_ms))
    }

    /// Execution mode for a method declared with `shape`.
    pub fn execution_mode(&self, shape: ReturnShape) -> ExecutionMode {
        match shape {
            ReturnShape::Future | ReturnShape::Deferred => ExecutionMode::Async,
            ReturnShape::Blocking if self.asynchronous => ExecutionMode::Async,
            ReturnShape::Blocking => ExecutionMode::Sync,
        }
    }

    /// Wire names for `arity` positional arguments.
    ///
    /// Position `i` takes the mapped name when present, else `param{i+1}`.
    pub fn param_names(&self, arity: usize) -> Result<Vec<String>> {
        if self.params.len() > arity {
            return Err(Error::config(format!(
                "{} parameter names mapped for {} arguments",
                self.params.len(),
                arity
            )));
        }

        let names: Vec<String> = (0..arity)
            .map(|i| match self.params.get(i) {
                Some(param) => param.name.clone(),
                None => format!("param{}", i + 1),
            })
            .collect();

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(Error::config("parameter name cannot be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!("duplicate parameter name '{}'", name)));
            }
        }
        Ok(names)
    }

    /// Check whether position `i` must be non-empty.
    pub fn is_required(&self, i: usize) -> bool {
        self.params.get(i).is_some_and(|p| p.required)
    }

    /// Check the descriptor against its declaration.
    pub fn validate(&self, declared: &str, arity: usize) -> Result<()> {
        if self.effective_name(declared).trim().is_empty() {
            return Err(Error::config(format!(
                "method '{}' has an empty remote name",
                declared
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config(format!(
                "method '{}' has a zero timeout",
                declared
            )));
        }
        self.param_names(arity)?;
        Ok(())
    }
}
