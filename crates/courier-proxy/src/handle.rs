//! Handles for asynchronous calls.
//!
//! [`CallHandle`] is eager: the call is already running on the worker pool.
//! [`Deferred`] is lazy: nothing is sent until it is first polled.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use courier_client::{Error, Result};
use futures::future::BoxFuture;
use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use crate::dispatcher::UNEXPECTED_FAILURE;

/// Decode a raw reply into the declared return type.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn join_error(err: JoinError) -> Error {
    if err.is_cancelled() {
        return Error::internal("call was cancelled");
    }
    tracing::error!(task = %err.id(), error = %err, "call task failed");
    Error::internal(UNEXPECTED_FAILURE)
}

/// Refuse to park a worker-pool thread on another pool call.
pub(crate) fn ensure_off_pool() -> Result<()> {
    if crate::pool::on_worker_thread() {
        return Err(Error::config(
            "blocking courier call made from a worker pool thread; await the handle instead",
        ));
    }
    Ok(())
}

/// A running call whose result arrives later.
#[must_use = "a call handle does nothing unless awaited or waited on"]
pub struct CallHandle<T> {
    inner: JoinHandle<Result<Value>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CallHandle<T> {
    pub(crate) fn new(inner: JoinHandle<Result<Value>>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Reinterpret the result as another type.
    pub fn cast<U>(self) -> CallHandle<U> {
        CallHandle::new(self.inner)
    }

    /// Check if the call has completed.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Stop waiting for the call.
    ///
    /// The in-flight request is not guaranteed to be aborted remotely.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

impl<T: DeserializeOwned> CallHandle<T> {
    /// Block the current thread until the call completes.
    ///
    /// Safe to use from inside another runtime: the call runs on the
    /// worker pool, not on the waiting thread. Not safe from a pool worker
    /// itself (a fallback making a blocking proxy call, say): the parked
    /// worker can starve the pool, so those calls fail with a config error.
    pub fn wait(self) -> Result<T> {
        ensure_off_pool()?;
        futures::executor::block_on(self)
    }
}

impl<T: DeserializeOwned> Future for CallHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(decode)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(join_error(e))),
        }
    }
}

impl<T> std::fmt::Debug for CallHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("finished", &self.inner.is_finished())
            .finish()
    }
}

enum DeferredState {
    Idle(Handle, BoxFuture<'static, Result<Value>>),
    Running(JoinHandle<Result<Value>>),
    Done,
}

/// A lazy single-value call.
///
/// The request is spawned onto the worker pool on first poll; dropping an
/// unpolled `Deferred` sends nothing.
#[must_use = "a deferred call does nothing unless polled"]
pub struct Deferred<T> {
    state: DeferredState,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Deferred<T> {
    pub(crate) fn new(pool: Handle, call: BoxFuture<'static, Result<Value>>) -> Self {
        Self {
            state: DeferredState::Idle(pool, call),
            _marker: PhantomData,
        }
    }

    /// Reinterpret the result as another type.
    pub fn cast<U>(self) -> Deferred<U> {
        Deferred {
            state: self.state,
            _marker: PhantomData,
        }
    }

    /// Check if the call has been started.
    pub fn is_started(&self) -> bool {
        !matches!(self.state, DeferredState::Idle(..))
    }
}

impl<T: DeserializeOwned> Deferred<T> {
    /// Expose the value as a one-item stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        stream::once(self)
    }

    /// Start the call and block the current thread until it completes.
    ///
    /// Fails with a config error on a pool worker, like [`CallHandle::wait`].
    pub fn wait(self) -> Result<T> {
        ensure_off_pool()?;
        futures::executor::block_on(self)
    }
}

impl<T: DeserializeOwned> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            match std::mem::replace(&mut self.state, DeferredState::Done) {
                DeferredState::Idle(pool, call) => {
                    self.state = DeferredState::Running(pool.spawn(call));
                }
                DeferredState::Running(mut join) => {
                    return match Pin::new(&mut join).poll(cx) {
                        Poll::Pending => {
                            self.state = DeferredState::Running(join);
                            Poll::Pending
                        }
                        Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(decode)),
                        Poll::Ready(Err(e)) => Poll::Ready(Err(join_error(e))),
                    };
                }
                DeferredState::Done => {
                    return Poll::Ready(Err(Error::internal("deferred call polled after completion")));
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("started", &self.is_started())
            .finish()
    }
}
