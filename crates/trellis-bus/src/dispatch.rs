//! # Dispatch
//!
//! Emit options, per-listener outcomes and the mechanics of invoking a
//! listener in synchronous or concurrent mode.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::events::EventRecord;
use crate::subscriber::{Handler, Subscription, SubscriptionId};

/// Options for a single emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Synchronous dispatch halts at the first failing listener.
    /// Ignored by concurrent dispatch.
    pub stop_on_error: bool,

    /// Per-listener deadline for concurrent dispatch.
    /// Ignored by synchronous dispatch.
    pub timeout: Option<Duration>,
}

impl EmitOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a listener did not produce a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerFailure {
    /// The listener returned an error.
    #[error("Listener failed: {0}")]
    Failed(String),

    /// The listener panicked.
    #[error("Listener panicked: {0}")]
    Panicked(String),

    /// The listener did not finish before the deadline. Its task keeps running.
    #[error("Listener timed out after {after:?}")]
    Timeout { after: Duration },

    /// An asynchronous listener was reached by synchronous dispatch.
    #[error("Asynchronous listener requires concurrent dispatch")]
    RequiresConcurrentDispatch,
}

impl ListenerFailure {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result of invoking one listener.
#[derive(Debug, Clone)]
pub struct ListenerOutcome {
    pub listener_id: SubscriptionId,
    pub result: Result<Value, ListenerFailure>,
}

impl ListenerOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ListenerFailure> {
        self.result.as_ref().err()
    }
}

/// Everything an emit produced.
#[derive(Debug, Clone)]
pub struct EmitReport {
    /// The record appended to history.
    pub event: Arc<EventRecord>,

    /// Outcomes in listener priority order. Skipped listeners are absent.
    pub outcomes: Vec<ListenerOutcome>,

    /// Synchronous dispatch stopped early because of `stop_on_error`.
    pub halted: bool,
}

impl EmitReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ListenerOutcome::is_success)
    }

    /// Listener ids in the order their outcomes were recorded.
    #[must_use]
    pub fn listener_ids(&self) -> Vec<SubscriptionId> {
        self.outcomes.iter().map(|o| o.listener_id).collect()
    }
}

/// Run one listener inline.
pub(crate) fn invoke_sync(
    subscription: &Subscription,
    event: &EventRecord,
) -> Result<Value, ListenerFailure> {
    match &subscription.handler {
        Handler::Sync(callback) => match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(result) => result.map_err(|e| ListenerFailure::Failed(format!("{e:#}"))),
            Err(panic) => Err(ListenerFailure::Panicked(panic_message(panic.as_ref()))),
        },
        Handler::Async(_) => Err(ListenerFailure::RequiresConcurrentDispatch),
    }
}

/// A listener that has been started by concurrent dispatch.
pub(crate) enum Launched {
    /// Synchronous handlers finish during launch.
    Ready(Result<Value, ListenerFailure>),
    /// Asynchronous handlers run as independent tasks.
    Spawned(JoinHandle<anyhow::Result<Value>>),
}

/// Start one listener for concurrent dispatch.
///
/// Must be called from within a Tokio runtime.
pub(crate) fn launch(subscription: &Subscription, event: &Arc<EventRecord>) -> Launched {
    match &subscription.handler {
        Handler::Sync(_) => Launched::Ready(invoke_sync(subscription, event)),
        Handler::Async(callback) => {
            match catch_unwind(AssertUnwindSafe(|| callback(Arc::clone(event)))) {
                Ok(future) => Launched::Spawned(tokio::spawn(future)),
                Err(panic) => Launched::Ready(Err(ListenerFailure::Panicked(panic_message(
                    panic.as_ref(),
                )))),
            }
        }
    }
}

/// Wait for a launched listener, racing `timeout` if set.
///
/// A lost race drops the join handle, which detaches the task rather than
/// aborting it.
pub(crate) async fn settle(
    launched: Launched,
    timeout: Option<Duration>,
) -> Result<Value, ListenerFailure> {
    let handle = match launched {
        Launched::Ready(result) => return result,
        Launched::Spawned(handle) => handle,
    };

    let joined = match timeout {
        Some(after) => match tokio::time::timeout(after, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(ListenerFailure::Timeout { after }),
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result.map_err(|e| ListenerFailure::Failed(format!("{e:#}"))),
        Err(join_error) if join_error.is_panic() => Err(ListenerFailure::Panicked(
            panic_message(join_error.into_panic().as_ref()),
        )),
        Err(join_error) => Err(ListenerFailure::Failed(join_error.to_string())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
