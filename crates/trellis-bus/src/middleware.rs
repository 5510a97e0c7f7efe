//! Pre-dispatch middleware.
//!
//! Middleware transforms or vetoes payloads before the caller dispatches
//! them. The pipeline is applied explicitly through
//! [`crate::EventBus::apply_middleware`]; `emit` never runs it.

use serde_json::Value;

use crate::publisher::EventBus;

/// What a middleware decided for one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareAction {
    /// Leave the payload as it is.
    Continue,
    /// Hand this payload to the next stage instead.
    Replace(Value),
    /// Stop the pipeline; the caller must not dispatch.
    Veto,
}

/// A pipeline stage: `(event name, current payload, bus) -> action`.
pub type Middleware = dyn Fn(&str, &Value, &EventBus) -> MiddlewareAction + Send + Sync;
