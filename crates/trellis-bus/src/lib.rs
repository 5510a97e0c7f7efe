//! # Trellis Bus - Event Bus for Inter-Component Communication
//!
//! Components never hold references to each other. They coordinate by
//! subscribing to and publishing named events on a shared [`EventBus`].
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Component A  │                    │ Component B  │
//! │              │    emit()          │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │  (priority)  │ ─────────┘
//!                  └──────────────┘     on()
//! ```
//!
//! ## Dispatch
//!
//! - **Synchronous** ([`EventBus::emit_with`]): listeners run one after another
//!   in descending priority. Failures are captured per listener and only halt
//!   dispatch when `stop_on_error` is set.
//! - **Concurrent** ([`EventBus::emit_async`]): all listeners are launched
//!   together, each optionally racing a timeout. Outcomes are reported in
//!   priority order regardless of completion order.
//!
//! Every dispatch works on a snapshot of the subscriber list taken when the
//! event is emitted, so listeners may subscribe or unsubscribe freely.
//!
//! ## Extras
//!
//! - Namespaced views ([`NamespacedBus`]) for bulk unsubscription
//! - Wildcard subscriptions (`user:*`, `item-?`)
//! - Caller-driven middleware pipeline
//! - Bounded event history

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dispatch;
pub mod error;
pub mod events;
pub mod history;
pub mod middleware;
pub mod namespace;
pub mod pattern;
pub mod publisher;
pub mod subscriber;

use std::time::Duration;

// Re-export main types
pub use dispatch::{EmitOptions, EmitReport, ListenerFailure, ListenerOutcome};
pub use error::BusError;
pub use events::{Event, EventRecord};
pub use history::EventHistory;
pub use middleware::{Middleware, MiddlewareAction};
pub use namespace::NamespacedBus;
pub use pattern::WildcardPattern;
pub use publisher::{BusStats, EventBus};
pub use subscriber::{Handler, SubscribeOptions, SubscriptionHandle, SubscriptionId};

/// Number of events kept in history unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Channel that holds every wildcard subscription.
pub const WILDCARD_CHANNEL: &str = "*";

/// Separator between a namespace and the event name it qualifies.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Tunables for an [`EventBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum number of records kept in history. Zero disables history.
    pub history_capacity: usize,

    /// Timeout applied to concurrent dispatch when the caller sets none.
    pub default_timeout: Option<Duration>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            default_timeout: None,
        }
    }
}
