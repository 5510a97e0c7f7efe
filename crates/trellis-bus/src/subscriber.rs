//! # Event Subscriber
//!
//! Defines the subscription side of the event bus: handlers, subscription
//! options and the handle returned by [`crate::EventBus::on`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Event;
use crate::pattern::WildcardPattern;
use crate::publisher::BusShared;

/// Opaque identifier of a subscription.
///
/// Identifiers increase monotonically, so they also encode creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type SyncCallback = dyn Fn(&Event) -> anyhow::Result<Value> + Send + Sync;
type AsyncCallback = dyn Fn(Arc<Event>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// Predicate deciding whether a listener runs for a given event.
pub type Condition = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// A listener callback.
///
/// Handlers are reference counted: clones refer to the same callback, which
/// is what [`crate::EventBus::off_handler`] compares against.
#[derive(Clone)]
pub enum Handler {
    /// Runs to completion inside the dispatch loop.
    Sync(Arc<SyncCallback>),
    /// Produces a future; only driven by concurrent dispatch.
    Async(Arc<AsyncCallback>),
}

impl Handler {
    /// Wrap a synchronous callback.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(callback))
    }

    /// Wrap an asynchronous callback.
    pub fn future<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |event| callback(event).boxed()))
    }

    /// Whether both handles point at the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Handler) -> bool {
        match (self, other) {
            (Self::Sync(a), Self::Sync(b)) => Arc::ptr_eq(a, b),
            (Self::Async(a), Self::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this handler needs concurrent dispatch to run.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Options accepted by [`crate::EventBus::on`].
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    /// Remove the subscription after its first invocation.
    pub once: bool,

    /// Higher priorities run first. Ties keep subscription order.
    pub priority: i32,

    /// Tag used for bulk removal via namespace clearing.
    pub namespace: Option<String>,

    /// Skip the listener when this returns `false`.
    pub condition: Option<Condition>,
}

impl SubscribeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("once", &self.once)
            .field("priority", &self.priority)
            .field("namespace", &self.namespace)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// A live entry in a subscriber list.
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) id: SubscriptionId,
    /// Key of the list holding this entry (event name or wildcard channel).
    pub(crate) channel: String,
    pub(crate) handler: Handler,
    pub(crate) priority: i32,
    pub(crate) once: bool,
    pub(crate) namespace: Option<String>,
    pub(crate) condition: Option<Condition>,
    pub(crate) pattern: Option<Arc<WildcardPattern>>,
}

impl Subscription {
    /// Evaluate the condition predicate; absent predicates always accept.
    pub(crate) fn accepts(&self, event: &Event) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition(event))
    }

    /// Wildcard entries only fire for matching names.
    pub(crate) fn matches_name(&self, event: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.matches(event))
    }
}

/// Insert `entry` before the first subscription with a strictly lower
/// priority, so equal priorities keep insertion order.
pub(crate) fn insert_by_priority(list: &mut Vec<Subscription>, entry: Subscription) {
    let index = list
        .iter()
        .position(|existing| existing.priority < entry.priority)
        .unwrap_or(list.len());
    list.insert(index, entry);
}

/// Handle to a subscription, returned by `on`/`once`/`on_pattern`.
///
/// Dropping the handle does not unsubscribe; call [`Self::unsubscribe`].
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    channel: String,
    bus: Weak<BusShared>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, channel: String, bus: Weak<BusShared>) -> Self {
        Self { id, channel, bus }
    }

    /// Identifier of the subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event name (or wildcard channel) the subscription lives under.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.remove_subscription(&self.channel, self.id))
    }
}
