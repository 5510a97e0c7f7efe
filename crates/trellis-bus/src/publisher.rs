//! # Event Publisher
//!
//! The [`EventBus`] owns every subscriber list, the middleware pipeline and
//! the event history. It is cheap to clone; clones share the same state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::dispatch::{invoke_sync, launch, settle, EmitOptions, EmitReport, ListenerOutcome};
use crate::error::BusError;
use crate::events::EventRecord;
use crate::history::EventHistory;
use crate::middleware::{Middleware, MiddlewareAction};
use crate::namespace::NamespacedBus;
use crate::pattern::WildcardPattern;
use crate::subscriber::{
    insert_by_priority, Handler, SubscribeOptions, Subscription, SubscriptionHandle,
    SubscriptionId,
};
use crate::{BusConfig, WILDCARD_CHANNEL};

/// Point-in-time counters of an [`EventBus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Event names (including the wildcard channel) with at least one listener.
    pub events: usize,
    /// Total live subscriptions.
    pub listeners: usize,
    /// Subscriptions created through `on_pattern`.
    pub pattern_listeners: usize,
    /// Records currently held in history.
    pub history_len: usize,
    /// History capacity.
    pub history_capacity: usize,
    /// Registered middleware stages.
    pub middleware: usize,
    /// Total events emitted since creation.
    pub emitted: u64,
}

struct BusState {
    /// Subscriber lists keyed by event name, each in dispatch order.
    listeners: HashMap<String, Vec<Subscription>>,
    history: EventHistory,
}

/// State shared by every clone of an [`EventBus`].
pub(crate) struct BusShared {
    state: Mutex<BusState>,
    middleware: RwLock<Vec<Arc<Middleware>>>,
    next_id: AtomicU64,
    emitted: AtomicU64,
    config: BusConfig,
}

impl BusShared {
    /// Remove one subscription by id. Drops the list once it is empty.
    pub(crate) fn remove_subscription(&self, channel: &str, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let Some(list) = state.listeners.get_mut(channel) else {
            return false;
        };
        let Some(index) = list.iter().position(|s| s.id == id) else {
            return false;
        };

        list.remove(index);
        if list.is_empty() {
            state.listeners.remove(channel);
        }
        trace!(channel = channel, listener = %id, "Subscription removed");
        true
    }
}

/// In-process publish/subscribe bus with priority-ordered listeners.
///
/// All listener callbacks run without any bus lock held, so they may
/// subscribe, unsubscribe or emit from inside a dispatch.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                state: Mutex::new(BusState {
                    listeners: HashMap::new(),
                    history: EventHistory::new(config.history_capacity),
                }),
                middleware: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                emitted: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Create a bus keeping at most `capacity` history records.
    #[must_use]
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self::with_config(BusConfig {
            history_capacity: capacity,
            ..BusConfig::default()
        })
    }

    /// Configuration the bus was created with.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Subscribe `handler` to `event`.
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: Handler,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        self.subscribe(event.into(), handler, options, None)
    }

    /// Subscribe `handler` to the next occurrence of `event` only.
    pub fn once(
        &self,
        event: impl Into<String>,
        handler: Handler,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        self.on(event, handler, options.once())
    }

    /// Subscribe to every event whose name matches a wildcard pattern.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidPattern` if the pattern cannot be compiled.
    pub fn on_pattern(
        &self,
        pattern: &str,
        handler: Handler,
    ) -> Result<SubscriptionHandle, BusError> {
        self.on_pattern_with(pattern, handler, SubscribeOptions::default())
    }

    /// [`Self::on_pattern`] with explicit options.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidPattern` if the pattern cannot be compiled.
    pub fn on_pattern_with(
        &self,
        pattern: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle, BusError> {
        let compiled = Arc::new(WildcardPattern::compile(pattern)?);
        Ok(self.subscribe(
            WILDCARD_CHANNEL.to_string(),
            handler,
            options,
            Some(compiled),
        ))
    }

    fn subscribe(
        &self,
        channel: String,
        handler: Handler,
        options: SubscribeOptions,
        pattern: Option<Arc<WildcardPattern>>,
    ) -> SubscriptionHandle {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Subscription {
            id,
            channel: channel.clone(),
            handler,
            priority: options.priority,
            once: options.once,
            namespace: options.namespace,
            condition: options.condition,
            pattern,
        };

        debug!(
            event = %channel,
            listener = %id,
            priority = entry.priority,
            once = entry.once,
            "New subscription created"
        );

        {
            let mut state = self.shared.state.lock();
            insert_by_priority(state.listeners.entry(channel.clone()).or_default(), entry);
        }

        SubscriptionHandle::new(id, channel, Arc::downgrade(&self.shared))
    }

    /// Remove the subscription with `id` from `event`.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.shared.remove_subscription(event, id)
    }

    /// Remove the first subscription on `event` whose handler is `handler`.
    pub fn off_handler(&self, event: &str, handler: &Handler) -> bool {
        let id = {
            let state = self.shared.state.lock();
            state
                .listeners
                .get(event)
                .and_then(|list| list.iter().find(|s| s.handler.same_as(handler)))
                .map(|s| s.id)
        };
        id.is_some_and(|id| self.shared.remove_subscription(event, id))
    }

    /// Remove every subscription tagged with `namespace`, across all events.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let removed = self.remove_where(|s| s.namespace.as_deref() == Some(namespace));
        debug!(namespace = namespace, removed, "Namespace cleared");
        removed
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        let removed = self.remove_where(|_| true);
        debug!(removed, "All subscriptions cleared");
    }

    fn remove_where(&self, predicate: impl Fn(&Subscription) -> bool) -> usize {
        let mut state = self.shared.state.lock();
        let mut removed = 0;
        state.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|s| !predicate(s));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// View of this bus scoped to `namespace`.
    #[must_use]
    pub fn namespace(&self, namespace: impl Into<String>) -> NamespacedBus {
        NamespacedBus::new(self.clone(), namespace.into())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Emit synchronously with default options.
    pub fn emit(&self, event: &str, payload: Value) -> EmitReport {
        self.emit_with(event, payload, EmitOptions::default())
    }

    /// Emit synchronously.
    ///
    /// Listeners run one at a time in priority order. This never suspends.
    pub fn emit_with(&self, event: &str, payload: Value, options: EmitOptions) -> EmitReport {
        let record = self.record(event, payload);
        let snapshot = self.snapshot(event);

        let mut outcomes = Vec::with_capacity(snapshot.len());
        let mut halted = false;

        for subscription in &snapshot {
            if !subscription.accepts(&record) {
                trace!(event = event, listener = %subscription.id, "Listener skipped by condition");
                continue;
            }

            let result = invoke_sync(subscription, &record);
            if subscription.once {
                self.shared
                    .remove_subscription(&subscription.channel, subscription.id);
            }

            let failed = match &result {
                Ok(_) => false,
                Err(failure) => {
                    warn!(event = event, listener = %subscription.id, error = %failure, "Listener failed");
                    true
                }
            };

            outcomes.push(ListenerOutcome {
                listener_id: subscription.id,
                result,
            });

            if failed && options.stop_on_error {
                debug!(event = event, "Dispatch halted on first failure");
                halted = true;
                break;
            }
        }

        EmitReport {
            event: record,
            outcomes,
            halted,
        }
    }

    /// Emit concurrently.
    ///
    /// Every listener is launched before any is awaited. Asynchronous
    /// handlers run as Tokio tasks, so this must be awaited inside a Tokio
    /// runtime. Outcomes come back in priority order.
    pub async fn emit_async(&self, event: &str, payload: Value, options: EmitOptions) -> EmitReport {
        let record = self.record(event, payload);
        let snapshot = self.snapshot(event);
        let timeout = options.timeout.or(self.shared.config.default_timeout);

        if options.stop_on_error {
            trace!(event = event, "stop_on_error has no effect on concurrent dispatch");
        }

        let mut launched = Vec::with_capacity(snapshot.len());
        for subscription in &snapshot {
            if !subscription.accepts(&record) {
                trace!(event = event, listener = %subscription.id, "Listener skipped by condition");
                continue;
            }
            if subscription.once {
                self.shared
                    .remove_subscription(&subscription.channel, subscription.id);
            }
            launched.push((subscription.id, launch(subscription, &record)));
        }
        drop(snapshot);

        let outcomes = join_all(launched.into_iter().map(|(listener_id, started)| async move {
            ListenerOutcome {
                listener_id,
                result: settle(started, timeout).await,
            }
        }))
        .await;

        for outcome in &outcomes {
            if let Some(failure) = outcome.failure() {
                warn!(event = event, listener = %outcome.listener_id, error = %failure, "Listener failed");
            }
        }

        EmitReport {
            event: record,
            outcomes,
            halted: false,
        }
    }

    fn record(&self, event: &str, payload: Value) -> Arc<EventRecord> {
        let record = Arc::new(EventRecord::new(event, payload));
        self.shared.emitted.fetch_add(1, Ordering::Relaxed);

        let evicted = self.shared.state.lock().history.push(Arc::clone(&record));
        if let Some(evicted) = evicted {
            trace!(evicted = %evicted.id, "History full, oldest record evicted");
        }

        debug!(event = event, id = %record.id, "Event emitted");
        record
    }

    /// Subscribers for `event` at this instant, in dispatch order.
    fn snapshot(&self, event: &str) -> Vec<Subscription> {
        let state = self.shared.state.lock();
        let wildcards = state.listeners.get(WILDCARD_CHANNEL);

        // Emitting "*" itself reaches only the wildcard entries whose pattern
        // accepts the literal name.
        if event == WILDCARD_CHANNEL {
            return wildcards.map_or_else(Vec::new, |wildcards| {
                wildcards
                    .iter()
                    .filter(|s| s.matches_name(event))
                    .cloned()
                    .collect()
            });
        }

        let mut snapshot = state.listeners.get(event).cloned().unwrap_or_default();
        if let Some(wildcards) = wildcards {
            let before = snapshot.len();
            snapshot.extend(wildcards.iter().filter(|s| s.matches_name(event)).cloned());
            if snapshot.len() != before {
                // Ids follow creation order, so this keeps ties stable.
                snapshot.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
            }
        }

        snapshot
    }

    // ------------------------------------------------------------------
    // Middleware
    // ------------------------------------------------------------------

    /// Append a stage to the middleware pipeline.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(&str, &Value, &EventBus) -> MiddlewareAction + Send + Sync + 'static,
    {
        self.shared.middleware.write().push(Arc::new(middleware));
    }

    /// Run `payload` through the pipeline.
    ///
    /// Returns `None` if a stage vetoed it; the caller must then skip the emit.
    pub fn apply_middleware(&self, event: &str, payload: Value) -> Option<Value> {
        let pipeline = self.shared.middleware.read().clone();
        let mut current = payload;

        for stage in &pipeline {
            match stage(event, &current, self) {
                MiddlewareAction::Continue => {}
                MiddlewareAction::Replace(next) => current = next,
                MiddlewareAction::Veto => {
                    debug!(event = event, "Payload vetoed by middleware");
                    return None;
                }
            }
        }

        Some(current)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Whether `event` has at least one direct subscriber.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Number of direct subscribers of `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared
            .state
            .lock()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Names of every event with subscribers, sorted.
    #[must_use]
    pub fn all_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.shared.state.lock().listeners.keys().cloned().collect();
        events.sort();
        events
    }

    /// Copy of the history buffer, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<EventRecord> {
        self.shared.state.lock().history.snapshot()
    }

    /// Drop every history record.
    pub fn clear_history(&self) {
        self.shared.state.lock().history.clear();
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let state = self.shared.state.lock();
        BusStats {
            events: state.listeners.len(),
            listeners: state.listeners.values().map(Vec::len).sum(),
            pattern_listeners: state.listeners.get(WILDCARD_CHANNEL).map_or(0, Vec::len),
            history_len: state.history.len(),
            history_capacity: state.history.capacity(),
            middleware: self.shared.middleware.read().len(),
            emitted: self.shared.emitted.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("stats", &self.stats()).finish()
    }
}
