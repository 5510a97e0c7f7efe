//! Namespaced views of an [`EventBus`].
//!
//! A namespace prefixes event names with `"<namespace>:"` and tags every
//! subscription made through it, so a feature area can drop all of its
//! listeners at once with [`NamespacedBus::clear`].

use serde_json::Value;

use crate::dispatch::{EmitOptions, EmitReport};
use crate::publisher::EventBus;
use crate::subscriber::{Handler, SubscribeOptions, SubscriptionHandle};
use crate::NAMESPACE_SEPARATOR;

/// An [`EventBus`] bound to one namespace.
#[derive(Debug, Clone)]
pub struct NamespacedBus {
    bus: EventBus,
    namespace: String,
}

impl NamespacedBus {
    pub(crate) fn new(bus: EventBus, namespace: String) -> Self {
        Self { bus, namespace }
    }

    /// The namespace this view is bound to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified name of `event` inside this namespace.
    #[must_use]
    pub fn qualify(&self, event: &str) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, event)
    }

    /// Subscribe to `<namespace>:<event>`, tagged with this namespace.
    pub fn on(&self, event: &str, handler: Handler, options: SubscribeOptions) -> SubscriptionHandle {
        self.bus.on(
            self.qualify(event),
            handler,
            options.namespace(self.namespace.clone()),
        )
    }

    /// One-shot variant of [`Self::on`].
    pub fn once(
        &self,
        event: &str,
        handler: Handler,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        self.on(event, handler, options.once())
    }

    /// Emit `<namespace>:<event>` synchronously.
    pub fn emit(&self, event: &str, payload: Value) -> EmitReport {
        self.bus.emit(&self.qualify(event), payload)
    }

    /// Emit `<namespace>:<event>` synchronously with options.
    pub fn emit_with(&self, event: &str, payload: Value, options: EmitOptions) -> EmitReport {
        self.bus.emit_with(&self.qualify(event), payload, options)
    }

    /// Emit `<namespace>:<event>` concurrently.
    pub async fn emit_async(&self, event: &str, payload: Value, options: EmitOptions) -> EmitReport {
        self.bus.emit_async(&self.qualify(event), payload, options).await
    }

    /// Number of subscribers of `<namespace>:<event>`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.bus.listener_count(&self.qualify(event))
    }

    /// Remove every subscription tagged with this namespace.
    pub fn clear(&self) -> usize {
        self.bus.clear_namespace(&self.namespace)
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
