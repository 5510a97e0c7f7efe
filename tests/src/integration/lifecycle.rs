//! # Registry Lifecycle
//!
//! The registry driving component lifecycles with the bus attached:
//! load order, dependency injection, lifecycle events and teardown.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use trellis_bus::{EventBus, Handler, SubscribeOptions};
    use trellis_registry::{
        BindingContext, Component, ComponentError, ComponentRegistry, Constructor, Locator,
        RegistryError, StaticLocator, EVENT_CREATED, EVENT_DESTROYED, EVENT_INITIALIZED,
    };

    use crate::integration::{journal, record, Journal};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    /// Subscribes to `<name>:ping` and answers with its own name.
    struct Pinger {
        name: String,
        bus: EventBus,
        journal: Journal,
    }

    impl Component for Pinger {
        fn render(&self) -> Result<(), ComponentError> {
            self.journal.lock().push(format!("render:{}", self.name));
            Ok(())
        }

        fn teardown(&self) -> Result<(), ComponentError> {
            self.bus.clear_namespace(&self.name);
            self.journal.lock().push(format!("teardown:{}", self.name));
            Ok(())
        }
    }

    fn pinger(bus: &EventBus, journal: &Journal) -> Constructor {
        let bus = bus.clone();
        let journal = Arc::clone(journal);
        Constructor::new(move |ctx| {
            journal.lock().push(format!("create:{}", ctx.name));
            let reply = ctx.name.clone();
            bus.namespace(ctx.name.clone()).on(
                "ping",
                Handler::sync(move |_| Ok(json!(reply))),
                SubscribeOptions::default(),
            );
            Ok(Pinger {
                name: ctx.name,
                bus: bus.clone(),
                journal: Arc::clone(&journal),
            })
        })
        .with_render()
        .with_teardown()
    }

    fn everywhere(name: &str) -> Option<BindingContext> {
        Some(BindingContext::new(format!("#{name}")))
    }

    // =========================================================================
    // LOAD ORDER AND INITIALIZATION
    // =========================================================================

    #[test]
    fn test_end_to_end_dependency_order() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere).with_bus(bus.clone());

        registry.register("a", pinger(&bus, &log), &[]).unwrap();
        registry.register("b", pinger(&bus, &log), &["a"]).unwrap();
        registry.initialize().unwrap();

        assert_eq!(
            *log.lock(),
            vec!["create:a", "render:a", "create:b", "render:b"]
        );
        let stats = registry.get_stats();
        assert_eq!(stats.initialized, 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn test_chain_load_order() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere);
        registry.register("A", pinger(&bus, &log), &["B"]).unwrap();
        registry.register("B", pinger(&bus, &log), &["C"]).unwrap();
        registry.register("C", pinger(&bus, &log), &[]).unwrap();

        assert_eq!(registry.load_order(), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_cycle_blocks_initialization() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere).with_bus(bus.clone());

        registry.register("A", pinger(&bus, &log), &["B"]).unwrap();
        let err = registry.register("B", pinger(&bus, &log), &["A"]).unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");

        assert!(registry.initialize().is_err());
        assert!(log.lock().is_empty());
        assert_eq!(bus.stats().emitted, 0);
    }

    #[test]
    fn test_instances_answer_on_the_bus() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere);
        registry.register("left", pinger(&bus, &log), &[]).unwrap();
        registry.register("right", pinger(&bus, &log), &[]).unwrap();
        registry.initialize().unwrap();

        let report = bus.namespace("right").emit("ping", Value::Null);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].value(), Some(&json!("right")));
    }

    // =========================================================================
    // LIFECYCLE EVENTS
    // =========================================================================

    #[test]
    fn test_lifecycle_events_in_order() {
        let bus = EventBus::new();
        let seen = journal();
        record(&bus, "registry:*", &seen);

        let log = journal();
        let registry = ComponentRegistry::new(everywhere).with_bus(bus.clone());
        registry.register("core", pinger(&bus, &log), &[]).unwrap();
        registry.register("app", pinger(&bus, &log), &["core"]).unwrap();

        registry.initialize().unwrap();
        registry.destroy_all();

        assert_eq!(
            *seen.lock(),
            vec![
                EVENT_CREATED,
                EVENT_CREATED,
                EVENT_INITIALIZED,
                EVENT_DESTROYED,
                EVENT_DESTROYED
            ]
        );
        let destroyed: Vec<Value> = bus
            .history()
            .into_iter()
            .filter(|e| e.name == EVENT_DESTROYED)
            .map(|e| e.payload)
            .collect();
        assert_eq!(
            destroyed,
            vec![json!({ "component": "app" }), json!({ "component": "core" })]
        );
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    #[test]
    fn test_destroy_all_unsubscribes_everything() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere);
        registry.register("x", pinger(&bus, &log), &[]).unwrap();
        registry.register("y", pinger(&bus, &log), &["x"]).unwrap();
        registry.initialize().unwrap();
        assert_eq!(bus.stats().listeners, 2);

        assert_eq!(registry.destroy_all(), 2);
        assert_eq!(bus.stats().listeners, 0);
        assert_eq!(
            log.lock().iter().rev().take(2).cloned().collect::<Vec<_>>(),
            vec!["teardown:x", "teardown:y"]
        );
    }

    #[test]
    fn test_reinitialize_after_destroy_all() {
        let bus = EventBus::new();
        let log = journal();
        let registry = ComponentRegistry::new(everywhere);
        registry.register("x", pinger(&bus, &log), &[]).unwrap();
        registry.initialize().unwrap();
        assert!(matches!(
            registry.initialize(),
            Err(RegistryError::AlreadyInitialized)
        ));

        registry.destroy_all();
        registry.initialize().unwrap();
        assert_eq!(bus.listener_count("x:ping"), 1);
    }

    // =========================================================================
    // LOCATOR
    // =========================================================================

    #[test]
    fn test_locator_controls_what_initializes() {
        let bus = EventBus::new();
        let log = journal();
        let locator = Arc::new(StaticLocator::new().bind("page", BindingContext::new("#page")));
        let registry = ComponentRegistry::from_shared(Arc::clone(&locator) as Arc<dyn Locator>);
        registry.register("page", pinger(&bus, &log), &["store"]).unwrap();
        registry.register("store", pinger(&bus, &log), &[]).unwrap();

        registry.initialize().unwrap();
        assert!(registry.get("store").is_none());

        locator.insert("store", BindingContext::new("#store"));
        registry.destroy_all();
        registry.initialize().unwrap();
        assert!(registry.get("store").is_some());
        assert_eq!(
            log.lock().iter().filter(|l| l.starts_with("create:")).count(),
            3
        );
    }
}
