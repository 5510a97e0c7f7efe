//! # Event Choreography
//!
//! Bus dispatch semantics observed end to end, then the built-in
//! components of the runtime reacting to each other purely through events.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use trellis_bus::{
        BusConfig, EmitOptions, EventBus, Handler, ListenerFailure, SubscribeOptions,
    };
    use trellis_registry::EVENT_DESTROYED;
    use trellis_runtime::components::events::{
        AUTH_LOGIN, AUTH_LOGOUT, ROUTE_CHANGED, ROUTE_DENIED, ROUTE_NAVIGATE, SESSION_CHANGED,
    };
    use trellis_runtime::components::{Navigation, Notifications, Router, Session};
    use trellis_runtime::{RuntimeConfig, TrellisRuntime, APP_READY, APP_SHUTDOWN};

    use crate::integration::{journal, record, Journal};

    fn tagged(journal: &Journal, tag: &'static str) -> Handler {
        let sink = Arc::clone(journal);
        Handler::sync(move |_| {
            sink.lock().push(tag.to_string());
            Ok(Value::Null)
        })
    }

    // =========================================================================
    // DISPATCH ORDER
    // =========================================================================

    #[test]
    fn test_priority_order_with_stable_ties() {
        let bus = EventBus::new();
        let log = journal();
        bus.on("tick", tagged(&log, "p1"), SubscribeOptions::new().priority(1));
        bus.on("tick", tagged(&log, "p5"), SubscribeOptions::new().priority(5));
        bus.on("tick", tagged(&log, "p3"), SubscribeOptions::new().priority(3));
        bus.on("tick", tagged(&log, "p3-late"), SubscribeOptions::new().priority(3));

        bus.emit("tick", Value::Null);
        assert_eq!(*log.lock(), vec!["p5", "p3", "p3-late", "p1"]);
    }

    #[test]
    fn test_patterns_interleave_by_priority() {
        let bus = EventBus::new();
        let log = journal();
        bus.on("user:login", tagged(&log, "direct"), SubscribeOptions::new().priority(1));
        bus.on_pattern_with(
            "user:*",
            tagged(&log, "pattern"),
            SubscribeOptions::new().priority(10),
        )
        .unwrap();
        bus.on_pattern("item-?", tagged(&log, "single")).unwrap();

        bus.emit("user:login", Value::Null);
        bus.emit("item-1", Value::Null);
        bus.emit("item-10", Value::Null);
        assert_eq!(*log.lock(), vec!["pattern", "direct", "single"]);
    }

    // =========================================================================
    // SUBSCRIPTION MANAGEMENT
    // =========================================================================

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::new();
        let log = journal();
        bus.once("boot", tagged(&log, "once"), SubscribeOptions::default());

        bus.emit("boot", Value::Null);
        bus.emit("boot", Value::Null);
        assert_eq!(log.lock().len(), 1);
        assert!(!bus.has_listeners("boot"));
    }

    #[test]
    fn test_off_handler_removes_one_subscription() {
        let bus = EventBus::new();
        let log = journal();
        let handler = tagged(&log, "shared");
        bus.on("save", handler.clone(), SubscribeOptions::default());
        bus.on("save", handler.clone(), SubscribeOptions::default());

        assert!(bus.off_handler("save", &handler));
        assert_eq!(bus.listener_count("save"), 1);
        bus.emit("save", Value::Null);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_handle_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let log = journal();
        let handle = bus.on("save", tagged(&log, "x"), SubscribeOptions::default());

        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        bus.emit("save", Value::Null);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_namespace_clear_leaves_others() {
        let bus = EventBus::new();
        let log = journal();
        let cart = bus.namespace("cart");
        cart.on("add", tagged(&log, "cart"), SubscribeOptions::default());
        cart.on("remove", tagged(&log, "cart"), SubscribeOptions::default());
        bus.on("cart:add", tagged(&log, "outsider"), SubscribeOptions::default());

        assert_eq!(cart.clear(), 2);
        cart.emit("add", Value::Null);
        assert_eq!(*log.lock(), vec!["outsider"]);
    }

    #[test]
    fn test_listener_may_reenter_the_bus() {
        let bus = EventBus::new();
        let log = journal();
        record(&bus, "chain:*", &log);

        let inner = bus.clone();
        bus.on(
            "chain:start",
            Handler::sync(move |_| {
                inner.emit("chain:next", Value::Null);
                inner.on("chain:late", Handler::sync(|_| Ok(Value::Null)), SubscribeOptions::default());
                Ok(Value::Null)
            }),
            SubscribeOptions::default(),
        );

        let report = bus.emit("chain:start", Value::Null);
        assert!(report.all_succeeded());
        // The pattern listener is older, so it sees `chain:start` first.
        assert_eq!(*log.lock(), vec!["chain:start", "chain:next"]);
        assert_eq!(bus.listener_count("chain:late"), 1);
    }

    // =========================================================================
    // FAILURES
    // =========================================================================

    #[test]
    fn test_failures_are_isolated_unless_stopping() {
        let bus = EventBus::new();
        let log = journal();
        bus.on(
            "job",
            Handler::sync(|_| anyhow::bail!("disk full")),
            SubscribeOptions::new().priority(10),
        );
        bus.on("job", tagged(&log, "after"), SubscribeOptions::default());

        let report = bus.emit("job", Value::Null);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            report.outcomes[0].failure(),
            Some(&ListenerFailure::Failed("disk full".into()))
        );

        let report = bus.emit_with("job", Value::Null, EmitOptions::new().stop_on_error());
        assert!(report.halted);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_panicking_listener_is_reported() {
        let bus = EventBus::new();
        let log = journal();
        bus.on(
            "job",
            Handler::sync(|_| panic!("boom")),
            SubscribeOptions::new().priority(1),
        );
        bus.on("job", tagged(&log, "survivor"), SubscribeOptions::default());

        let report = bus.emit("job", Value::Null);
        assert!(matches!(
            report.outcomes[0].failure(),
            Some(ListenerFailure::Panicked(_))
        ));
        assert_eq!(*log.lock(), vec!["survivor"]);
    }

    // =========================================================================
    // CONCURRENT DISPATCH
    // =========================================================================

    #[tokio::test]
    async fn test_timeout_does_not_block_fast_listeners() {
        let bus = EventBus::new();
        bus.on(
            "fetch",
            Handler::future(|_| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("slow"))
            }),
            SubscribeOptions::new().priority(10),
        );
        bus.on("fetch", Handler::sync(|_| Ok(json!("fast"))), SubscribeOptions::default());

        let report = bus
            .emit_async(
                "fetch",
                Value::Null,
                EmitOptions::new().timeout(Duration::from_millis(10)),
            )
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0]
            .failure()
            .is_some_and(ListenerFailure::is_timeout));
        assert_eq!(report.outcomes[1].value(), Some(&json!("fast")));
    }

    #[tokio::test]
    async fn test_async_listeners_run_together() {
        let bus = EventBus::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            bus.on(
                "work",
                Handler::future(move |_| {
                    let running = Arc::clone(&running);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(Value::Null)
                    }
                }),
                SubscribeOptions::default(),
            );
        }

        let report = bus.emit_async("work", Value::Null, EmitOptions::default()).await;
        assert!(report.all_succeeded());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_default_timeout_from_config() {
        let bus = EventBus::with_config(BusConfig {
            default_timeout: Some(Duration::from_millis(5)),
            ..BusConfig::default()
        });
        bus.on(
            "fetch",
            Handler::future(|_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Value::Null)
            }),
            SubscribeOptions::default(),
        );

        let report = bus.emit_async("fetch", Value::Null, EmitOptions::default()).await;
        assert!(report.outcomes[0]
            .failure()
            .is_some_and(ListenerFailure::is_timeout));
    }

    #[test]
    fn test_async_handler_under_sync_emit() {
        let bus = EventBus::new();
        bus.on(
            "fetch",
            Handler::future(|_| async { Ok(Value::Null) }),
            SubscribeOptions::default(),
        );

        let report = bus.emit("fetch", Value::Null);
        assert_eq!(
            report.outcomes[0].failure(),
            Some(&ListenerFailure::RequiresConcurrentDispatch)
        );
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    #[test]
    fn test_history_keeps_most_recent() {
        let bus = EventBus::with_history_capacity(3);
        for i in 0..5 {
            bus.emit(&format!("e{i}"), json!(i));
        }

        let names: Vec<String> = bus.history().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["e2", "e3", "e4"]);
        assert_eq!(bus.stats().emitted, 5);

        bus.clear();
        assert_eq!(bus.history().len(), 3);
        bus.clear_history();
        assert!(bus.history().is_empty());
    }

    // =========================================================================
    // RUNTIME CHOREOGRAPHY
    // =========================================================================

    fn started() -> TrellisRuntime {
        let runtime = TrellisRuntime::new(RuntimeConfig::default()).unwrap();
        runtime.start().unwrap();
        runtime
    }

    #[test]
    fn test_startup_announces_readiness_last() {
        let runtime = started();
        let history = runtime.bus().history();
        let ready = history.last().unwrap();
        assert_eq!(ready.name, APP_READY);
        assert_eq!(
            ready.payload["order"],
            json!(["session", "router", "notifications", "navigation"])
        );
    }

    #[test]
    fn test_protected_route_requires_login() {
        let runtime = started();
        let registry = runtime.registry();
        let router = registry.get_as::<Router>("router").unwrap();
        let notices = registry.get_as::<Notifications>("notifications").unwrap();

        runtime.publish(ROUTE_NAVIGATE, json!({ "path": "/account/orders" }));
        assert_eq!(router.current(), "/");
        assert_eq!(notices.notices().len(), 1);

        runtime.publish(AUTH_LOGIN, json!({ "user": "ada" }));
        runtime.publish(ROUTE_NAVIGATE, json!({ "path": "/account/orders" }));
        assert_eq!(router.current(), "/account/orders");
        assert_eq!(notices.notices().len(), 1);
    }

    #[test]
    fn test_logout_cascades_through_components() {
        let runtime = started();
        let registry = runtime.registry();
        let log = journal();
        for event in [SESSION_CHANGED, ROUTE_CHANGED, ROUTE_DENIED] {
            runtime
                .bus()
                .on(event, tagged(&log, event), SubscribeOptions::new().priority(-100));
        }

        runtime.publish(AUTH_LOGIN, json!({ "user": "ada" }));
        runtime.publish(ROUTE_NAVIGATE, json!({ "path": "/account" }));
        runtime.publish(AUTH_LOGOUT, Value::Null);

        let session = registry.get_as::<Session>("session").unwrap();
        let router = registry.get_as::<Router>("router").unwrap();
        let navigation = registry.get_as::<Navigation>("navigation").unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(router.current(), "/");
        assert_eq!(navigation.active(), "/");
        assert!(navigation
            .visible_items()
            .iter()
            .all(|item| !item.path.starts_with("/account")));
        assert_eq!(
            *log.lock(),
            vec![SESSION_CHANGED, ROUTE_CHANGED, ROUTE_CHANGED, SESSION_CHANGED]
        );
    }

    #[test]
    fn test_shutdown_silences_the_bus() {
        let runtime = started();
        let log = journal();
        record(runtime.bus(), "*", &log);

        runtime.shutdown();
        let seen = log.lock().clone();
        assert_eq!(seen.first().map(String::as_str), Some(APP_SHUTDOWN));
        assert_eq!(
            seen.iter().filter(|name| *name == EVENT_DESTROYED).count(),
            4
        );
        assert!(runtime.publish(AUTH_LOGIN, json!({ "user": "ada" })).is_none());
        assert_eq!(runtime.bus().stats().listeners, 1);
    }
}
