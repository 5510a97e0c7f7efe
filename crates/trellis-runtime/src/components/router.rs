//! Route tracking with access control.
//!
//! `route:navigate` requests are checked against the session: paths under
//! [`PROTECTED_PREFIX`] need a signed-in user. Accepted requests publish
//! `route:changed`, refused ones `route:denied`. Signing out while on a
//! protected path sends the user home.

use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, warn};
use trellis_bus::{EventBus, Handler, SubscribeOptions};
use trellis_registry::{Component, ComponentError, Constructor};

use super::events::{ROUTE_CHANGED, ROUTE_DENIED, ROUTE_NAVIGATE, SESSION_CHANGED};
use super::session::Session;

const NAMESPACE: &str = "router";

/// Paths that require a signed-in user.
pub const PROTECTED_PREFIX: &str = "/account";

/// Path the router starts on and falls back to.
pub const HOME: &str = "/";

/// The active route.
pub struct Router {
    bus: EventBus,
    current: Arc<RwLock<String>>,
}

impl Router {
    /// Without a session every protected path is refused.
    pub fn new(bus: &EventBus, session: Option<Arc<Session>>) -> Self {
        let current = Arc::new(RwLock::new(HOME.to_string()));

        let on_navigate = {
            let current = Arc::clone(&current);
            let session = session.clone();
            let bus = bus.clone();
            Handler::sync(move |event| {
                let path = event
                    .payload
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("navigate payload has no path"))?;

                let signed_in = session.as_ref().is_some_and(|s| s.is_authenticated());
                if is_protected(path) && !signed_in {
                    warn!(path = %path, "Navigation denied");
                    bus.emit(ROUTE_DENIED, json!({ "path": path }));
                    return Ok(json!({ "allowed": false }));
                }

                change_route(&bus, &current, path);
                Ok(json!({ "allowed": true }))
            })
        };

        let on_session = {
            let current = Arc::clone(&current);
            let bus = bus.clone();
            Handler::sync(move |_| {
                change_route(&bus, &current, HOME);
                Ok(json!({ "redirected": HOME }))
            })
        };
        let signed_out_on_protected = {
            let current = Arc::clone(&current);
            move |event: &trellis_bus::Event| {
                event.payload.get("user").is_some_and(Value::is_null)
                    && is_protected(&current.read())
            }
        };

        bus.on(
            ROUTE_NAVIGATE,
            on_navigate,
            SubscribeOptions::new().namespace(NAMESPACE),
        );
        bus.on(
            SESSION_CHANGED,
            on_session,
            SubscribeOptions::new()
                .namespace(NAMESPACE)
                .condition(signed_out_on_protected),
        );

        Self {
            bus: bus.clone(),
            current,
        }
    }

    #[must_use]
    pub fn current(&self) -> String {
        self.current.read().clone()
    }
}

impl Component for Router {
    fn teardown(&self) -> Result<(), ComponentError> {
        self.bus.clear_namespace(NAMESPACE);
        Ok(())
    }
}

#[must_use]
pub fn is_protected(path: &str) -> bool {
    path == PROTECTED_PREFIX || path.starts_with(&format!("{PROTECTED_PREFIX}/"))
}

fn change_route(bus: &EventBus, current: &RwLock<String>, path: &str) {
    let previous = std::mem::replace(&mut *current.write(), path.to_string());
    if previous == path {
        return;
    }
    debug!(from = %previous, to = %path, "Route changed");
    bus.emit(ROUTE_CHANGED, json!({ "path": path, "previous": previous }));
}

pub(crate) fn constructor(bus: &EventBus) -> Constructor {
    let bus = bus.clone();
    Constructor::new(move |ctx| {
        Ok(Router::new(
            &bus,
            ctx.dependencies.get_as::<Session>("session"),
        ))
    })
    .with_teardown()
}
