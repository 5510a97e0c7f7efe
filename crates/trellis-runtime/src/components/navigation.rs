//! Navigation menu.
//!
//! Tracks the active route from `route:changed` and hides protected items
//! while nobody is signed in. Items come from the binding context
//! (`{"items": [{"label": .., "path": ..}]}`) or fall back to a default menu.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use trellis_bus::{EventBus, Handler, SubscribeOptions};
use trellis_registry::{Component, ComponentError, ConstructionContext, Constructor};

use super::events::{NAVIGATION_RENDERED, ROUTE_CHANGED};
use super::router::{is_protected, Router};
use super::session::Session;

const NAMESPACE: &str = "navigation";

/// One menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub label: String,
    pub path: String,
}

impl NavItem {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

fn default_items() -> Vec<NavItem> {
    vec![
        NavItem::new("Home", "/"),
        NavItem::new("Catalog", "/catalog"),
        NavItem::new("Account", "/account"),
    ]
}

/// The navigation menu.
pub struct Navigation {
    bus: EventBus,
    items: Vec<NavItem>,
    active: Arc<RwLock<String>>,
    session: Option<Arc<Session>>,
    rendered: AtomicBool,
}

impl Navigation {
    /// # Errors
    ///
    /// `InvalidContext` if the binding context carries malformed items.
    pub fn new(bus: &EventBus, context: &ConstructionContext) -> Result<Self, ComponentError> {
        let items = match context.binding.props.get("items") {
            None | Some(Value::Null) => default_items(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| ComponentError::InvalidContext(format!("navigation items: {e}")))?,
        };

        let start = context
            .dependencies
            .get_as::<Router>("router")
            .map_or_else(|| "/".to_string(), |router| router.current());
        let active = Arc::new(RwLock::new(start));

        let on_route = {
            let active = Arc::clone(&active);
            Handler::sync(move |event| {
                if let Some(path) = event.payload.get("path").and_then(Value::as_str) {
                    *active.write() = path.to_string();
                }
                Ok(Value::Null)
            })
        };
        bus.on(
            ROUTE_CHANGED,
            on_route,
            SubscribeOptions::new().namespace(NAMESPACE),
        );

        Ok(Self {
            bus: bus.clone(),
            items,
            active,
            session: context.dependencies.get_as::<Session>("session"),
            rendered: AtomicBool::new(false),
        })
    }

    /// Items the current user may see.
    #[must_use]
    pub fn visible_items(&self) -> Vec<NavItem> {
        let signed_in = self
            .session
            .as_ref()
            .is_some_and(|session| session.is_authenticated());
        self.items
            .iter()
            .filter(|item| signed_in || !is_protected(&item.path))
            .cloned()
            .collect()
    }

    /// Path of the active route.
    #[must_use]
    pub fn active(&self) -> String {
        self.active.read().clone()
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.rendered.load(Ordering::Acquire)
    }
}

impl Component for Navigation {
    fn render(&self) -> Result<(), ComponentError> {
        let items = self.visible_items();
        let active = self.active();
        for item in &items {
            let marker = if item.path == active { "*" } else { " " };
            info!("  {} {:12} {}", marker, item.label, item.path);
        }
        self.rendered.store(true, Ordering::Release);
        self.bus
            .emit(NAVIGATION_RENDERED, json!({ "items": items.len() }));
        Ok(())
    }

    fn teardown(&self) -> Result<(), ComponentError> {
        self.bus.clear_namespace(NAMESPACE);
        self.rendered.store(false, Ordering::Release);
        Ok(())
    }
}

pub(crate) fn constructor(bus: &EventBus) -> Constructor {
    let bus = bus.clone();
    Constructor::new(move |ctx| Navigation::new(&bus, &ctx))
        .with_render()
        .with_teardown()
}
