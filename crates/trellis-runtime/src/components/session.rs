//! Signed-in user tracking.
//!
//! Listens for `auth:login` / `auth:logout` and republishes the result as
//! `session:changed`.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::info;
use trellis_bus::{EventBus, Handler, SubscribeOptions};
use trellis_registry::{Component, ComponentError, Constructor};

use super::events::{AUTH_LOGIN, AUTH_LOGOUT, SESSION_CHANGED};

const NAMESPACE: &str = "session";

#[derive(Debug, Default)]
struct SessionState {
    user: Option<String>,
    since: Option<DateTime<Utc>>,
}

/// The current session.
pub struct Session {
    bus: EventBus,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(bus: &EventBus) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));

        let on_login = {
            let state = Arc::clone(&state);
            let bus = bus.clone();
            Handler::sync(move |event| {
                let user = event
                    .payload
                    .get("user")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("login payload has no user"))?;

                {
                    let mut state = state.write();
                    state.user = Some(user.to_string());
                    state.since = Some(event.timestamp);
                }

                info!(user = %user, "Signed in");
                bus.emit(SESSION_CHANGED, json!({ "user": user }));
                Ok(json!({ "user": user }))
            })
        };

        let on_logout = {
            let state = Arc::clone(&state);
            let bus = bus.clone();
            Handler::sync(move |_| {
                let previous = {
                    let mut state = state.write();
                    state.since = None;
                    state.user.take()
                };

                if previous.is_some() {
                    info!("Signed out");
                    bus.emit(SESSION_CHANGED, json!({ "user": null }));
                }
                Ok(json!({ "signed_out": previous.is_some() }))
            })
        };

        // Ahead of every other auth listener.
        let options = SubscribeOptions::new().priority(100).namespace(NAMESPACE);
        bus.on(AUTH_LOGIN, on_login, options.clone());
        bus.on(AUTH_LOGOUT, on_logout, options);

        Self {
            bus: bus.clone(),
            state,
        }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<String> {
        self.state.read().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.read().user.is_some()
    }

    #[must_use]
    pub fn signed_in_since(&self) -> Option<DateTime<Utc>> {
        self.state.read().since
    }
}

impl Component for Session {
    fn teardown(&self) -> Result<(), ComponentError> {
        self.bus.clear_namespace(NAMESPACE);
        Ok(())
    }
}

pub(crate) fn constructor(bus: &EventBus) -> Constructor {
    let bus = bus.clone();
    Constructor::new(move |_| Ok(Session::new(&bus))).with_teardown()
}
