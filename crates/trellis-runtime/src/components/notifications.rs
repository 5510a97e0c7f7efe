//! User-facing notices.
//!
//! Collects explicit `notify:push` events and every `*:denied` event into a
//! bounded inbox. The binding context may set `{"capacity": n}`.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trellis_bus::{Event, EventBus, Handler, SubscribeOptions};
use trellis_registry::{Component, ComponentError, Constructor};

use super::events::NOTIFY_PUSH;

const NAMESPACE: &str = "notifications";

/// Notices kept unless the binding context says otherwise.
pub const DEFAULT_CAPACITY: usize = 50;

/// One notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: String,
    pub message: String,
    /// Event that produced the notice.
    pub source: String,
    pub at: DateTime<Utc>,
}

type Inbox = Arc<Mutex<VecDeque<Notice>>>;

/// Bounded notice inbox.
pub struct Notifications {
    bus: EventBus,
    inbox: Inbox,
    capacity: usize,
}

impl Notifications {
    pub fn new(bus: &EventBus, capacity: usize) -> Result<Self, ComponentError> {
        let inbox: Inbox = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));

        let on_push = {
            let inbox = Arc::clone(&inbox);
            Handler::sync(move |event| {
                let level = event
                    .payload
                    .get("level")
                    .and_then(Value::as_str)
                    .unwrap_or("info");
                let message = event
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                push(&inbox, capacity, notice(event, level, message));
                Ok(Value::Null)
            })
        };

        let on_denied = {
            let inbox = Arc::clone(&inbox);
            Handler::sync(move |event| {
                let subject = event
                    .payload
                    .get("path")
                    .and_then(Value::as_str)
                    .or_else(|| event.namespace())
                    .unwrap_or(event.name.as_str());
                let message = format!("Access denied: {subject}");
                push(&inbox, capacity, notice(event, "warn", &message));
                Ok(json!({ "notified": true }))
            })
        };

        let options = SubscribeOptions::new().namespace(NAMESPACE);
        bus.on(NOTIFY_PUSH, on_push, options.clone());
        bus.on_pattern_with("*:denied", on_denied, options)
            .map_err(|e| ComponentError::failed(e.to_string()))?;

        Ok(Self {
            bus: bus.clone(),
            inbox,
            capacity,
        })
    }

    /// Notices, oldest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.inbox.lock().iter().cloned().collect()
    }

    /// Drop every notice. Returns how many were dropped.
    pub fn dismiss_all(&self) -> usize {
        let mut inbox = self.inbox.lock();
        let dropped = inbox.len();
        inbox.clear();
        dropped
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Component for Notifications {
    fn teardown(&self) -> Result<(), ComponentError> {
        self.bus.clear_namespace(NAMESPACE);
        self.inbox.lock().clear();
        Ok(())
    }
}

fn notice(event: &Event, level: &str, message: &str) -> Notice {
    Notice {
        level: level.to_string(),
        message: message.to_string(),
        source: event.name.clone(),
        at: event.timestamp,
    }
}

fn push(inbox: &Mutex<VecDeque<Notice>>, capacity: usize, notice: Notice) {
    if capacity == 0 {
        return;
    }
    let mut inbox = inbox.lock();
    while inbox.len() >= capacity {
        inbox.pop_front();
    }
    inbox.push_back(notice);
}

pub(crate) fn constructor(bus: &EventBus) -> Constructor {
    let bus = bus.clone();
    Constructor::new(move |ctx| {
        let capacity = match ctx.binding.props.get("capacity") {
            None | Some(Value::Null) => DEFAULT_CAPACITY,
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    ComponentError::InvalidContext(format!("capacity must be a number, got {value}"))
                })?,
        };
        Notifications::new(&bus, capacity)
    })
    .with_teardown()
}
