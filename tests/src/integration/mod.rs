//! Cross-crate integration tests.

pub mod choreography;
pub mod lifecycle;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use trellis_bus::{EventBus, Handler};

/// Shared, ordered log the tests write into.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[must_use]
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Record every event name published on `bus` whose name matches `pattern`.
pub fn record(bus: &EventBus, pattern: &str, journal: &Journal) {
    let sink = Arc::clone(journal);
    let handler = Handler::sync(move |event| {
        sink.lock().push(event.name.clone());
        Ok(Value::Null)
    });
    bus.on_pattern(pattern, handler)
        .expect("test patterns are valid");
}
