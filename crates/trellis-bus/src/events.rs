//! # Event Records
//!
//! Every emit produces one immutable [`EventRecord`]. The same record is
//! handed to each listener and appended to the bus history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::NAMESPACE_SEPARATOR;

/// A single emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier of this emission.
    pub id: Uuid,

    /// Fully qualified event name (including any namespace prefix).
    pub name: String,

    /// Arbitrary payload supplied by the publisher.
    pub payload: Value,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

/// Listeners receive events as [`EventRecord`]s.
pub type Event = EventRecord;

impl EventRecord {
    /// Create a record stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Namespace prefix of the event name, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.name
            .split_once(NAMESPACE_SEPARATOR)
            .map(|(namespace, _)| namespace)
    }

    /// Event name with the namespace prefix stripped.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(NAMESPACE_SEPARATOR)
            .map_or(self.name.as_str(), |(_, local)| local)
    }
}
