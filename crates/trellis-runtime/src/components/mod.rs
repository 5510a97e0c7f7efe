//! # Component Manifest
//!
//! Every component the runtime knows about, with its dependencies. The
//! manifest is static; configuration only decides which entries are
//! registered and which ones the locator can bind.
//!
//! ```text
//!   session ◄──── router ◄──── navigation
//!      ▲                          │
//!      └──────────────────────────┘
//!   notifications (standalone, listens on *:denied and notify:push)
//! ```
//!
//! Components never call each other. They publish and subscribe on the
//! shared bus and tag their subscriptions with their own name, so teardown
//! is a single `clear_namespace`.

pub mod navigation;
pub mod notifications;
pub mod router;
pub mod session;

use serde::Serialize;
use trellis_bus::EventBus;
use trellis_registry::Constructor;

pub use navigation::{NavItem, Navigation};
pub use notifications::{Notice, Notifications};
pub use router::Router;
pub use session::Session;

/// Events exchanged between the built-in components.
pub mod events {
    /// `{"user": name}`
    pub const AUTH_LOGIN: &str = "auth:login";
    pub const AUTH_LOGOUT: &str = "auth:logout";
    /// `{"user": name | null}`
    pub const SESSION_CHANGED: &str = "session:changed";
    /// `{"path": path}`
    pub const ROUTE_NAVIGATE: &str = "route:navigate";
    /// `{"path": path, "previous": path}`
    pub const ROUTE_CHANGED: &str = "route:changed";
    /// `{"path": path}`
    pub const ROUTE_DENIED: &str = "route:denied";
    /// `{"level": level, "message": text}`
    pub const NOTIFY_PUSH: &str = "notify:push";
    /// `{"items": count}`
    pub const NAVIGATION_RENDERED: &str = "navigation:rendered";
}

/// Built-in components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Session,
    Router,
    Notifications,
    Navigation,
}

impl ComponentKind {
    /// The manifest, in registration order.
    pub const ALL: [Self; 4] = [
        Self::Session,
        Self::Router,
        Self::Notifications,
        Self::Navigation,
    ];

    /// Registry name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Router => "router",
            Self::Notifications => "notifications",
            Self::Navigation => "navigation",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Declared dependencies, by registry name.
    #[must_use]
    pub fn dependencies(self) -> &'static [&'static str] {
        match self {
            Self::Session | Self::Notifications => &[],
            Self::Router => &["session"],
            Self::Navigation => &["router", "session"],
        }
    }

    #[must_use]
    pub fn dependency_kinds(self) -> Vec<Self> {
        self.dependencies()
            .iter()
            .filter_map(|name| Self::from_name(name))
            .collect()
    }

    /// Variable that toggles this component, e.g. `TRELLIS_COMPONENT_ROUTER`.
    #[must_use]
    pub fn env_var(self) -> String {
        format!("TRELLIS_COMPONENT_{}", self.name().to_uppercase())
    }

    /// Constructor wired to `bus`.
    #[must_use]
    pub fn constructor(self, bus: &EventBus) -> Constructor {
        match self {
            Self::Session => session::constructor(bus),
            Self::Router => router::constructor(bus),
            Self::Notifications => notifications::constructor(bus),
            Self::Navigation => navigation::constructor(bus),
        }
    }
}
