//! # Trellis Registry
//!
//! Dependency-ordered component registry.
//!
//! ```text
//!  register(name, ctor, deps) ──► descriptors ──► load order (DFS, cycle check)
//!                                                      │
//!  initialize() ◄──────────────────────────────────────┘
//!     │  for each name in order:
//!     │    locator.locate(name) ── none ──► skip
//!     │    create(name) ──► resolve deps ──► ctor(ctx) ──► instance table
//!     │    render() if declared
//!     ▼
//!  destroy_all()  (reverse order, teardown if declared)
//! ```
//!
//! Components are singletons unless registered with
//! [`RegisterOptions::transient`]. Constructors receive their resolved
//! dependencies and never look each other up directly; runtime
//! coordination goes through the `trellis-bus` event bus.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod component;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod locator;
pub mod registry;

pub use component::{
    downcast, AsAny, Capabilities, Component, ComponentError, ComponentFactory,
    ConstructionContext, Constructor, CreateOptions, ResolvedDependencies,
};
pub use descriptor::{
    ComponentDescriptor, ComponentInfo, MissingDependency, RegisterOptions, RegistryStats,
};
pub use error::RegistryError;
pub use graph::{topological_order, CycleError};
pub use locator::{BindingContext, Locator, StaticLocator};
pub use registry::{ComponentRegistry, EVENT_CREATED, EVENT_DESTROYED, EVENT_INITIALIZED};
