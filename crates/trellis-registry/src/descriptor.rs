//! Component descriptors and introspection snapshots.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::{Capabilities, ComponentFactory};

/// Flags for [`crate::ComponentRegistry::register_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOptions {
    /// Cache the first instance and hand it out on every later `create`.
    pub singleton: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self { singleton: true }
    }
}

impl RegisterOptions {
    /// Options for a component that is constructed anew on every `create`.
    #[must_use]
    pub fn transient() -> Self {
        Self { singleton: false }
    }
}

/// A registered component.
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub name: String,
    pub factory: Arc<dyn ComponentFactory>,
    pub dependencies: Vec<String>,
    pub singleton: bool,
    pub initialized: bool,
    pub capabilities: Capabilities,
}

impl ComponentDescriptor {
    pub(crate) fn new(
        name: String,
        factory: Arc<dyn ComponentFactory>,
        dependencies: Vec<String>,
        options: RegisterOptions,
    ) -> Self {
        let capabilities = factory.capabilities();
        Self {
            name,
            factory,
            dependencies,
            singleton: options.singleton,
            initialized: false,
            capabilities,
        }
    }

    pub(crate) fn info(&self, has_instance: bool) -> ComponentInfo {
        ComponentInfo {
            name: self.name.clone(),
            dependencies: self.dependencies.clone(),
            singleton: self.singleton,
            initialized: self.initialized,
            has_instance,
            capabilities: self.capabilities,
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("singleton", &self.singleton)
            .field("initialized", &self.initialized)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    pub dependencies: Vec<String>,
    pub singleton: bool,
    pub initialized: bool,
    pub has_instance: bool,
    pub capabilities: Capabilities,
}

/// Snapshot of the whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Registered descriptors.
    pub registered: usize,
    /// Descriptors whose `initialized` flag is set.
    pub initialized: usize,
    /// Live cached instances.
    pub instances: usize,
    /// Whether `initialize()` has completed.
    pub registry_initialized: bool,
    pub load_order: Vec<String>,
}

/// A declared dependency with no descriptor behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub component: String,
    pub dependency: String,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.component, self.dependency)
    }
}
