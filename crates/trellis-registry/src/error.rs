//! Registry error types.

use thiserror::Error;

use crate::component::ComponentError;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No descriptor is registered under this name.
    #[error("Component '{0}' is not registered")]
    NotRegistered(String),

    /// The dependency graph contains a cycle. The path starts and ends at
    /// the same component.
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// `initialize()` was called on an initialized registry.
    #[error("Registry is already initialized")]
    AlreadyInitialized,

    /// The constructor of a component failed.
    #[error("Failed to construct component '{component}': {source}")]
    Construction {
        component: String,
        #[source]
        source: ComponentError,
    },

    /// The render hook of a component failed.
    #[error("Render hook of component '{component}' failed: {source}")]
    Render {
        component: String,
        #[source]
        source: ComponentError,
    },
}

impl RegistryError {
    /// Name of the component the error concerns, if any.
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::NotRegistered(name) => Some(name),
            Self::Construction { component, .. } | Self::Render { component, .. } => {
                Some(component)
            }
            Self::CircularDependency { cycle } => cycle.first().map(String::as_str),
            Self::AlreadyInitialized => None,
        }
    }
}
