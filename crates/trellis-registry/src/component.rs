//! # Components and Constructors
//!
//! A component is any `Send + Sync` value the registry manages. Lifecycle
//! hooks are opt-in: a constructor declares its [`Capabilities`] once, at
//! registration, and the registry only calls the hooks declared there.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::locator::BindingContext;

/// Errors raised by constructors and lifecycle hooks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// A dependency the component cannot work without was not resolved.
    #[error("Missing required dependency '{0}'")]
    MissingDependency(String),

    /// The binding context lacks something the component needs.
    #[error("Invalid binding context: {0}")]
    InvalidContext(String),

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl ComponentError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Type-erased access to a component's concrete type.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A live component instance.
///
/// Both hooks default to no-ops. They are only invoked when the
/// constructor declared the matching capability.
pub trait Component: AsAny {
    /// Called by `initialize()` right after construction.
    fn render(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called when the instance is destroyed.
    fn teardown(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// Downcast a shared instance to its concrete type.
#[must_use]
pub fn downcast<T: Component>(instance: &Arc<dyn Component>) -> Option<Arc<T>> {
    Arc::clone(instance).into_any_arc().downcast::<T>().ok()
}

/// Lifecycle hooks a constructor's instances implement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub render: bool,
    pub teardown: bool,
}

/// Options forwarded verbatim to the constructor by `create()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateOptions {
    pub props: Value,
}

impl CreateOptions {
    #[must_use]
    pub fn with_props(props: Value) -> Self {
        Self { props }
    }
}

/// Dependencies resolved for a constructor, in declaration order.
///
/// Dependencies that could not be resolved are simply absent.
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    instances: IndexMap<String, Arc<dyn Component>>,
}

impl ResolvedDependencies {
    pub(crate) fn insert(&mut self, name: String, instance: Arc<dyn Component>) {
        self.instances.insert(name, instance);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Component>> {
        self.instances.get(name)
    }

    /// Typed lookup; `None` if absent or of another type.
    #[must_use]
    pub fn get_as<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.instances.get(name).and_then(downcast::<T>)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for ResolvedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.instances.keys()).finish()
    }
}

/// Everything a constructor receives.
#[derive(Debug, Clone)]
pub struct ConstructionContext {
    /// Name the component is registered under.
    pub name: String,
    /// Where the component binds, as reported by the locator or the caller.
    pub binding: BindingContext,
    /// Resolved dependencies.
    pub dependencies: ResolvedDependencies,
    /// Caller options.
    pub options: CreateOptions,
}

impl ConstructionContext {
    /// Typed dependency that must be present.
    ///
    /// # Errors
    ///
    /// `ComponentError::MissingDependency` if the dependency is absent or of
    /// another type.
    pub fn require<T: Component>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        self.dependencies
            .get_as::<T>(name)
            .ok_or_else(|| ComponentError::MissingDependency(name.to_string()))
    }
}

/// The constructor reference stored in a descriptor.
pub trait ComponentFactory: Send + Sync {
    /// Build a new instance.
    fn construct(&self, context: ConstructionContext) -> Result<Arc<dyn Component>, ComponentError>;

    /// Hooks the built instances implement. Read once, at registration.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

type BuildFn =
    dyn Fn(ConstructionContext) -> Result<Arc<dyn Component>, ComponentError> + Send + Sync;

/// Closure-backed [`ComponentFactory`].
///
/// ```ignore
/// let ctor = Constructor::new(|ctx| Ok(Header::new(ctx.binding)))
///     .with_render()
///     .with_teardown();
/// ```
#[derive(Clone)]
pub struct Constructor {
    build: Arc<BuildFn>,
    capabilities: Capabilities,
}

impl Constructor {
    pub fn new<F, C>(build: F) -> Self
    where
        F: Fn(ConstructionContext) -> Result<C, ComponentError> + Send + Sync + 'static,
        C: Component,
    {
        Self {
            build: Arc::new(move |context| {
                build(context).map(|component| Arc::new(component) as Arc<dyn Component>)
            }),
            capabilities: Capabilities::default(),
        }
    }

    /// Declare that instances implement [`Component::render`].
    #[must_use]
    pub fn with_render(mut self) -> Self {
        self.capabilities.render = true;
        self
    }

    /// Declare that instances implement [`Component::teardown`].
    #[must_use]
    pub fn with_teardown(mut self) -> Self {
        self.capabilities.teardown = true;
        self
    }
}

impl ComponentFactory for Constructor {
    fn construct(&self, context: ConstructionContext) -> Result<Arc<dyn Component>, ComponentError> {
        (self.build)(context)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
