//! # Component Registry
//!
//! Owns every descriptor and every cached instance. All state sits behind
//! one `parking_lot::RwLock`; the lock is released before any constructor,
//! locator or lifecycle hook runs, so user code may call back into the
//! registry.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info, warn};
use trellis_bus::EventBus;

use crate::component::{
    downcast, Component, ComponentFactory, ConstructionContext, CreateOptions,
    ResolvedDependencies,
};
use crate::descriptor::{
    ComponentDescriptor, ComponentInfo, MissingDependency, RegisterOptions, RegistryStats,
};
use crate::error::RegistryError;
use crate::graph::topological_order;
use crate::locator::{BindingContext, Locator};

/// Published after an instance is constructed. Payload: `{"component": name}`.
pub const EVENT_CREATED: &str = "registry:created";
/// Published after an instance is destroyed. Payload: `{"component": name}`.
pub const EVENT_DESTROYED: &str = "registry:destroyed";
/// Published once `initialize()` completes. Payload: `{"components": [..]}`.
pub const EVENT_INITIALIZED: &str = "registry:initialized";

#[derive(Default)]
struct RegistryState {
    descriptors: IndexMap<String, ComponentDescriptor>,
    instances: HashMap<String, Arc<dyn Component>>,
    load_order: Vec<String>,
    /// Set while the registered graph contains a cycle.
    stale_cycle: Option<Vec<String>>,
    initialized: bool,
}

/// What `create` needs from a descriptor, copied out of the lock.
struct Blueprint {
    factory: Arc<dyn ComponentFactory>,
    dependencies: Vec<String>,
    singleton: bool,
}

/// Dependency-ordered component registry.
pub struct ComponentRegistry {
    state: RwLock<RegistryState>,
    locator: Arc<dyn Locator>,
    bus: Option<EventBus>,
}

impl ComponentRegistry {
    /// Create a registry that resolves binding contexts through `locator`.
    pub fn new(locator: impl Locator + 'static) -> Self {
        Self::from_shared(Arc::new(locator))
    }

    /// Create a registry around a locator the caller keeps a handle to.
    pub fn from_shared(locator: Arc<dyn Locator>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            locator,
            bus: None,
        }
    }

    /// Publish lifecycle events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The attached bus, if any.
    #[must_use]
    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    /// Register a singleton component.
    ///
    /// # Errors
    ///
    /// `CircularDependency` if the new graph has a cycle. The descriptor is
    /// stored anyway and the load order stays stale until the cycle is fixed.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: impl ComponentFactory + 'static,
        dependencies: &[&str],
    ) -> Result<(), RegistryError> {
        self.register_with(name, factory, dependencies, RegisterOptions::default())
    }

    /// Register a component with explicit flags.
    ///
    /// Registering an existing name replaces its descriptor in place.
    ///
    /// # Errors
    ///
    /// See [`Self::register`].
    pub fn register_with(
        &self,
        name: impl Into<String>,
        factory: impl ComponentFactory + 'static,
        dependencies: &[&str],
        options: RegisterOptions,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let descriptor = ComponentDescriptor::new(
            name.clone(),
            Arc::new(factory),
            dependencies.iter().map(|d| (*d).to_string()).collect(),
            options,
        );

        debug!(
            component = %name,
            dependencies = ?descriptor.dependencies,
            singleton = descriptor.singleton,
            "Registering component"
        );

        let mut state = self.state.write();
        if state.descriptors.insert(name.clone(), descriptor).is_some() {
            info!(component = %name, "Replaced existing component registration");
        }
        Self::recompute_order(&mut state)
    }

    /// Recompute the load order from the registered graph.
    ///
    /// # Errors
    ///
    /// `CircularDependency` naming the cycle path.
    pub fn update_load_order(&self) -> Result<(), RegistryError> {
        Self::recompute_order(&mut self.state.write())
    }

    fn recompute_order(state: &mut RegistryState) -> Result<(), RegistryError> {
        let graph: IndexMap<String, Vec<String>> = state
            .descriptors
            .iter()
            .map(|(name, d)| (name.clone(), d.dependencies.clone()))
            .collect();

        match topological_order(&graph) {
            Ok(order) => {
                state.load_order = order;
                state.stale_cycle = None;
                Ok(())
            }
            Err(err) => {
                warn!(cycle = %err.cycle.join(" -> "), "Circular dependency detected");
                state.stale_cycle = Some(err.cycle.clone());
                Err(RegistryError::CircularDependency { cycle: err.cycle })
            }
        }
    }

    /// Create (or fetch the cached singleton of) `name`.
    ///
    /// Declared dependencies are taken from the instance table or built
    /// recursively with the registry's locator. Dependencies that cannot be
    /// resolved are logged and left out of the constructor's
    /// [`ResolvedDependencies`].
    ///
    /// # Errors
    ///
    /// `NotRegistered` for an unknown name, `Construction` if the
    /// constructor of `name` itself fails.
    pub fn create(
        &self,
        name: &str,
        binding: BindingContext,
        options: CreateOptions,
    ) -> Result<Arc<dyn Component>, RegistryError> {
        let mut resolving = Vec::new();
        self.create_inner(name, binding, options, &mut resolving)
    }

    fn create_inner(
        &self,
        name: &str,
        binding: BindingContext,
        options: CreateOptions,
        resolving: &mut Vec<String>,
    ) -> Result<Arc<dyn Component>, RegistryError> {
        let blueprint = {
            let state = self.state.read();
            let descriptor = state
                .descriptors
                .get(name)
                .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

            if descriptor.singleton {
                if let Some(existing) = state.instances.get(name) {
                    return Ok(Arc::clone(existing));
                }
            }

            Blueprint {
                factory: Arc::clone(&descriptor.factory),
                dependencies: descriptor.dependencies.clone(),
                singleton: descriptor.singleton,
            }
        };

        resolving.push(name.to_string());
        let dependencies = self.resolve_dependencies(name, &blueprint.dependencies, resolving);
        resolving.pop();

        let context = ConstructionContext {
            name: name.to_string(),
            binding,
            dependencies,
            options,
        };
        let instance = blueprint
            .factory
            .construct(context)
            .map_err(|source| RegistryError::Construction {
                component: name.to_string(),
                source,
            })?;

        {
            let mut state = self.state.write();
            if blueprint.singleton {
                state
                    .instances
                    .insert(name.to_string(), Arc::clone(&instance));
            }
            if let Some(descriptor) = state.descriptors.get_mut(name) {
                descriptor.initialized = true;
            }
        }

        info!(component = %name, singleton = blueprint.singleton, "Component created");
        self.publish(EVENT_CREATED, json!({ "component": name }));

        Ok(instance)
    }

    fn resolve_dependencies(
        &self,
        owner: &str,
        dependencies: &[String],
        resolving: &mut Vec<String>,
    ) -> ResolvedDependencies {
        let mut resolved = ResolvedDependencies::default();

        for dependency in dependencies {
            if let Some(existing) = self.get(dependency) {
                resolved.insert(dependency.clone(), existing);
                continue;
            }

            if resolving.iter().any(|n| n == dependency) {
                warn!(
                    component = %owner,
                    dependency = %dependency,
                    "Dependency cycle during creation, dependency omitted"
                );
                continue;
            }

            if !self.has(dependency) {
                warn!(component = %owner, dependency = %dependency, "Dependency not registered");
                continue;
            }

            let Some(binding) = self.locator.locate(dependency) else {
                warn!(
                    component = %owner,
                    dependency = %dependency,
                    "No binding context for dependency"
                );
                continue;
            };

            match self.create_inner(dependency, binding, CreateOptions::default(), resolving) {
                Ok(instance) => resolved.insert(dependency.clone(), instance),
                Err(err) => warn!(
                    component = %owner,
                    dependency = %dependency,
                    error = %err,
                    "Failed to create dependency"
                ),
            }
        }

        resolved
    }

    /// Live instance of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.state.read().instances.get(name).cloned()
    }

    /// Live instance of `name` as its concrete type.
    #[must_use]
    pub fn get_as<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).as_ref().and_then(downcast::<T>)
    }

    /// Whether a descriptor is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.state.read().descriptors.contains_key(name)
    }

    /// Whether `initialize()` has completed and no `destroy_all()` followed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Create and render every locatable component in load order.
    ///
    /// Components without a binding context are skipped. The first
    /// construction or render failure aborts the sequence; components
    /// created before it stay alive.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized`, `CircularDependency` while the graph has a
    /// cycle, or the first `Construction` / `Render` failure.
    pub fn initialize(&self) -> Result<(), RegistryError> {
        let order = {
            let state = self.state.read();
            if state.initialized {
                return Err(RegistryError::AlreadyInitialized);
            }
            if let Some(cycle) = &state.stale_cycle {
                return Err(RegistryError::CircularDependency {
                    cycle: cycle.clone(),
                });
            }
            state.load_order.clone()
        };

        info!(components = order.len(), "Initializing component registry");

        for name in &order {
            let Some((initialized, render)) = self
                .state
                .read()
                .descriptors
                .get(name)
                .map(|d| (d.initialized, d.capabilities.render))
            else {
                continue;
            };

            if initialized {
                debug!(component = %name, "Already initialized, skipping");
                continue;
            }

            let Some(binding) = self.locator.locate(name) else {
                warn!(component = %name, "No binding context found, skipping");
                continue;
            };

            let instance = self.create(name, binding, CreateOptions::default())?;

            if render {
                instance.render().map_err(|source| RegistryError::Render {
                    component: name.clone(),
                    source,
                })?;
                debug!(component = %name, "Component rendered");
            }
        }

        self.state.write().initialized = true;
        info!("Component registry initialized");
        self.publish(EVENT_INITIALIZED, json!({ "components": order }));

        Ok(())
    }

    /// Tear down and drop the instance of `name`.
    ///
    /// Returns whether a live instance was removed. Teardown failures are
    /// logged and never keep the instance alive.
    ///
    /// # Errors
    ///
    /// `NotRegistered` for an unknown name.
    pub fn destroy(&self, name: &str) -> Result<bool, RegistryError> {
        let (instance, teardown) = {
            let mut state = self.state.write();
            let descriptor = state
                .descriptors
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
            descriptor.initialized = false;
            let teardown = descriptor.capabilities.teardown;
            (state.instances.remove(name), teardown)
        };

        let Some(instance) = instance else {
            return Ok(false);
        };

        if teardown {
            if let Err(err) = instance.teardown() {
                warn!(component = %name, error = %err, "Teardown failed");
            }
        }

        info!(component = %name, "Component destroyed");
        self.publish(EVENT_DESTROYED, json!({ "component": name }));

        Ok(true)
    }

    /// Destroy every live instance, dependents before their dependencies.
    ///
    /// Clears the registry's initialized flag so `initialize()` may run
    /// again. Returns the number of instances destroyed.
    pub fn destroy_all(&self) -> usize {
        let targets: Vec<String> = {
            let state = self.state.read();
            let mut targets: Vec<String> = state
                .load_order
                .iter()
                .rev()
                .filter(|name| state.instances.contains_key(*name))
                .cloned()
                .collect();
            // Instances outside a stale load order go last.
            let mut rest: Vec<String> = state
                .instances
                .keys()
                .filter(|name| !targets.contains(*name))
                .cloned()
                .collect();
            rest.sort();
            targets.extend(rest);
            targets
        };

        let mut destroyed = 0;
        for name in &targets {
            match self.destroy(name) {
                Ok(true) => destroyed += 1,
                Ok(false) => {}
                Err(err) => warn!(component = %name, error = %err, "Destroy failed"),
            }
        }

        self.state.write().initialized = false;
        info!(destroyed, "All components destroyed");

        destroyed
    }

    /// Snapshot of one descriptor.
    #[must_use]
    pub fn get_info(&self, name: &str) -> Option<ComponentInfo> {
        let state = self.state.read();
        state
            .descriptors
            .get(name)
            .map(|d| d.info(state.instances.contains_key(name)))
    }

    /// Snapshot of the whole registry.
    #[must_use]
    pub fn get_stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            registered: state.descriptors.len(),
            initialized: state.descriptors.values().filter(|d| d.initialized).count(),
            instances: state.instances.len(),
            registry_initialized: state.initialized,
            load_order: state.load_order.clone(),
        }
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn list_components(&self) -> Vec<String> {
        self.state.read().descriptors.keys().cloned().collect()
    }

    /// The last successfully computed load order.
    #[must_use]
    pub fn load_order(&self) -> Vec<String> {
        self.state.read().load_order.clone()
    }

    /// Declared dependencies that have no descriptor.
    #[must_use]
    pub fn missing_dependencies(&self) -> Vec<MissingDependency> {
        let state = self.state.read();
        state
            .descriptors
            .values()
            .flat_map(|d| {
                d.dependencies
                    .iter()
                    .filter(|dep| !state.descriptors.contains_key(*dep))
                    .map(|dep| MissingDependency {
                        component: d.name.clone(),
                        dependency: dep.clone(),
                    })
            })
            .collect()
    }

    /// Log a status table.
    pub fn print_status(&self) {
        let state = self.state.read();

        info!("===========================================");
        info!("  COMPONENT REGISTRY STATUS");
        info!("===========================================");

        for name in &state.load_order {
            let Some(descriptor) = state.descriptors.get(name) else {
                continue;
            };
            let icon = match (descriptor.initialized, state.instances.contains_key(name)) {
                (true, true) => "✅",
                (true, false) => "🔁",
                _ => "⏸️ ",
            };
            let deps = if descriptor.dependencies.is_empty() {
                String::new()
            } else {
                format!(" <- {}", descriptor.dependencies.join(", "))
            };
            info!("  {} {:24}{}", icon, name, deps);
        }

        if let Some(cycle) = &state.stale_cycle {
            info!("  ❌ cycle: {}", cycle.join(" -> "));
        }

        info!("===========================================");
    }

    fn publish(&self, event: &str, payload: serde_json::Value) {
        if let Some(bus) = &self.bus {
            let report = bus.emit(event, payload);
            if !report.all_succeeded() {
                debug!(event = %event, failed = report.failed(), "Lifecycle listeners failed");
            }
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ComponentRegistry")
            .field("components", &state.descriptors.keys().collect::<Vec<_>>())
            .field("instances", &state.instances.len())
            .field("initialized", &state.initialized)
            .finish_non_exhaustive()
    }
}
