//! # Trellis Runtime
//!
//! Composition root for the event bus and the component registry.
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration (environment)
//! 2. Build exactly one [`EventBus`] and one [`ComponentRegistry`]
//! 3. Register every enabled manifest entry
//! 4. `initialize()` in dependency order, rendering where declared
//! 5. Publish `app:ready`
//!
//! ## Shutdown Sequence
//!
//! 1. Publish `app:shutdown`
//! 2. Veto all further publishing
//! 3. `destroy_all()` in reverse dependency order
//!
//! Collaborators receive the bus and registry by handle; there is no
//! global state.

pub mod components;
pub mod config;
pub mod telemetry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use trellis_bus::{EmitOptions, EmitReport, EventBus, MiddlewareAction};
use trellis_registry::{BindingContext, ComponentRegistry, Locator, RegistryError, StaticLocator};

use crate::components::ComponentKind;
pub use crate::config::{ConfigError, LogConfig, RuntimeConfig, MAX_HISTORY_CAPACITY};

/// Published once every component is initialized.
pub const APP_READY: &str = "app:ready";
/// Published right before components are destroyed.
pub const APP_SHUTDOWN: &str = "app:shutdown";

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The running application.
pub struct TrellisRuntime {
    bus: EventBus,
    registry: Arc<ComponentRegistry>,
    locator: Arc<StaticLocator>,
    config: RuntimeConfig,
    shutting_down: Arc<AtomicBool>,
}

impl TrellisRuntime {
    /// Build the bus and registry and register the enabled manifest.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;

        let bus = EventBus::with_config(config.bus.clone());

        let shutting_down = Arc::new(AtomicBool::new(false));
        {
            let shutting_down = Arc::clone(&shutting_down);
            bus.use_middleware(move |event, _, _| {
                if shutting_down.load(Ordering::Acquire) {
                    warn!(event = %event, "Publishing after shutdown, vetoed");
                    MiddlewareAction::Veto
                } else {
                    MiddlewareAction::Continue
                }
            });
        }

        let locator = Arc::new(StaticLocator::new());
        for mount in &config.mounts {
            locator.insert(mount.clone(), BindingContext::new(format!("#{mount}")));
        }

        let registry = Arc::new(
            ComponentRegistry::from_shared(Arc::clone(&locator) as Arc<dyn Locator>)
                .with_bus(bus.clone()),
        );

        for kind in ComponentKind::ALL {
            if !config.is_enabled(kind) {
                info!(component = kind.name(), "Skipping disabled component");
                continue;
            }
            registry.register(kind.name(), kind.constructor(&bus), kind.dependencies())?;
        }

        for missing in registry.missing_dependencies() {
            warn!(%missing, "Declared dependency is not registered");
        }

        Ok(Self {
            bus,
            registry,
            locator,
            config,
            shutting_down,
        })
    }

    /// Initialize every component and announce readiness.
    pub fn start(&self) -> Result<(), RuntimeError> {
        info!("===========================================");
        info!("  Trellis Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.registry.initialize()?;
        self.registry.print_status();

        let stats = self.registry.get_stats();
        self.bus.emit(
            APP_READY,
            json!({ "components": stats.instances, "order": stats.load_order }),
        );
        info!(components = stats.instances, "Runtime started");

        Ok(())
    }

    /// Run `payload` through the middleware pipeline and emit it.
    ///
    /// Returns `None` if a middleware vetoed the event.
    pub fn publish(&self, event: &str, payload: Value) -> Option<EmitReport> {
        let payload = self.bus.apply_middleware(event, payload)?;
        Some(self.bus.emit(event, payload))
    }

    /// Concurrent variant of [`Self::publish`].
    pub async fn publish_async(
        &self,
        event: &str,
        payload: Value,
        options: EmitOptions,
    ) -> Option<EmitReport> {
        let payload = self.bus.apply_middleware(event, payload)?;
        Some(self.bus.emit_async(event, payload, options).await)
    }

    /// Destroy every component. Returns how many instances were destroyed.
    ///
    /// Idempotent: later calls destroy nothing.
    pub fn shutdown(&self) -> usize {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        info!("Initiating graceful shutdown...");

        // Publishing is already vetoed, so announce on the bus directly.
        self.bus.emit(APP_SHUTDOWN, Value::Null);

        let destroyed = self.registry.destroy_all();
        info!(destroyed, "Shutdown complete");
        destroyed
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ComponentRegistry> {
        Arc::clone(&self.registry)
    }

    /// The locator built from `TRELLIS_MOUNTS`. Mounts added here are seen by
    /// later `create` calls.
    #[must_use]
    pub fn locator(&self) -> &StaticLocator {
        &self.locator
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Log registry and bus status.
    pub fn print_status(&self) {
        self.registry.print_status();
        let stats = self.bus.stats();
        info!(
            events = stats.events,
            listeners = stats.listeners,
            emitted = stats.emitted,
            history = stats.history_len,
            "Event bus status"
        );
    }
}
