//! # Runtime Configuration
//!
//! Everything is read from environment variables with sane defaults.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TRELLIS_HISTORY_CAPACITY` | `100` | Events kept in bus history (at most 1,000,000) |
//! | `TRELLIS_LISTENER_TIMEOUT_MS` | unset | Default concurrent-dispatch timeout |
//! | `TRELLIS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `TRELLIS_JSON_LOGS` | `false` | JSON formatted logs |
//! | `TRELLIS_COMPONENT_<NAME>` | `true` | Set to `false`/`0` to disable a component |
//! | `TRELLIS_MOUNTS` | all components | Comma separated components that have a binding context |

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use thiserror::Error;
use trellis_bus::BusConfig;

use crate::components::ComponentKind;

/// Upper bound accepted for `TRELLIS_HISTORY_CAPACITY`.
pub const MAX_HISTORY_CAPACITY: usize = 1_000_000;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value '{value}' for {var}")]
    InvalidValue { var: String, value: String },

    /// `TRELLIS_MOUNTS` names a component that is not in the manifest.
    #[error("Unknown component '{0}' in TRELLIS_MOUNTS")]
    UnknownMount(String),

    /// `TRELLIS_HISTORY_CAPACITY` is above [`MAX_HISTORY_CAPACITY`].
    #[error("History capacity {capacity} exceeds the maximum of {max}")]
    HistoryTooLarge { capacity: usize, max: usize },

    /// An enabled component depends on a disabled one.
    #[error("Component '{component}' depends on disabled component '{dependency}'")]
    DisabledDependency {
        component: &'static str,
        dependency: &'static str,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive (trace, debug, info, warn, error or per-target).
    pub level: String,
    /// Emit JSON instead of human readable lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub bus: BusConfig,
    pub log: LogConfig,
    /// Components left out of the registry.
    pub disabled: BTreeSet<ComponentKind>,
    /// Components the locator can bind.
    pub mounts: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            log: LogConfig::default(),
            disabled: BTreeSet::new(),
            mounts: ComponentKind::ALL.iter().map(|k| k.name().to_string()).collect(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup` (variable name -> value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("TRELLIS_HISTORY_CAPACITY") {
            config.bus.history_capacity = parse_var("TRELLIS_HISTORY_CAPACITY", &raw)?;
        }

        if let Some(raw) = lookup("TRELLIS_LISTENER_TIMEOUT_MS") {
            let millis: u64 = parse_var("TRELLIS_LISTENER_TIMEOUT_MS", &raw)?;
            config.bus.default_timeout = Some(Duration::from_millis(millis));
        }

        if let Some(level) = lookup("TRELLIS_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.log.level = level;
        }

        if let Some(raw) = lookup("TRELLIS_JSON_LOGS") {
            config.log.json = parse_flag("TRELLIS_JSON_LOGS", &raw)?;
        }

        for kind in ComponentKind::ALL {
            let var = kind.env_var();
            if let Some(raw) = lookup(&var) {
                if !parse_flag(&var, &raw)? {
                    config.disabled.insert(kind);
                }
            }
        }

        if let Some(raw) = lookup("TRELLIS_MOUNTS") {
            config.mounts = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    /// Whether `kind` should be registered.
    #[must_use]
    pub fn is_enabled(&self, kind: ComponentKind) -> bool {
        !self.disabled.contains(&kind)
    }

    pub fn disable(&mut self, kind: ComponentKind) {
        self.disabled.insert(kind);
    }

    pub fn enable(&mut self, kind: ComponentKind) {
        self.disabled.remove(&kind);
    }

    /// Check that every mount is known and no enabled component depends on
    /// a disabled one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(ConfigError::HistoryTooLarge {
                capacity: self.bus.history_capacity,
                max: MAX_HISTORY_CAPACITY,
            });
        }

        if let Some(unknown) = self
            .mounts
            .iter()
            .find(|m| ComponentKind::from_name(m).is_none())
        {
            return Err(ConfigError::UnknownMount(unknown.clone()));
        }

        for kind in ComponentKind::ALL {
            if !self.is_enabled(kind) {
                continue;
            }
            for dep in kind.dependency_kinds() {
                if !self.is_enabled(dep) {
                    return Err(ConfigError::DisabledDependency {
                        component: kind.name(),
                        dependency: dep.name(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: raw.to_string(),
    })
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
