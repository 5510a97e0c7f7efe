//! Binding-context lookup.
//!
//! The registry never decides where a component binds. It asks a
//! [`Locator`], and a component without a binding context is skipped by
//! `initialize()` and treated as unresolved when it is needed as a
//! dependency.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a component binds, plus any properties the host supplies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingContext {
    pub target: String,
    #[serde(default)]
    pub props: Value,
}

impl BindingContext {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            props: Value::Null,
        }
    }

    #[must_use]
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}

/// Maps a component name to its binding context.
pub trait Locator: Send + Sync {
    fn locate(&self, name: &str) -> Option<BindingContext>;
}

impl<F> Locator for F
where
    F: Fn(&str) -> Option<BindingContext> + Send + Sync,
{
    fn locate(&self, name: &str) -> Option<BindingContext> {
        self(name)
    }
}

/// Map-backed [`Locator`].
#[derive(Debug, Default)]
pub struct StaticLocator {
    bindings: RwLock<HashMap<String, BindingContext>>,
}

impl StaticLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn bind(self, name: impl Into<String>, context: BindingContext) -> Self {
        self.insert(name, context);
        self
    }

    /// Bind `name`, replacing any previous context.
    pub fn insert(&self, name: impl Into<String>, context: BindingContext) {
        self.bindings.write().insert(name.into(), context);
    }

    pub fn remove(&self, name: &str) -> Option<BindingContext> {
        self.bindings.write().remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

impl Locator for StaticLocator {
    fn locate(&self, name: &str) -> Option<BindingContext> {
        self.bindings.read().get(name).cloned()
    }
}
