//! # Composed Configuration
//!
//! The merged, read-only view over an ordered provider chain.
//!
//! Providers are loaded in registration order and deep-merged, later
//! providers overriding earlier ones. The composed tree lives behind a
//! `parking_lot::RwLock` so `reload` swaps it in place and concurrent
//! readers observe the new tree immediately.

use crate::provider::ConfigProvider;
use crate::value::{get_path, merge};
use errors::SettingsError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only configuration composed from a provider chain.
pub struct ComposedConfig {
    providers: Vec<Arc<dyn ConfigProvider>>,
    tree: RwLock<Value>,
}

impl ComposedConfig {
    /// Compose the chain, loading every provider in order.
    ///
    /// A provider failure aborts composition; there is no
    /// partial-chain fallback.
    pub fn new(providers: Vec<Arc<dyn ConfigProvider>>) -> Result<Self, SettingsError> {
        let tree = compose(&providers)?;

        Ok(Self {
            providers,
            tree: RwLock::new(tree),
        })
    }

    /// Re-read every provider and swap in the freshly merged tree.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let tree = compose(&self.providers)?;
        *self.tree.write() = tree;
        info!(providers = self.providers.len(), "Configuration reloaded");
        Ok(())
    }

    /// Raw value at a dot-separated path.
    pub fn get_value(&self, path: &str) -> Option<Value> {
        let tree = self.tree.read();
        get_path(&tree, path).cloned()
    }

    /// Typed value at a dot-separated path.
    ///
    /// Returns `None` when the path is absent or the value does not
    /// deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get_value(path)?;
        serde_json::from_value(value).ok()
    }

    /// The registered provider chain, in priority order.
    pub fn providers(&self) -> &[Arc<dyn ConfigProvider>] {
        &self.providers
    }

    /// Clone of the whole composed tree.
    pub fn export(&self) -> Value {
        self.tree.read().clone()
    }
}

fn compose(providers: &[Arc<dyn ConfigProvider>]) -> Result<Value, SettingsError> {
    let mut merged = Value::Object(Map::new());

    for provider in providers {
        let tree = provider.load()?;
        debug!(provider = %provider.name(), "Merged provider into composed view");
        merged = merge(merged, tree);
    }

    Ok(merged)
}
