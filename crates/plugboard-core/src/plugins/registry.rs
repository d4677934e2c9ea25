//! In-memory registry mapping plugin names to live handler instances.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::handler::ApiHandler;

/// Concurrency-safe name → handler map.
///
/// The registry is the sole owner of handler entries; dispatch holds an
/// `Arc` clone only for the duration of the in-flight call. Lookups are
/// concurrent reads, installs and removals are exclusive writes, so a swap
/// is a single atomic instant: readers see either the full old handler or
/// the full new one, never a missing or mixed state for that name.
#[derive(Default)]
pub struct PluginRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ApiHandler>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` under `name`, replacing any previous entry.
    /// Returns true when an entry was replaced.
    pub async fn add_or_replace(&self, name: &str, handler: Arc<dyn ApiHandler>) -> bool {
        let mut handlers = self.handlers.write().await;
        handlers.insert(name.to_string(), handler).is_some()
    }

    /// Remove the entry for `name`; false when absent.
    pub async fn remove(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write().await;
        handlers.remove(name).is_some()
    }

    /// Get the live handler for `name`.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn ApiHandler>> {
        let handlers = self.handlers.read().await;
        handlers.get(name).cloned()
    }

    /// Point-in-time snapshot of registered names, sorted.
    pub async fn list_names(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut names: Vec<String> = handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
