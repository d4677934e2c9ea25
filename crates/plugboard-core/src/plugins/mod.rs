//! Hot-swappable API plugin management.
//!
//! This module owns the full plugin lifecycle: uploaded zip bundles are
//! staged into a scratch directory, atomically installed as the plugin's
//! backing directory, compiled as wasm components, and registered into the
//! live handler registry that the dispatcher reads under concurrent traffic.

mod dispatch;
mod error;
mod handler;
mod lifecycle;
mod loader;
mod name;
mod registry;
mod stage;

pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{ArchiveError, LifecycleError, LoadError};
pub use handler::{ApiHandler, Capabilities, PluginMethod, PluginRequest, PluginResponse};
pub use lifecycle::{LifecycleManager, RegisterOutcome};
pub use loader::{PluginLoader, WasmHandler, ENTRY_COMPONENT};
pub use name::{is_valid_package_name, is_valid_plugin_name};
pub use registry::PluginRegistry;
pub use stage::{ArchiveStager, StagedDir};
