//! Register/reload/delete orchestration.
//!
//! The register path is two-phase: the payload is extracted into a scratch
//! directory first, then renamed into the final per-name path. Rename is the
//! atomicity boundary — the filesystem shows either the complete old
//! directory or the complete new one, never a mixture — so a concurrent
//! dispatch to the same name never observes a torn install.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scopeguard::ScopeGuard;
use tokio::fs;
use tokio::sync::Mutex;

use super::error::LifecycleError;
use super::loader::PluginLoader;
use super::name::is_valid_plugin_name;
use super::registry::PluginRegistry;
use super::stage::ArchiveStager;

/// Whether a successful registration installed a fresh plugin or replaced a
/// previously installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Installed,
    Reloaded,
}

/// Orchestrates the plugin lifecycle across stager, loader, and registry.
pub struct LifecycleManager {
    plugins_root: PathBuf,
    stager: ArchiveStager,
    loader: PluginLoader,
    registry: Arc<PluginRegistry>,
    /// Serializes the filesystem phase of register/delete. Dispatch reads
    /// the registry lock-free of this mutex; only lifecycle mutations queue.
    ops: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(plugins_root: PathBuf, registry: Arc<PluginRegistry>) -> Self {
        let stager = ArchiveStager::new(plugins_root.join(".staging"));
        Self {
            plugins_root,
            stager,
            loader: PluginLoader::new(),
            registry,
            ops: Mutex::new(()),
        }
    }

    pub fn plugins_root(&self) -> &Path {
        &self.plugins_root
    }

    fn backing_dir(&self, name: &str) -> PathBuf {
        self.plugins_root.join(name)
    }

    fn validate_name(name: &str) -> Result<(), LifecycleError> {
        if is_valid_plugin_name(name) {
            Ok(())
        } else {
            Err(LifecycleError::Validation(format!(
                "use a-z, 0-9, -, and _ only in `api_name` (actual: {name})"
            )))
        }
    }

    /// Register a plugin from an uploaded archive, replacing any previously
    /// registered plugin of the same name.
    ///
    /// Known hazard: a failed reload leaves the previous handler registered
    /// and serving from memory even though its backing directory is already
    /// gone, because the old directory is removed before the new load is
    /// confirmed.
    pub async fn register(
        &self,
        name: &str,
        payload: &[u8],
    ) -> Result<RegisterOutcome, LifecycleError> {
        Self::validate_name(name)?;

        // Exclusive over the whole extract → remove-old → rename → load →
        // register sequence. Two concurrent registers of one name would
        // otherwise interleave on the filesystem: one rolling back could
        // delete the directory the other just installed.
        let _ops = self.ops.lock().await;

        fs::create_dir_all(&self.plugins_root)
            .await
            .map_err(LifecycleError::Storage)?;

        let staged = self.stager.stage(payload)?;

        let final_dir = self.backing_dir(name);
        let reload = final_dir.exists();
        if reload {
            // The working directory is removed only after staging succeeded.
            fs::remove_dir_all(&final_dir)
                .await
                .map_err(LifecycleError::Storage)?;
        }

        match fs::rename(&*staged, &final_dir).await {
            // Defuse the scratch guard: the directory now lives at the
            // final path.
            Ok(()) => drop(ScopeGuard::into_inner(staged)),
            // Guard drop cleans the scratch directory.
            Err(e) => return Err(LifecycleError::Storage(e)),
        }

        match self.loader.load(name, &final_dir).await {
            Ok(handler) => {
                self.registry.add_or_replace(name, Arc::new(handler)).await;
                tracing::info!(
                    "successfully added new route: /apis/{}{}",
                    name,
                    if reload { " (reloaded)" } else { "" }
                );
                Ok(if reload {
                    RegisterOutcome::Reloaded
                } else {
                    RegisterOutcome::Installed
                })
            }
            Err(e) => {
                // Roll back the installed directory so no broken,
                // unregistered plugin directory is left on disk.
                if let Err(cleanup) = fs::remove_dir_all(&final_dir).await {
                    tracing::warn!(
                        "Failed to roll back {} after load failure: {}",
                        final_dir.display(),
                        cleanup
                    );
                }
                tracing::warn!("Registration failed: /apis/{}", name);
                Err(e.into())
            }
        }
    }

    /// Unregister a plugin, then delete its backing directory.
    ///
    /// Directory deletion is best-effort: a filesystem error is surfaced but
    /// the registry removal stands — the route is already gone.
    pub async fn delete(&self, name: &str) -> Result<(), LifecycleError> {
        Self::validate_name(name)?;

        let _ops = self.ops.lock().await;

        if !self.registry.remove(name).await {
            return Err(LifecycleError::NotFound(name.to_string()));
        }

        let dir = self.backing_dir(name);
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir).await {
                tracing::warn!("Failed to delete backing dir {}: {}", dir.display(), e);
                return Err(LifecycleError::Storage(e));
            }
        }

        tracing::info!("successfully deleted route: /apis/{}", name);
        Ok(())
    }

    /// Load and register every plugin directory already present under the
    /// plugins root. Directories that fail to load are skipped with a
    /// warning; startup proceeds regardless. Returns the number loaded.
    pub async fn load_existing(&self) -> anyhow::Result<usize> {
        fs::create_dir_all(&self.plugins_root).await?;

        let mut loaded = 0;
        let mut entries = fs::read_dir(&self.plugins_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // Also skips the `.staging` scratch root.
            if !is_valid_plugin_name(&name) {
                continue;
            }

            match self.loader.load(&name, &entry.path()).await {
                Ok(handler) => {
                    self.registry.add_or_replace(&name, Arc::new(handler)).await;
                    tracing::info!("Loaded existing plugin: /apis/{}", name);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping plugin directory '{}': {}", name, e);
                }
            }
        }
        Ok(loaded)
    }
}
