//! Wasm plugin loading.
//!
//! A plugin's backing directory designates its executable unit by
//! convention: a WebAssembly component at `main.wasm`. Each capability is an
//! exported function `(request-json: string) -> response-json: string`.
//!
//! Every load compiles the component freshly from disk — there is no cache
//! keyed on the plugin name — so a reload always observes the new directory
//! contents. Every invocation runs in its own `Store` with a WASI context
//! whose only preopened directory is the plugin's backing directory
//! (read-only), which lets plugins read their bundled resources without
//! reaching anything else on the host.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context as _;
use async_trait::async_trait;
use wasmtime::component::{Component, InstancePre, Linker};
use wasmtime::{Config, Engine, Store};
use wasmtime_wasi::{
    DirPerms, FilePerms, IoView, ResourceTable, WasiCtx, WasiCtxBuilder, WasiView,
};

use super::error::LoadError;
use super::handler::{ApiHandler, Capabilities, PluginRequest, PluginResponse};

/// Executable unit convention inside a plugin's backing directory.
pub const ENTRY_COMPONENT: &str = "main.wasm";

const EXPORT_GET: &str = "handle-get";
const EXPORT_POST: &str = "handle-post";

/// Per-invocation store state: WASI context plus resource table.
pub struct PluginState {
    ctx: WasiCtx,
    table: ResourceTable,
}

impl IoView for PluginState {
    fn table(&mut self) -> &mut ResourceTable {
        &mut self.table
    }
}

impl WasiView for PluginState {
    fn ctx(&mut self) -> &mut WasiCtx {
        &mut self.ctx
    }
}

fn wasm_engine() -> Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE
        .get_or_init(|| {
            let mut config = Config::new();
            config.async_support(true);
            config.wasm_component_model(true);
            Engine::new(&config).expect("failed to create WASM engine")
        })
        .clone()
}

fn new_store(engine: &Engine, plugin_dir: &Path) -> anyhow::Result<Store<PluginState>> {
    let mut builder = WasiCtxBuilder::new();
    builder.inherit_stdout().inherit_stderr();
    builder
        .preopened_dir(plugin_dir, ".", DirPerms::READ, FilePerms::READ)
        .with_context(|| format!("failed to preopen {}", plugin_dir.display()))?;
    Ok(Store::new(
        engine,
        PluginState {
            ctx: builder.build(),
            table: ResourceTable::new(),
        },
    ))
}

/// Compiles and validates plugin components.
pub struct PluginLoader {
    engine: Engine,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            engine: wasm_engine(),
        }
    }

    /// Load the plugin in `dir` and validate its capability set.
    ///
    /// Any fault raised while compiling, linking, or instantiating the
    /// component is caught and reported as [`LoadError::Import`] with the
    /// full diagnostic chain; this never propagates an uncaught fault.
    pub async fn load(&self, name: &str, dir: &Path) -> Result<WasmHandler, LoadError> {
        let entry = dir.join(ENTRY_COMPONENT);
        let component = Component::from_file(&self.engine, &entry)
            .with_context(|| format!("failed to compile component {}", entry.display()))
            .map_err(LoadError::Import)?;

        let mut linker = Linker::new(&self.engine);
        wasmtime_wasi::add_to_linker_async(&mut linker).map_err(LoadError::Import)?;
        let instance_pre = linker
            .instantiate_pre(&component)
            .context("failed to link component imports")
            .map_err(LoadError::Import)?;

        // Probe instantiation: surfaces faults in plugin start code and
        // reveals the exported capability set before anything is registered.
        let mut store = new_store(&self.engine, dir).map_err(LoadError::Import)?;
        let instance = instance_pre
            .instantiate_async(&mut store)
            .await
            .context("failed to instantiate component")
            .map_err(LoadError::Import)?;

        let capabilities = Capabilities {
            get: instance.get_func(&mut store, EXPORT_GET).is_some(),
            post: instance.get_func(&mut store, EXPORT_POST).is_some(),
        };
        if !capabilities.get && !capabilities.post {
            return Err(LoadError::CapabilityMissing);
        }

        Ok(WasmHandler {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            engine: self.engine.clone(),
            instance_pre,
            capabilities,
        })
    }
}

/// A loaded plugin: a pre-linked component instantiated once per request.
///
/// `InstancePre` is cheap to clone into a fresh `Store`, so concurrent
/// dispatches to the same plugin never contend on shared mutable state.
pub struct WasmHandler {
    name: String,
    dir: PathBuf,
    engine: Engine,
    instance_pre: InstancePre<PluginState>,
    capabilities: Capabilities,
}

impl std::fmt::Debug for WasmHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmHandler")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl WasmHandler {
    async fn invoke(&self, export: &str, request: &PluginRequest) -> anyhow::Result<PluginResponse> {
        let mut store = new_store(&self.engine, &self.dir)?;
        let instance = self.instance_pre.instantiate_async(&mut store).await?;
        let func = instance
            .get_typed_func::<(String,), (String,)>(&mut store, export)
            .with_context(|| format!("plugin '{}' does not export `{}`", self.name, export))?;

        let payload = serde_json::to_string(request).context("failed to serialize request")?;
        let (raw,) = func.call_async(&mut store, (payload,)).await?;
        func.post_return_async(&mut store).await?;

        serde_json::from_str(&raw)
            .with_context(|| format!("plugin '{}' returned malformed response JSON", self.name))
    }
}

#[async_trait]
impl ApiHandler for WasmHandler {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn handle_get(&self, request: PluginRequest) -> anyhow::Result<PluginResponse> {
        self.invoke(EXPORT_GET, &request).await
    }

    async fn handle_post(&self, request: PluginRequest) -> anyhow::Result<PluginResponse> {
        self.invoke(EXPORT_POST, &request).await
    }
}
