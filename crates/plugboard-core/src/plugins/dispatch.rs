//! Request dispatch with per-plugin fault isolation.

use std::sync::Arc;

use super::handler::{PluginMethod, PluginRequest, PluginResponse};
use super::registry::PluginRegistry;

/// Outcome of dispatching one request to one named plugin.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No plugin registered under that name.
    NotFound,
    /// The plugin is registered but does not export a capability for this
    /// method.
    MethodNotSupported,
    /// The plugin handled the request; status, content type, and body pass
    /// through unmodified.
    Ok(PluginResponse),
    /// The plugin raised while handling the request; carries the full
    /// diagnostic trace. Registry state and sibling plugins are unaffected.
    Fault(String),
}

/// Routes inbound requests to registered handlers.
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch `request` to the plugin registered under `name`.
    ///
    /// Handler code is arbitrary untrusted logic; any fault it raises is
    /// caught exactly here and converted into [`DispatchOutcome::Fault`].
    /// The handler `Arc` is cloned out of the registry before invocation,
    /// so a concurrent reload or removal never tears a call in flight.
    pub async fn dispatch(
        &self,
        method: PluginMethod,
        name: &str,
        request: PluginRequest,
    ) -> DispatchOutcome {
        let Some(handler) = self.registry.get(name).await else {
            return DispatchOutcome::NotFound;
        };

        if !handler.capabilities().supports(method) {
            return DispatchOutcome::MethodNotSupported;
        }

        let result = match method {
            PluginMethod::Get => handler.handle_get(request).await,
            PluginMethod::Post => handler.handle_post(request).await,
        };

        match result {
            Ok(response) => DispatchOutcome::Ok(response),
            Err(e) => {
                tracing::error!("Plugin '{}' faulted during {:?}: {:?}", name, method, e);
                DispatchOutcome::Fault(format!("{e:?}"))
            }
        }
    }
}
