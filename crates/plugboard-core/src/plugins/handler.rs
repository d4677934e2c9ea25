//! The handler seam between the dispatcher and loaded plugin code.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// HTTP method a plugin capability corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginMethod {
    Get,
    Post,
}

/// Which of the two capabilities a loaded plugin exports.
///
/// The loader guarantees at least one is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub get: bool,
    pub post: bool,
}

impl Capabilities {
    pub fn supports(&self, method: PluginMethod) -> bool {
        match method {
            PluginMethod::Get => self.get,
            PluginMethod::Post => self.post,
        }
    }
}

/// Request passed to a plugin capability, serialized to JSON on the way in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Response produced by a plugin capability, deserialized from JSON on the
/// way out. Status, content type, and body pass through to the client
/// unmodified.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PluginResponse {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub body: String,
}

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// A live request handler owned by the registry.
///
/// Implementations run arbitrary uploaded code; any fault they raise is an
/// `Err` here and is caught at the dispatch boundary, never beyond it.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// The capability set this handler exposed at load time.
    fn capabilities(&self) -> Capabilities;

    async fn handle_get(&self, request: PluginRequest) -> anyhow::Result<PluginResponse>;

    async fn handle_post(&self, request: PluginRequest) -> anyhow::Result<PluginResponse>;
}
