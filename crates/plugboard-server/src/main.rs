//! Plugboard Server
//!
//! Deploy, hot-swap, and remove API plugins at runtime by uploading
//! archive bundles — no process restart.

use plugboard_server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("PORT") {
        config.port = port.parse()?;
    }
    if let Ok(root) = std::env::var("PLUGBOARD_PLUGINS_DIR") {
        config.plugins_root = root.into();
    }

    start_server(config).await
}
