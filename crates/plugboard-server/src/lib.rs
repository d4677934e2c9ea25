//! Plugboard Server
//!
//! Long-running HTTP server that deploys, hot-swaps, and removes API
//! plugins at runtime via archive upload, without a process restart.
//! This is a library crate — the server is started via `start_server()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::Method, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use plugboard_core::paths;
use plugboard_core::plugins::{Dispatcher, LifecycleManager, PluginRegistry};

pub mod routes;
pub mod types;

/// Configuration for starting the server.
pub struct ServerConfig {
    /// Port to listen on (default: 3000).
    pub port: u16,
    /// Root directory holding one backing directory per registered plugin.
    pub plugins_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            plugins_root: paths::plugins_dir(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Live name → handler registry.
    pub registry: Arc<PluginRegistry>,
    /// Register/reload/delete orchestration.
    pub lifecycle: Arc<LifecycleManager>,
    /// Request dispatch with fault isolation.
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the Axum router with all routes, bulk-loading any plugins already
/// present under the plugins root.
pub async fn build_router(config: &ServerConfig) -> anyhow::Result<(Router, AppState)> {
    let registry = Arc::new(PluginRegistry::new());
    let lifecycle = Arc::new(LifecycleManager::new(
        config.plugins_root.clone(),
        registry.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));

    match lifecycle.load_existing().await {
        Ok(count) if count > 0 => tracing::info!("Loaded {} existing plugin(s)", count),
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to scan plugins root: {}", e),
    }

    let state = AppState {
        registry,
        lifecycle,
        dispatcher,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/apis", routes::apis::router())
        .nest("/query", routes::query::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    Ok((app, state))
}

/// Start the Plugboard server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let (app, _state) = build_router(&config).await?;

    tracing::info!("Plugboard server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        plugins: state.registry.list_names().await,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    plugins: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn test_router(plugins_root: &std::path::Path) -> Router {
        let config = ServerConfig {
            port: 0,
            plugins_root: plugins_root.to_path_buf(),
        };
        let (app, _state) = build_router(&config).await.expect("build router");
        app
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    const BOUNDARY: &str = "xYzTestBoundary";

    /// Minimal component bundle fixture: `main.wasm` exports both
    /// capabilities and always replies `{"body":"<reply>"}`.
    fn component_wasm(reply: &str) -> Vec<u8> {
        let body = format!("{{\"body\":\"{reply}\"}}");
        let len = body.len();
        let data = body.replace('"', "\\22");
        let wat = format!(
            r#"(component
  (core module $m
    (memory (export "memory") 1)
    (data (i32.const 16) "{data}")
    (func (export "cabi_realloc") (param i32 i32 i32 i32) (result i32)
      i32.const 4096)
    (func $reply (param i32 i32) (result i32)
      (i32.store (i32.const 8) (i32.const 16))
      (i32.store (i32.const 12) (i32.const {len}))
      i32.const 8)
    (export "handle-get" (func $reply))
    (export "handle-post" (func $reply))
  )
  (core instance $i (instantiate $m))
  (func (export "handle-get") (param "request-json" string) (result string)
    (canon lift (core func $i "handle-get") (memory $i "memory")
      (realloc (func $i "cabi_realloc"))))
  (func (export "handle-post") (param "request-json" string) (result string)
    (canon lift (core func $i "handle-post") (memory $i "memory")
      (realloc (func $i "cabi_realloc"))))
)"#
        );
        wat::parse_str(&wat).expect("fixture component wat")
    }

    fn zip_bundle(wasm: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut buf = Vec::new();
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        writer
            .start_file("main.wasm", zip::write::SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(wasm).expect("write zip entry");
        writer.finish().expect("finish zip");
        buf
    }

    fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn register_request(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query/register")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields)))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_empty_plugin_list() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["plugins"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn dispatch_to_unregistered_name_is_404() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(Request::get("/apis/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_then_dispatch_serves_the_uploaded_plugin() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let bundle = zip_bundle(&component_wasm("pong"));
        let response = app
            .clone()
            .oneshot(register_request(&[
                ("api_name", None, b"ping"),
                ("file", Some("bundle.zip"), &bundle),
            ]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(json["message"], "successfully added new route: /apis/ping");

        let response = app
            .clone()
            .oneshot(Request::get("/apis/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"pong");

        // Re-registering the same name swaps the handler in place.
        let bundle = zip_bundle(&component_wasm("pong2"));
        let response = app
            .clone()
            .oneshot(register_request(&[
                ("api_name", None, b"ping"),
                ("file", Some("bundle.zip"), &bundle),
            ]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(
            json["message"],
            "successfully added new route: /apis/ping (reloaded)"
        );

        let response = app
            .oneshot(Request::get("/apis/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"pong2");
    }

    #[tokio::test]
    async fn oversized_upload_reaches_the_archive_check() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        // Larger than axum's 2 MB default body limit; must still reach the
        // staging step and fail as a bad archive, not as a missing file.
        let payload = vec![0u8; 3 * 1024 * 1024];
        let response = app
            .oneshot(register_request(&[
                ("api_name", None, b"big"),
                ("file", Some("bundle.zip"), &payload),
            ]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 10);
    }

    #[tokio::test]
    async fn register_without_file_is_code_4() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(register_request(&[("api_name", None, b"foo")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["code"], 4);
        assert_eq!(json["result"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn register_without_api_name_is_code_3() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(register_request(&[(
                "file",
                Some("bundle.zip"),
                b"payload",
            )]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 3);
    }

    #[tokio::test]
    async fn register_with_bad_name_charset_is_code_2() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(register_request(&[
                ("api_name", None, b"Bad Name!"),
                ("file", Some("bundle.zip"), b"payload"),
            ]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 2);
    }

    #[tokio::test]
    async fn register_with_non_archive_payload_is_code_10_and_leaves_no_trace() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(register_request(&[
                ("api_name", None, b"foo"),
                ("file", Some("bundle.zip"), b"this is not a zip"),
            ]))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 10);

        // No backing directory, and a fresh startup scan finds nothing.
        assert!(!root.path().join("foo").exists());
        let app = test_router(root.path()).await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["plugins"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn delete_without_api_name_is_code_3() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(
                Request::post("/query/delete")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(""))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 3);
    }

    #[tokio::test]
    async fn delete_of_unknown_name_is_code_1() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(
                Request::post("/query/delete")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("api_name=ghost"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 1);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("no such api registered"));
    }

    #[tokio::test]
    async fn delete_with_bad_charset_is_code_2() {
        let root = tempdir().expect("tempdir");
        let app = test_router(root.path()).await;

        let response = app
            .oneshot(
                Request::post("/query/delete")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("api_name=_reserved"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["code"], 2);
    }
}
