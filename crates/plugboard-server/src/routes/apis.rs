//! Plugin dispatch endpoints: `/apis/{name}`.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use plugboard_core::plugins::{DispatchOutcome, PluginMethod, PluginRequest};

use crate::types::{QueryResponse, DISPATCH_FAULT_CODE};
use crate::AppState;

/// Build the dispatch router
pub fn router() -> Router<AppState> {
    Router::new().route("/:name", get(dispatch_get).post(dispatch_post))
}

async fn dispatch_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let request = plugin_request("GET", &name, query, &headers, Bytes::new());
    let outcome = state
        .dispatcher
        .dispatch(PluginMethod::Get, &name, request)
        .await;
    outcome_response(&name, outcome)
}

async fn dispatch_post(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = plugin_request("POST", &name, query, &headers, body);
    let outcome = state
        .dispatcher
        .dispatch(PluginMethod::Post, &name, request)
        .await;
    outcome_response(&name, outcome)
}

fn plugin_request(
    method: &str,
    name: &str,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    body: Bytes,
) -> PluginRequest {
    let headers = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_string(), value.to_string()))
        })
        .collect();

    PluginRequest {
        method: method.to_string(),
        path: format!("/apis/{name}"),
        query,
        headers,
        // Bodies are UTF-8 text by contract; invalid sequences are replaced
        // with U+FFFD. Binary payloads must be encoded by the caller.
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

fn outcome_response(name: &str, outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            format!("no api registered under /apis/{name}"),
        )
            .into_response(),
        DispatchOutcome::MethodNotSupported => (
            StatusCode::METHOD_NOT_ALLOWED,
            format!("/apis/{name} does not support this method"),
        )
            .into_response(),
        DispatchOutcome::Fault(trace) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(QueryResponse::new(DISPATCH_FAULT_CODE, trace)),
        )
            .into_response(),
        DispatchOutcome::Ok(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            match Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, &reply.content_type)
                .body(Body::from(reply.body))
            {
                Ok(response) => response,
                // The content type came from untrusted plugin output.
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(QueryResponse::new(
                        DISPATCH_FAULT_CODE,
                        format!("plugin returned invalid response metadata: {e}"),
                    )),
                )
                    .into_response(),
            }
        }
    }
}
