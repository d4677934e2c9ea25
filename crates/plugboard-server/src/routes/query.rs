//! Plugin lifecycle endpoints: `/query/register` and `/query/delete`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Form, Json, Router,
};

use plugboard_core::plugins::{
    is_valid_plugin_name, ArchiveError, LifecycleError, RegisterOutcome,
};

use crate::types::{delete_code, register_code, DeleteRequest, QueryResponse};
use crate::AppState;

/// Plugin bundles routinely exceed axum's 2 MB default body limit.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Build the query router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/delete", post(delete))
}

/// Register (or hot-reload) a plugin from a multipart upload with fields
/// `file` (archive bytes) and `api_name`.
async fn register(State(state): State<AppState>, mut multipart: Multipart) -> Json<QueryResponse> {
    let mut api_name: Option<String> = None;
    let mut file: Option<Bytes> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("api_name") => api_name = field.text().await.ok(),
                Some("file") => file = field.bytes().await.ok(),
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                return Json(QueryResponse::new(
                    register_code::MISSING_FILE,
                    format!("specify file. (malformed multipart upload: {e})"),
                ))
            }
        }
    }

    let Some(payload) = file else {
        return Json(QueryResponse::new(register_code::MISSING_FILE, "specify file."));
    };
    let api_name = match api_name {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Json(QueryResponse::new(
                register_code::MISSING_API_NAME,
                "specify parameter `api_name`",
            ))
        }
    };
    if !is_valid_plugin_name(&api_name) {
        return Json(QueryResponse::new(
            register_code::INVALID_NAME,
            format!("use a-z, 0-9, -, and _ only in `api_name` (actual: {api_name})"),
        ));
    }

    match state.lifecycle.register(&api_name, &payload).await {
        Ok(outcome) => {
            let suffix = match outcome {
                RegisterOutcome::Reloaded => " (reloaded)",
                RegisterOutcome::Installed => "",
            };
            Json(QueryResponse::new(
                register_code::OK,
                format!("successfully added new route: /apis/{api_name}{suffix}"),
            ))
        }
        Err(e) => Json(register_error_response(&api_name, e)),
    }
}

fn register_error_response(api_name: &str, err: LifecycleError) -> QueryResponse {
    match err {
        LifecycleError::Validation(msg) => QueryResponse::new(register_code::INVALID_NAME, msg),
        LifecycleError::Archive(ArchiveError::NotAnArchive(e)) => QueryResponse::new(
            register_code::NOT_AN_ARCHIVE,
            format!("uploaded file is not a valid zip archive: {e}"),
        ),
        LifecycleError::Archive(ArchiveError::Io(e)) => QueryResponse::new(
            register_code::EXTRACTION_IO,
            format!("i/o error while extracting archive: {e}"),
        ),
        LifecycleError::Storage(e) => QueryResponse::new(
            register_code::EXTRACTION_IO,
            format!("i/o error while installing plugin directory: {e}"),
        ),
        other => QueryResponse::new(
            register_code::LOAD_FAILED,
            format!("error while adding new route: /apis/{api_name} \n {other}"),
        ),
    }
}

/// Delete a registered plugin by form field `api_name`.
async fn delete(
    State(state): State<AppState>,
    Form(request): Form<DeleteRequest>,
) -> Json<QueryResponse> {
    let api_name = match request.api_name {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Json(QueryResponse::new(
                delete_code::MISSING_API_NAME,
                "specify parameter `api_name`",
            ))
        }
    };
    if !is_valid_plugin_name(&api_name) {
        return Json(QueryResponse::new(
            delete_code::INVALID_NAME,
            format!("use a-z, 0-9, -, and _ only in `api_name` (actual: {api_name})"),
        ));
    }

    match state.lifecycle.delete(&api_name).await {
        Ok(()) => Json(QueryResponse::new(
            delete_code::OK,
            format!("successfully deleted route: /apis/{api_name}"),
        )),
        Err(e) => Json(QueryResponse::new(
            delete_code::DELETE_FAILED,
            format!("error while deleting route; /apis/{api_name} \n {e}"),
        )),
    }
}
