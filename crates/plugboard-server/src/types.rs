//! Request and response types for the query API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON envelope returned by `/query/register` and `/query/delete`, and as
/// the 500 body when a plugin faults during dispatch.
#[derive(Serialize)]
pub struct QueryResponse {
    pub code: i32,
    pub message: String,
    pub result: Value,
}

impl QueryResponse {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            result: Value::Null,
        }
    }
}

/// Numeric result codes for `/query/register`.
pub mod register_code {
    pub const OK: i32 = 0;
    pub const LOAD_FAILED: i32 = 1;
    pub const INVALID_NAME: i32 = 2;
    pub const MISSING_API_NAME: i32 = 3;
    pub const MISSING_FILE: i32 = 4;
    pub const NOT_AN_ARCHIVE: i32 = 10;
    pub const EXTRACTION_IO: i32 = 11;
}

/// Numeric result codes for `/query/delete`.
pub mod delete_code {
    pub const OK: i32 = 0;
    pub const DELETE_FAILED: i32 = 1;
    pub const INVALID_NAME: i32 = 2;
    pub const MISSING_API_NAME: i32 = 3;
}

/// Dispatch fault code embedded in 500 responses.
pub const DISPATCH_FAULT_CODE: i32 = -100;

#[derive(Deserialize)]
pub struct DeleteRequest {
    pub api_name: Option<String>,
}
