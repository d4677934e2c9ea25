//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

/// Get the plugboard config directory (~/.plugboard)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".plugboard")
}

/// Get the plugin backing directory root (~/.plugboard/apis)
///
/// One subdirectory per registered plugin name; a subdirectory exists iff a
/// successful load has occurred for that name since its last deletion.
pub fn plugins_dir() -> PathBuf {
    config_dir().join("apis")
}
