//! Plugin and package identifier validation.

/// True iff `s` is usable as a plugin name.
///
/// Names are non-empty, use only `a-z`, `0-9`, `-`, `_`, and may not start
/// with `_` — names with that prefix are reserved for staging artifacts
/// under the plugin root.
pub fn is_valid_plugin_name(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && s.bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'))
}

/// True iff `s` is usable as a package identifier: non-empty, ASCII
/// alphanumeric plus `-`, `_`, `.`.
pub fn is_valid_package_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
