//! Plugboard core library
//!
//! Plugin lifecycle and dispatch: name validation, archive staging, wasm
//! plugin loading, the live handler registry, and request dispatch with
//! per-plugin fault isolation.

pub mod paths;
pub mod plugins;
