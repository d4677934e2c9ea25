//! HTTP routes

pub mod apis;
pub mod query;
