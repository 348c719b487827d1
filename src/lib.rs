//! Respond first, process later.
//!
//! A file-backed HTTP response cache for axum. Stored pages are sent to the
//! client straight away; when they are past their TTL the wrapped handler
//! runs afterwards and its output replaces the entry.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
