//! Respond-first response cache.
//!
//! Stores rendered responses as plain files keyed by a SHA-256 digest of the
//! request's host, path and query:
//!
//! ```text
//! <directory>/<first two hex chars>/<remaining 62 hex chars>
//! ```
//!
//! - **Fresh hit**: the stored body is returned and the handler never runs.
//! - **Stale hit**: the stored body is returned immediately, then the handler
//!   runs once more and its output replaces the entry without reaching the client.
//! - **Miss**: the handler's output is captured, persisted, and forwarded.
//!
//! Entries never expire on their own; freshness is derived from the file's
//! modification time and the configured TTL.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! directory = "cache"
//! ttl_seconds = 300
//! ```

mod capture;
mod config;
mod context;
mod encoding;
mod error;
mod freshness;
mod keys;
mod middleware;
mod response;
mod store;

pub use capture::Capture;
pub use config::{CacheConfig, MethodPolicy};
pub use context::RequestContext;
pub use encoding::{accepts_gzip, gzip};
pub use error::CacheError;
pub use freshness::{is_fresh, now_unix_seconds, unix_seconds};
pub use keys::{CacheKey, RequestIdentity};
pub use middleware::{CacheState, respond_first_layer, should_store_response};
pub use response::HitResponse;
pub use store::{CacheEntry, CacheStore, Served, Transform};
