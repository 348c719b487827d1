//! File-backed cache store.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use axum::http::Method;
use bytes::Bytes;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use super::{
    capture::Capture,
    config::CacheConfig,
    context::RequestContext,
    error::CacheError,
    freshness::{is_fresh, now_unix_seconds, unix_seconds},
    keys::CacheKey,
    response::HitResponse,
};

/// Pure content → content function applied before bytes reach the client.
pub type Transform = Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>;

/// A stored entry as read from disk.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content: Bytes,
    pub modified: i64,
}

/// Outcome of `CacheStore::serve`.
pub enum Served {
    /// Entry within its TTL. Send the response and stop.
    Fresh(HitResponse),
    /// Entry past its TTL. Send the response now, then feed the regenerated
    /// output into `capture`; it emits nothing.
    Stale {
        response: HitResponse,
        capture: Capture,
    },
    /// No entry. Route all handler output through `capture`.
    Miss(Capture),
}

impl fmt::Debug for Served {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Served::Fresh(response) => f.debug_tuple("Fresh").field(response).finish(),
            Served::Stale { response, capture } => f
                .debug_struct("Stale")
                .field("response", response)
                .field("capture", capture)
                .finish(),
            Served::Miss(capture) => f.debug_tuple("Miss").field(capture).finish(),
        }
    }
}

/// Owns the on-disk entry tree under `root`.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    ttl_seconds: u64,
}

impl CacheStore {
    /// Open the cache rooted at `config.directory`, creating it when missing.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let path = config.directory.as_path();

        if path.exists() && !path.is_dir() {
            return Err(CacheError::configuration(
                path,
                "path exists and is not a directory",
            ));
        }

        // Failure here is caught by the canonicalize check below.
        if let Err(err) = std::fs::create_dir_all(path) {
            debug!(path = %path.display(), error = %err, "cache directory creation failed");
        }

        let root = match path.canonicalize() {
            Ok(root) if root.is_dir() => root,
            _ => {
                return Err(CacheError::configuration(
                    path,
                    "unable to create cache directory",
                ));
            }
        };

        debug!(root = %root.display(), ttl_seconds = config.ttl_seconds, "cache store opened");

        Ok(Self {
            root,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Canonical absolute root of the entry tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Read the entry for `key`. Unreadable entries are treated as absent.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        match read_entry(&path).await {
            Ok(entry) => Some(entry),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key = %key, error = %err, "unreadable cache entry, treating as miss");
                None
            }
        }
    }

    /// Whether `entry` is still within the TTL at `now`.
    pub fn is_entry_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        is_fresh(entry.modified, self.ttl_seconds, now)
    }

    /// Decide between fresh hit, stale hit and miss for `context`.
    ///
    /// Only `GET` is cacheable; any other method fails before the filesystem is
    /// touched. On a hit, `transform` runs on the stored content before gzip
    /// negotiation. On a miss it travels with the returned capture.
    pub async fn serve(
        &self,
        context: &RequestContext,
        transform: Option<Transform>,
    ) -> Result<Served, CacheError> {
        if context.method != Method::GET {
            return Err(CacheError::MethodNotCacheable {
                method: context.method.clone(),
            });
        }

        let key = CacheKey::derive(&context.identity());
        let path = self.entry_path(&key);

        let Some(entry) = self.lookup(&key).await else {
            debug!(cache = "file", outcome = "miss", key = %key, "cache miss, capturing output");
            return Ok(Served::Miss(Capture::emit(key, path, transform)));
        };

        let fresh = self.is_entry_fresh(&entry, now_unix_seconds());

        let content = match transform.as_ref() {
            Some(transform) => transform(entry.content),
            None => entry.content,
        };
        let response = HitResponse::negotiate(content, context.accepts_gzip());

        debug!(
            cache = "file",
            outcome = "hit",
            freshness = if fresh { "fresh" } else { "stale" },
            key = %key,
            gzip = response.is_gzip(),
            "serving cached response"
        );

        if fresh {
            Ok(Served::Fresh(response))
        } else {
            Ok(Served::Stale {
                response,
                capture: Capture::discard(key, path),
            })
        }
    }
}

async fn read_entry(path: &Path) -> io::Result<CacheEntry> {
    let mut file = File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(io::Error::other("cache entry is not a regular file"));
    }
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    let mut content = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut content).await?;

    Ok(CacheEntry {
        content: Bytes::from(content),
        modified: unix_seconds(modified),
    })
}
