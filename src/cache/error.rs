use std::{io, path::PathBuf};

use axum::http::{Method, StatusCode};
use thiserror::Error;

use super::keys::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache directory `{}` is unusable: {reason}", path.display())]
    Configuration { path: PathBuf, reason: &'static str },
    #[error("only GET requests can be cached, got {method}")]
    MethodNotCacheable { method: Method },
    #[error("failed to store cache entry {key}: {reason}")]
    Storage {
        key: CacheKey,
        reason: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub(crate) fn configuration(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::Configuration {
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn storage(key: CacheKey, reason: &'static str, source: io::Error) -> Self {
        Self::Storage {
            key,
            reason,
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CacheError::MethodNotCacheable { .. } => StatusCode::METHOD_NOT_ALLOWED,
            CacheError::Configuration { .. } | CacheError::Storage { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
