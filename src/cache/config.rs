//! Cache configuration.
//!
//! Controls where entries live and how long they stay fresh via `rfpl.toml`.

use std::path::PathBuf;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_DIRECTORY: &str = "cache";
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// What the middleware does with requests that are not `GET`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodPolicy {
    /// Hand the request to the wrapped handler without touching the cache.
    #[default]
    Bypass,
    /// Answer `405 Method Not Allowed`.
    Reject,
}

/// Cache configuration from `rfpl.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of the entry tree. Created on open when missing.
    pub directory: PathBuf,
    /// Seconds an entry stays fresh after its last write.
    pub ttl_seconds: u64,
    /// `Content-Type` sent with cached responses; entries carry no metadata.
    pub content_type: String,
    /// Handling of non-GET requests at the middleware boundary.
    pub method_policy: MethodPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            method_policy: MethodPolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            directory: settings.directory.clone(),
            ttl_seconds: settings.ttl_seconds,
            content_type: settings.content_type.clone(),
            method_policy: if settings.reject_non_get {
                MethodPolicy::Reject
            } else {
                MethodPolicy::Bypass
            },
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at `directory` with default TTL.
    pub fn at(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.directory, PathBuf::from("cache"));
        assert_eq!(config.ttl_seconds, 300);
        assert_eq!(config.content_type, "text/html; charset=utf-8");
        assert_eq!(config.method_policy, MethodPolicy::Bypass);
    }

    #[test]
    fn at_keeps_other_defaults() {
        let config = CacheConfig::at("/var/cache/rfpl");
        assert_eq!(config.directory, PathBuf::from("/var/cache/rfpl"));
        assert_eq!(config.ttl_seconds, 300);
    }

    #[test]
    fn reject_flag_maps_to_policy() {
        let settings = crate::config::CacheSettings {
            directory: PathBuf::from("cache"),
            ttl_seconds: 10,
            content_type: "text/plain".to_string(),
            reject_non_get: true,
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.method_policy, MethodPolicy::Reject);
        assert_eq!(config.ttl_seconds, 10);
        assert_eq!(config.content_type, "text/plain");
    }
}
