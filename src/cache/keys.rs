//! Cache key derivation.
//!
//! A `RequestIdentity` is host + path + query taken verbatim from the request.
//! Its SHA-256 hex digest is the `CacheKey`, which also names the entry file.

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Length of the fan-out directory name taken from the front of the digest.
const FAN_OUT_LEN: usize = 2;

/// Identity of a cacheable request. No normalization is applied: `/a` and `/a/`
/// or differently ordered query strings are distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    host: String,
    path_and_query: String,
}

impl RequestIdentity {
    pub fn new(host: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path_and_query: path_and_query.into(),
        }
    }

    /// The exact string that gets hashed.
    pub fn as_key_input(&self) -> String {
        format!("{}{}", self.host, self.path_and_query)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path_and_query)
    }
}

/// Lowercase hex SHA-256 digest of a request identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
}

impl CacheKey {
    pub fn derive(identity: &RequestIdentity) -> Self {
        Self::from_input(&identity.as_key_input())
    }

    pub fn from_input(input: &str) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(input.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }

    /// Name of the fan-out directory holding this entry.
    pub fn fan_out(&self) -> &str {
        &self.digest[..FAN_OUT_LEN]
    }

    /// Name of the entry file inside its fan-out directory.
    pub fn file_name(&self) -> &str {
        &self.digest[FAN_OUT_LEN..]
    }

    /// Path of the entry relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.fan_out()).join(self.file_name())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}
