//! Capture sink for handler output.
//!
//! A `Capture` is handed out by `CacheStore::serve` whenever the wrapped
//! handler's output must be persisted. Consuming it with `store` writes the
//! entry and yields the bytes the client should still receive.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{error::CacheError, keys::CacheKey, store::Transform};

/// Mode of a persisted entry file.
#[cfg(unix)]
const ENTRY_MODE: u32 = 0o644;

enum Mode {
    /// Miss: nothing sent yet, forward the (transformed) content.
    Emit(Option<Transform>),
    /// Stale refresh: the client already has a full response.
    Discard,
}

pub struct Capture {
    key: CacheKey,
    path: PathBuf,
    mode: Mode,
}

impl Capture {
    pub(crate) fn emit(key: CacheKey, path: PathBuf, transform: Option<Transform>) -> Self {
        Self {
            key,
            path,
            mode: Mode::Emit(transform),
        }
    }

    pub(crate) fn discard(key: CacheKey, path: PathBuf) -> Self {
        Self {
            key,
            path,
            mode: Mode::Discard,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the captured content still goes to the client.
    pub fn emits(&self) -> bool {
        matches!(self.mode, Mode::Emit(_))
    }

    /// Persist `content` as the entry and return what the client should receive.
    ///
    /// The raw content is stored; the pending transform, if any, only shapes the
    /// returned bytes. A stale refresh returns an empty body.
    pub async fn store(self, content: Bytes) -> Result<Bytes, CacheError> {
        let Self { key, path, mode } = self;

        let target = key.clone();
        let written = content.clone();
        tokio::task::spawn_blocking(move || write_atomic(target, &path, &written))
            .await
            .map_err(|err| {
                CacheError::storage(key.clone(), "cache write task aborted", io::Error::other(err))
            })??;

        debug!(cache = "file", key = %key, bytes = content.len(), "stored cache entry");

        Ok(match mode {
            Mode::Emit(Some(transform)) => transform(content),
            Mode::Emit(None) => content,
            Mode::Discard => Bytes::new(),
        })
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("emits", &self.emits())
            .finish()
    }
}

/// Write through a temporary file in the entry's directory and rename it into
/// place, so readers never see a partially written entry.
fn write_atomic(key: CacheKey, path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let Some(dir) = path.parent() else {
        return Err(CacheError::storage(
            key,
            "cache entry has no parent directory",
            io::Error::from(io::ErrorKind::InvalidInput),
        ));
    };

    if let Err(err) = std::fs::create_dir_all(dir) {
        return Err(CacheError::storage(
            key,
            "cache directory could not be prepared",
            err,
        ));
    }

    let result = NamedTempFile::new_in(dir).and_then(|mut tmp| {
        tmp.write_all(content)?;
        tmp.as_file().sync_data()?;
        set_entry_permissions(&tmp)?;
        tmp.persist(path).map(|_| ()).map_err(|err| err.error)
    });

    result.map_err(|err| CacheError::storage(key, "cache file write failed", err))
}

/// Temp files are created owner-only; entries are widened to the usual
/// world-readable mode before they are renamed into place.
#[cfg(unix)]
fn set_entry_permissions(tmp: &NamedTempFile) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(ENTRY_MODE))
}

#[cfg(not(unix))]
fn set_entry_permissions(_tmp: &NamedTempFile) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    fn entry_path(root: &Path, key: &CacheKey) -> PathBuf {
        root.join(key.relative_path())
    }

    #[tokio::test]
    async fn emit_without_transform_returns_content() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/page");
        let path = entry_path(dir.path(), &key);

        let capture = Capture::emit(key, path.clone(), None);
        assert!(capture.emits());

        let emitted = capture
            .store(Bytes::from_static(b"hello"))
            .await
            .expect("store succeeds");
        assert_eq!(emitted, Bytes::from_static(b"hello"));
        assert_eq!(std::fs::read(&path).expect("entry exists"), b"hello");
    }

    #[tokio::test]
    async fn emit_applies_transform_but_stores_raw_content() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/upper");
        let path = entry_path(dir.path(), &key);
        let transform: Transform =
            Arc::new(|content: Bytes| Bytes::from(content.to_ascii_uppercase()));

        let emitted = Capture::emit(key, path.clone(), Some(transform))
            .store(Bytes::from_static(b"hello"))
            .await
            .expect("store succeeds");

        assert_eq!(emitted, Bytes::from_static(b"HELLO"));
        assert_eq!(std::fs::read(&path).expect("entry exists"), b"hello");
    }

    #[tokio::test]
    async fn discard_stores_and_returns_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/stale");
        let path = entry_path(dir.path(), &key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"old").unwrap();

        let capture = Capture::discard(key, path.clone());
        assert!(!capture.emits());

        let emitted = capture
            .store(Bytes::from_static(b"new"))
            .await
            .expect("store succeeds");
        assert!(emitted.is_empty());
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn empty_content_is_a_valid_entry() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/empty");
        let path = entry_path(dir.path(), &key);

        let emitted = Capture::emit(key, path.clone(), None)
            .store(Bytes::new())
            .await
            .expect("empty writes succeed");
        assert!(emitted.is_empty());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn blocked_directory_is_a_storage_error() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/blocked");
        // A regular file where the fan-out directory should go.
        std::fs::write(dir.path().join(key.fan_out()), b"").unwrap();
        let path = entry_path(dir.path(), &key);

        let error = Capture::emit(key.clone(), path, None)
            .store(Bytes::from_static(b"hello"))
            .await
            .expect_err("directory cannot be created");

        match error {
            CacheError::Storage {
                key: failed, reason, ..
            } => {
                assert_eq!(failed, key);
                assert_eq!(reason, "cache directory could not be prepared");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn no_temporary_files_are_left_behind() {
        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/tidy");
        let path = entry_path(dir.path(), &key);

        for body in ["one", "two", "three"] {
            Capture::emit(key.clone(), path.clone(), None)
                .store(Bytes::from(body))
                .await
                .expect("store succeeds");
        }

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), b"three");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn entries_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let key = CacheKey::from_input("example.com/mode");
        let path = entry_path(dir.path(), &key);

        Capture::emit(key, path.clone(), None)
            .store(Bytes::from_static(b"hello"))
            .await
            .expect("store succeeds");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, ENTRY_MODE);
    }
}
