//! Key-value persistence port.
//!
//! Engines persist their state as text under fixed keys through the
//! [`KeyValueStore`] trait. Two backends are provided:
//! - [`MemoryStore`] keeps everything in process (tests, ephemeral runs)
//! - [`FileStore`] keeps one JSON file per key with file locking

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Key of the in-progress session snapshot
pub const SESSION_KEY: &str = "workout-progress";
/// Key of the user's progression state
pub const PROGRESSION_KEY: &str = "user-progress";
/// Key of the workout catalog
pub const CATALOG_KEY: &str = "workout-data";

/// Durable string storage consumed by the engines
///
/// Values are stored and returned verbatim; the store never interprets them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Write `new` only if the stored value still equals `expected`
    /// (`None` meaning "absent"). Returns whether the write happened.
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool>;
}

/// Store shared between engines
pub type SharedStore = Arc<dyn KeyValueStore>;

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to simulate a full or read-only disk
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail, to simulate an unreadable disk
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("store is not writable".into()));
        }
        Ok(())
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("store is not readable".into()));
        }
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.entries().remove(key);
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        self.check_writable()?;
        let mut entries = self.entries();
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Directory-backed store: `<dir>/<key>.json`, guarded by `<dir>/<key>.lock`
///
/// Every operation on a key holds an advisory lock on the sidecar file, so
/// several processes can share one data directory. Writes go through a temp
/// file and an atomic rename.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", key))
    }

    fn validate_key(key: &str) -> Result<()> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(Error::Storage(format!("invalid key '{}'", key)))
        }
    }

    /// Open (creating if needed) the lock sidecar for `key`
    fn open_lock(&self, key: &str) -> Result<File> {
        Self::validate_key(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path_for(key))?;
        Ok(file)
    }

    fn read_unlocked(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(Some(contents))
    }

    fn write_unlocked(&self, key: &str, value: &str) -> Result<()> {
        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(self.path_for(key))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let lock = self.open_lock(key)?;
        lock.lock_shared()?;
        let result = self.read_unlocked(key);
        lock.unlock()?;
        result
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let lock = self.open_lock(key)?;
        lock.lock_exclusive()?;
        let result = self.write_unlocked(key, value);
        lock.unlock()?;
        tracing::debug!("Stored {} ({} bytes)", key, value.len());
        result
    }

    fn remove(&self, key: &str) -> Result<()> {
        let lock = self.open_lock(key)?;
        lock.lock_exclusive()?;
        let result = match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        lock.unlock()?;
        tracing::debug!("Removed {}", key);
        result
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let lock = self.open_lock(key)?;
        lock.lock_exclusive()?;
        let result = self.read_unlocked(key).and_then(|current| {
            if current.as_deref() != expected {
                return Ok(false);
            }
            self.write_unlocked(key, new)?;
            Ok(true)
        });
        lock.unlock()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v1".into()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_compare_and_swap() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("k", None, "a").unwrap());
        assert!(!store.compare_and_swap("k", None, "b").unwrap());
        assert!(!store.compare_and_swap("k", Some("x"), "b").unwrap());
        assert!(store.compare_and_swap("k", Some("a"), "b").unwrap());
        assert_eq!(store.get("k").unwrap(), Some("b".into()));
    }

    #[test]
    fn test_memory_store_write_failures() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.set_fail_writes(true);

        assert!(store.set("k", "w").is_err());
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_memory_store_read_failures() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.set_fail_reads(true);

        assert!(matches!(store.get("k"), Err(Error::Storage(_))));
        store.set_fail_reads(false);
        assert_eq!(store.get("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("data"));

        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        store.set(SESSION_KEY, r#"{"a":1}"#).unwrap();
        assert_eq!(store.get(SESSION_KEY).unwrap(), Some(r#"{"a":1}"#.into()));
        assert!(store.path_for(SESSION_KEY).exists());

        store.remove(SESSION_KEY).unwrap();
        assert_eq!(store.get(SESSION_KEY).unwrap(), None);

        // Removing twice is fine
        store.remove(SESSION_KEY).unwrap();
    }

    #[test]
    fn test_file_store_compare_and_swap() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(store.compare_and_swap(PROGRESSION_KEY, None, "1").unwrap());
        assert!(!store.compare_and_swap(PROGRESSION_KEY, None, "2").unwrap());
        assert!(store
            .compare_and_swap(PROGRESSION_KEY, Some("1"), "2")
            .unwrap());
        assert_eq!(store.get(PROGRESSION_KEY).unwrap(), Some("2".into()));
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(matches!(store.get("../escape"), Err(Error::Storage(_))));
        assert!(matches!(store.set("", "v"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.set(CATALOG_KEY, "{}").unwrap();
        store.set(CATALOG_KEY, "{}").unwrap();

        let mut names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["workout-data.json", "workout-data.lock"]);
    }
}
