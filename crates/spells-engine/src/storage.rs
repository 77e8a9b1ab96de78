//! Filesystem storage backends.
//!
//! - [`FileStorage`]: the primary store, one file per key, written
//!   atomically (temp file + rename)
//! - [`CookieJarStorage`]: the secondary store, a single JSON jar of
//!   expiring name/value entries

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spells_gameplay::{StorageBackend, StorageError, StorageResult};

/// Rejects keys that would escape the store directory.
fn check_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidData(format!("invalid storage key {key:?}")))
    }
}

/// Writes `data` to `path` through a temp file and a rename.
fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Primary store: one file per key under a base directory.
#[derive(Debug)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Creates a file store rooted at `base_path`.
    #[must_use]
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Gets the full path for a key.
    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(key)?;
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(Some(data))
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        let path = self.key_path(key);
        write_atomic(&path, data)?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// One cookie in the jar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    /// Stored value
    pub value: String,
    /// Expiry as seconds since the Unix epoch
    pub expires_at: u64,
}

/// Secondary store: a cookie jar file of expiring entries.
///
/// Entries past their expiry read as missing and are pruned on the next
/// write.
#[derive(Debug)]
pub struct CookieJarStorage {
    path: PathBuf,
    max_age: Duration,
    lock: Mutex<()>,
}

impl CookieJarStorage {
    /// Creates a jar stored at `path` whose entries live for `max_age`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, max_age: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_age,
            lock: Mutex::new(()),
        }
    }

    /// Path of the jar file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }

    fn load_jar(&self) -> StorageResult<BTreeMap<String, CookieEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StorageError::InvalidData(format!("cookie jar: {e}")))
    }

    /// Loads the jar for an update. A corrupt jar is replaced rather than
    /// blocking every later write.
    fn load_jar_for_update(&self) -> StorageResult<BTreeMap<String, CookieEntry>> {
        match self.load_jar() {
            Err(StorageError::InvalidData(reason)) => {
                warn!("Discarding unreadable cookie jar {}: {}", self.path.display(), reason);
                Ok(BTreeMap::new())
            },
            other => other,
        }
    }

    fn store_jar(&self, jar: &BTreeMap<String, CookieEntry>) -> StorageResult<()> {
        let text = serde_json::to_string_pretty(jar)
            .map_err(|e| StorageError::InvalidData(format!("cookie jar: {e}")))?;
        write_atomic(&self.path, text.as_bytes())
    }
}

impl StorageBackend for CookieJarStorage {
    fn name(&self) -> &str {
        "cookie jar"
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(key)?;
        let _guard = self.lock.lock();
        let jar = self.load_jar()?;
        let now = Self::now_secs();
        Ok(jar
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone().into_bytes()))
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        let value = std::str::from_utf8(data)
            .map_err(|e| StorageError::InvalidData(format!("cookie value is not UTF-8: {e}")))?
            .to_string();

        let _guard = self.lock.lock();
        let now = Self::now_secs();
        let mut jar = self.load_jar_for_update()?;
        jar.retain(|_, entry| entry.expires_at > now);
        jar.insert(
            key.to_string(),
            CookieEntry {
                value,
                expires_at: now.saturating_add(self.max_age.as_secs()),
            },
        );
        self.store_jar(&jar)?;
        debug!("Set cookie {} ({} bytes)", key, data.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        let _guard = self.lock.lock();
        let mut jar = self.load_jar_for_update()?;
        if jar.remove(key).is_some() {
            self.store_jar(&jar)?;
        }
        Ok(())
    }
}
