//! Storage abstraction for save data.
//!
//! This module provides:
//! - StorageBackend trait for key-value save stores
//! - MemoryStorage, an in-process backend that can be made to fail
//! - DualStore, which writes to a primary and a secondary store and reads
//!   from whichever still has usable data

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Backend not available.
    #[error("Storage backend not available: {0}")]
    Unavailable(String),

    /// Every store failed.
    #[error("All stores failed: primary: {primary}; secondary: {secondary}")]
    AllStoresFailed {
        /// Primary store failure
        primary: String,
        /// Secondary store failure
        secondary: String,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A key-value store for save data.
pub trait StorageBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Reads a value. `Ok(None)` means the key is not stored.
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes a value, replacing any previous one.
    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Deletes a value. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryStorage {
    name: String,
    entries: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: Mutex<bool>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Makes every operation fail (or succeed again), as when the host
    /// blocks or clears a storage partition.
    pub fn set_available(&self, available: bool) {
        *self.unavailable.lock() = !available;
    }

    /// Drops every stored value.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Overwrites a value directly, bypassing availability.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.entries.lock().insert(key.to_string(), data.into());
    }

    fn check(&self) -> StorageResult<()> {
        if *self.unavailable.lock() {
            return Err(StorageError::Unavailable(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("name", &self.name)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.check()?;
        self.entries.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Which store of a [`DualStore`] served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    /// Durable key-value store
    Primary,
    /// Cookie-like fallback store
    Secondary,
}

/// Outcome of writing to both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualWrite {
    /// Primary store accepted the write
    pub primary: bool,
    /// Secondary store accepted the write
    pub secondary: bool,
}

/// Primary store with a secondary fallback.
#[derive(Clone)]
pub struct DualStore {
    primary: Arc<dyn StorageBackend>,
    secondary: Arc<dyn StorageBackend>,
}

impl fmt::Debug for DualStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualStore")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

impl DualStore {
    /// Creates a dual store.
    #[must_use]
    pub fn new(primary: Arc<dyn StorageBackend>, secondary: Arc<dyn StorageBackend>) -> Self {
        Self { primary, secondary }
    }

    /// Returns the store for a role.
    #[must_use]
    pub fn store(&self, role: StoreRole) -> &dyn StorageBackend {
        match role {
            StoreRole::Primary => self.primary.as_ref(),
            StoreRole::Secondary => self.secondary.as_ref(),
        }
    }

    /// Writes to both stores. Fails only if both fail.
    pub fn write(&self, key: &str, data: &[u8]) -> StorageResult<DualWrite> {
        let primary = self.primary.write(key, data);
        let secondary = self.secondary.write(key, data);

        if let Err(e) = &primary {
            warn!("Primary store {} write failed: {}", self.primary.name(), e);
        }
        if let Err(e) = &secondary {
            warn!("Secondary store {} write failed: {}", self.secondary.name(), e);
        }

        match (primary, secondary) {
            (Err(p), Err(s)) => Err(StorageError::AllStoresFailed {
                primary: p.to_string(),
                secondary: s.to_string(),
            }),
            (p, s) => Ok(DualWrite {
                primary: p.is_ok(),
                secondary: s.is_ok(),
            }),
        }
    }

    /// Reads a key, trying the primary first.
    ///
    /// `parse` is applied to the raw bytes; a store whose value does not
    /// parse is treated like an empty one and the next store is tried.
    /// Returns `Ok(None)` if neither store has usable data.
    pub fn read_with<T, E, F>(&self, key: &str, mut parse: F) -> StorageResult<Option<(StoreRole, T)>>
    where
        F: FnMut(&[u8]) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut failures = Vec::new();
        for role in [StoreRole::Primary, StoreRole::Secondary] {
            let store = self.store(role);
            match store.read(key) {
                Ok(Some(bytes)) => match parse(&bytes) {
                    Ok(value) => {
                        debug!("Read {} from {:?} store {}", key, role, store.name());
                        return Ok(Some((role, value)));
                    }
                    Err(e) => {
                        warn!("{:?} store {} holds unusable data for {}: {}", role, store.name(), key, e);
                    }
                },
                Ok(None) => debug!("{:?} store {} has no {}", role, store.name(), key),
                Err(e) => {
                    warn!("{:?} store {} read failed: {}", role, store.name(), e);
                    failures.push(e.to_string());
                }
            }
        }

        if let [primary, secondary] = failures.as_slice() {
            return Err(StorageError::AllStoresFailed {
                primary: primary.clone(),
                secondary: secondary.clone(),
            });
        }
        Ok(None)
    }

    /// Deletes the key from both stores.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let primary = self.primary.delete(key);
        let secondary = self.secondary.delete(key);
        primary.and(secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (Arc<MemoryStorage>, Arc<MemoryStorage>, DualStore) {
        let primary = Arc::new(MemoryStorage::new("local"));
        let secondary = Arc::new(MemoryStorage::new("cookie"));
        let dual = DualStore::new(primary.clone(), secondary.clone());
        (primary, secondary, dual)
    }

    fn utf8(bytes: &[u8]) -> Result<String, std::str::Utf8Error> {
        std::str::from_utf8(bytes).map(str::to_string)
    }

    #[test]
    fn test_write_reaches_both_stores() {
        let (primary, secondary, dual) = stores();
        let outcome = dual.write("save", b"hello").expect("write");
        assert!(outcome.primary && outcome.secondary);
        assert_eq!(primary.read("save").expect("read"), Some(b"hello".to_vec()));
        assert_eq!(secondary.read("save").expect("read"), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_write_survives_one_failure() {
        let (primary, _, dual) = stores();
        primary.set_available(false);
        let outcome = dual.write("save", b"hello").expect("write");
        assert!(!outcome.primary);
        assert!(outcome.secondary);
    }

    #[test]
    fn test_write_fails_when_both_fail() {
        let (primary, secondary, dual) = stores();
        primary.set_available(false);
        secondary.set_available(false);
        assert!(matches!(
            dual.write("save", b"x"),
            Err(StorageError::AllStoresFailed { .. })
        ));
    }

    #[test]
    fn test_read_prefers_primary() {
        let (primary, secondary, dual) = stores();
        primary.insert("save", "new");
        secondary.insert("save", "old");
        let (role, value) = dual.read_with("save", utf8).expect("read").expect("value");
        assert_eq!(role, StoreRole::Primary);
        assert_eq!(value, "new");
    }

    #[test]
    fn test_read_falls_back_when_primary_cleared() {
        let (primary, _, dual) = stores();
        dual.write("save", b"data").expect("write");
        primary.clear();
        let (role, value) = dual.read_with("save", utf8).expect("read").expect("value");
        assert_eq!(role, StoreRole::Secondary);
        assert_eq!(value, "data");
    }

    #[test]
    fn test_read_falls_back_when_primary_throws_or_is_garbage() {
        let (primary, secondary, dual) = stores();
        secondary.insert("save", "good");

        primary.insert("save", vec![0xff, 0xfe]);
        let (role, _) = dual.read_with("save", utf8).expect("read").expect("value");
        assert_eq!(role, StoreRole::Secondary);

        primary.set_available(false);
        let (role, _) = dual.read_with("save", utf8).expect("read").expect("value");
        assert_eq!(role, StoreRole::Secondary);
    }

    #[test]
    fn test_read_nothing_stored() {
        let (_, _, dual) = stores();
        assert!(dual.read_with("save", utf8).expect("read").is_none());
    }

    #[test]
    fn test_read_both_unavailable_is_error() {
        let (primary, secondary, dual) = stores();
        primary.set_available(false);
        secondary.set_available(false);
        assert!(dual.read_with("save", utf8).is_err());
    }
}
