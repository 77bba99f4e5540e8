//! In-memory implementations of the platform traits.
//!
//! [`MemoryKeystore`] performs real AEAD under a process-local key, so
//! tamper-detection behavior matches production keystores, but the key lives
//! in plain process memory and dies with it. [`MemoryBackend`] is a
//! `HashMap` behind a lock. Both are intended for tests and ephemeral
//! profiles, not durable production storage.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::{rngs::OsRng, RngCore};

use crate::error::{StoreError, StoreResult};

use super::{keystore_open, keystore_seal, DeviceKeystore, KeyValueBackend};

/// In-memory device keystore sealing under a random process-local key.
///
/// Each instance generates its own device key, so two instances cannot open
/// each other's seals — the same isolation a per-device hardware keystore
/// provides.
pub struct MemoryKeystore {
    key: [u8; 32],
}

impl MemoryKeystore {
    /// Creates a keystore with a freshly generated device key.
    #[must_use]
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceKeystore for MemoryKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        keystore_seal(&self.key, associated_data, plaintext)
    }

    fn open(&self, associated_data: &[u8], ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        keystore_open(&self.key, associated_data, ciphertext)
    }
}

/// In-memory key-value backend backed by a `HashMap`.
///
/// Thread-safe; rows are replaced atomically under the write lock.
pub struct MemoryBackend {
    rows: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored rows.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Returns `true` if no rows are stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().unwrap().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?;
        Ok(rows.get(name).cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        self.rows
            .write()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.rows
            .write()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?
            .remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?;
        Ok(rows.contains_key(name))
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?;
        Ok(rows.keys().cloned().collect())
    }

    fn clear(&self) -> StoreResult<()> {
        self.rows
            .write()
            .map_err(|_| StoreError::StorageUnavailable("lock poisoned".to_string()))?
            .clear();
        Ok(())
    }
}
