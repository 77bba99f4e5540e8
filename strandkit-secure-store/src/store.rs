//! Encrypted key-value store over a pluggable persistence backend.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crypto::ValueKey;
use crate::error::{StoreError, StoreResult};
use crate::keys::KeyCustodian;
use crate::platform::KeyValueBackend;
use crate::record::{unix_now, value_row_name, EncryptedRecord, VALUE_ROW_PREFIX};

/// Durable, encrypted, asynchronous key-value storage for JSON-serializable
/// values.
///
/// Every value is serialized to JSON text and encrypted with a fresh random
/// nonce under the profile's single value key before it touches the
/// backend. Reads are symmetric and transparent; a record that fails
/// authentication or decoding is deleted and reported as absent, so callers
/// re-fetch or re-create instead of getting stuck on unreadable state.
///
/// Two concurrent writes to the same key race at the backend with
/// last-write-wins semantics; serializing writers is the caller's
/// responsibility.
pub struct EncryptedStore {
    backend: Arc<dyn KeyValueBackend>,
    custodian: Arc<KeyCustodian>,
}

// The storage surface is uniformly async even though the shipped backends
// complete synchronously, and futures are not required to be Send so that
// single-threaded hosts can pass non-Sync values.
#[allow(clippy::unused_async, clippy::future_not_send)]
impl EncryptedStore {
    /// Creates a store over the given backend and key custodian.
    ///
    /// The custodian must be constructed over the same backend so
    /// [`full_reset`](Self::full_reset) destroys the key envelope together
    /// with the records.
    #[must_use]
    pub const fn new(backend: Arc<dyn KeyValueBackend>, custodian: Arc<KeyCustodian>) -> Self {
        Self { backend, custodian }
    }

    /// Encrypts and stores `value` under `key`, replacing any prior record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the value cannot be
    /// serialized, [`StoreError::Encryption`] if the cryptographic
    /// operation fails, and [`StoreError::StorageUnavailable`] (or a
    /// key-custody error) if the persistent layer cannot be written. Write
    /// failures always propagate; a dropped write would otherwise be
    /// silent.
    pub async fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let text =
            serde_json::to_string(value).map_err(|err| StoreError::Serialization(err.to_string()))?;
        let value_key = self.custodian.get_or_create().await?;
        let (nonce, ciphertext) = value_key.encrypt(key, text.as_bytes())?;
        let record = EncryptedRecord::new(&nonce, &ciphertext, unix_now());
        self.backend
            .write_atomic(&value_row_name(key), &record.encode()?)
    }

    /// Reads and decrypts the value stored under `key`.
    ///
    /// Returns `Ok(None)` when no record exists. A record that fails
    /// decryption or deserialization (tampered bytes, a wrong key epoch, a
    /// malformed row) is deleted as a side effect and also reported as
    /// `Ok(None)`: callers never receive a record that failed its
    /// integrity check.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backend cannot be read or the value
    /// key cannot be obtained; corruption is self-healed, not surfaced.
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let row = value_row_name(key);
        let Some(bytes) = self.backend.read(&row)? else {
            return Ok(None);
        };
        let value_key = self.custodian.get_or_create().await?;
        match Self::open_record(&value_key, key, &bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log::warn!("deleting corrupt record for '{key}': {err}");
                if let Err(delete_err) = self.backend.delete(&row) {
                    log::warn!("failed to delete corrupt record for '{key}': {delete_err}");
                }
                Ok(None)
            }
        }
    }

    /// Deletes the record for `key`. Deleting an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the backend delete
    /// fails.
    pub async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.backend.delete(&value_row_name(key))
    }

    /// Returns whether a record exists for `key`, without decrypting it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the backend check
    /// fails.
    pub async fn has_item(&self, key: &str) -> StoreResult<bool> {
        self.backend.exists(&value_row_name(key))
    }

    /// Deletes every stored value but preserves the key envelope.
    ///
    /// Used for bulk logout/reset flows where previously unseen keys should
    /// still decrypt after re-population.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the backend cannot be
    /// listed or written.
    pub async fn clear_values(&self) -> StoreResult<()> {
        for name in self.backend.names()? {
            if name.starts_with(VALUE_ROW_PREFIX) {
                self.backend.delete(&name)?;
            }
        }
        Ok(())
    }

    /// Deletes the entire store, including the value key.
    ///
    /// Irreversible by construction: everything encrypted under the old key
    /// becomes permanently unrecoverable, and the next write mints a fresh
    /// key. Deliberately a distinct operation from
    /// [`clear_values`](Self::clear_values) so the key cannot be destroyed
    /// by accident.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the backend cannot be
    /// cleared.
    pub async fn full_reset(&self) -> StoreResult<()> {
        self.backend.clear()?;
        self.custodian.reset().await
    }

    fn open_record<T: DeserializeOwned>(
        value_key: &ValueKey,
        key: &str,
        bytes: &[u8],
    ) -> StoreResult<T> {
        let record = EncryptedRecord::decode(bytes)?;
        let nonce = record.nonce_bytes()?;
        let plaintext = value_key.decrypt(key, &nonce, &record.ciphertext_bytes()?)?;
        serde_json::from_slice(&plaintext).map_err(|err| StoreError::Serialization(err.to_string()))
    }
}
