//! One-time migration from the legacy device-key storage scheme.
//!
//! The predecessor scheme kept an extractable device key as base64 text in
//! plain accessible storage and encrypted each value under a record key
//! derived from it by SHA-256. That derivation is carried here solely to
//! read existing legacy data; the new scheme never reuses it.
//!
//! Migration runs once per profile: launch re-checks for the device-key
//! marker row and short-circuits to complete when it is absent. While the
//! marker exists, each known legacy key is read, decrypted under the legacy
//! scheme, re-encrypted through the [`EncryptedStore`], and its legacy row
//! deleted. A corrupt entry is discarded and migration continues with the
//! next key. Finally the marker itself is deleted, permanently closing the
//! migration path.
//!
//! Failures are non-fatal throughout: the application must start even when
//! migration partially or fully fails, since refusing to start is worse
//! than losing pre-migration data that was already weakly protected.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::platform::KeyValueBackend;
use crate::store::EncryptedStore;

pub(crate) const LEGACY_DEVICE_KEY_ROW: &str = "legacy_device_key";

const LEGACY_NONCE_SIZE: usize = 12;

/// Outcome counters for a migration pass.
///
/// Informational only; the pass itself never fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy records successfully re-encrypted into the store.
    pub migrated: usize,
    /// Legacy records discarded because they could not be recovered.
    pub discarded: usize,
}

/// Best-effort upgrader from the legacy plain-device-key scheme.
pub struct LegacyMigrator {
    legacy: Arc<dyn KeyValueBackend>,
    store: Arc<EncryptedStore>,
}

impl LegacyMigrator {
    /// Creates a migrator reading legacy rows from `legacy` and writing
    /// recovered values through `store`.
    #[must_use]
    pub const fn new(legacy: Arc<dyn KeyValueBackend>, store: Arc<EncryptedStore>) -> Self {
        Self { legacy, store }
    }

    /// Attempts to migrate the given legacy storage keys.
    ///
    /// Never fails: per-key errors are logged, counted as discarded, and do
    /// not block the remaining keys. Running again after completion is a
    /// no-op because the device-key marker no longer exists.
    pub async fn migrate_from_legacy(&self, keys: &[&str]) -> MigrationReport {
        let mut report = MigrationReport::default();

        let marker = match self.legacy.read(LEGACY_DEVICE_KEY_ROW) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return report,
            Err(err) => {
                log::warn!("legacy migration skipped, marker unreadable: {err}");
                return report;
            }
        };

        match legacy_record_key(&marker) {
            Ok(record_key) => {
                for key in keys {
                    match self.migrate_one(&record_key, key).await {
                        Ok(true) => report.migrated += 1,
                        Ok(false) => {}
                        Err(err) => {
                            log::warn!("discarding legacy record '{key}': {err}");
                            self.delete_quietly(key);
                            report.discarded += 1;
                        }
                    }
                }
            }
            Err(err) => {
                log::warn!("legacy device key unreadable, abandoning legacy data: {err}");
            }
        }

        // Deleting the marker closes the migration path for good.
        self.delete_quietly(LEGACY_DEVICE_KEY_ROW);
        log::debug!(
            "legacy migration complete: {} migrated, {} discarded",
            report.migrated,
            report.discarded
        );
        report
    }

    async fn migrate_one(&self, record_key: &[u8; 32], key: &str) -> StoreResult<bool> {
        let Some(payload) = self.legacy.read(key)? else {
            return Ok(false);
        };
        let plaintext = legacy_open(record_key, &payload)?;
        let value: serde_json::Value = serde_json::from_slice(&plaintext)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.store.set_item(key, &value).await?;
        self.legacy.delete(key)?;
        Ok(true)
    }

    fn delete_quietly(&self, name: &str) {
        if let Err(err) = self.legacy.delete(name) {
            log::warn!("failed to delete legacy row '{name}': {err}");
        }
    }
}

/// Derives the legacy record key from the marker row contents.
///
/// Legacy compatibility only; the marker holds the extractable device key
/// as base64 text and the record key is its SHA-256 digest.
fn legacy_record_key(marker: &[u8]) -> StoreResult<[u8; 32]> {
    let text = std::str::from_utf8(marker)
        .map_err(|err| StoreError::Serialization(format!("legacy device key: {err}")))?;
    let device_key = BASE64
        .decode(text.trim())
        .map_err(|err| StoreError::Serialization(format!("legacy device key: {err}")))?;
    Ok(Sha256::digest(&device_key).into())
}

fn legacy_open(record_key: &[u8; 32], payload: &[u8]) -> StoreResult<Vec<u8>> {
    let text = std::str::from_utf8(payload)
        .map_err(|err| StoreError::Serialization(format!("legacy payload: {err}")))?;
    let raw = BASE64
        .decode(text.trim())
        .map_err(|err| StoreError::Serialization(format!("legacy payload: {err}")))?;
    if raw.len() < LEGACY_NONCE_SIZE {
        return Err(StoreError::Decryption("legacy payload too short".to_string()));
    }
    let (nonce, ciphertext) = raw.split_at(LEGACY_NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(record_key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|err| StoreError::Decryption(format!("legacy record: {err}")))
}
