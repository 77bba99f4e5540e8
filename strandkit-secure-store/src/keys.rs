//! Key custody for the encrypted store.
//!
//! Exactly one value key exists per profile. The custodian creates it lazily
//! on first use, persists it only as a device-keystore-wrapped envelope
//! under a fixed singleton row, and hands out shared [`ValueKey`] handles.
//! Creation runs under an async mutex, so concurrent first-callers await
//! the same in-flight creation instead of racing to persist duplicate keys.

use std::sync::Arc;

use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::crypto::ValueKey;
use crate::envelope::StoreKeyEnvelope;
use crate::error::{StoreError, StoreResult};
use crate::platform::{DeviceKeystore, KeyValueBackend};
use crate::record::unix_now;

pub(crate) const KEY_ENVELOPE_ROW: &str = "store_keys.bin";
const KEY_ENVELOPE_AD: &[u8] = b"strandkit:store-key-envelope";

/// Supplies the single value-encryption key for a profile.
///
/// Construct one per profile at the composition root and share it (via
/// `Arc`) with every [`EncryptedStore`] that uses the same backend.
///
/// [`EncryptedStore`]: crate::EncryptedStore
pub struct KeyCustodian {
    keystore: Arc<dyn DeviceKeystore>,
    backend: Arc<dyn KeyValueBackend>,
    active: Mutex<Option<Arc<ValueKey>>>,
}

impl KeyCustodian {
    /// Creates a custodian over the given keystore and persistence backend.
    #[must_use]
    pub fn new(keystore: Arc<dyn DeviceKeystore>, backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            keystore,
            backend,
            active: Mutex::new(None),
        }
    }

    /// Returns the active value key, creating and persisting it on first
    /// use.
    ///
    /// All callers receive handles to the same key; concurrent first calls
    /// resolve to a single persisted envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the backend cannot be
    /// read or written, [`StoreError::Keystore`] if the device keystore
    /// refuses to seal or open, and [`StoreError::InvalidEnvelope`] or
    /// [`StoreError::UnsupportedEnvelopeVersion`] if the persisted envelope
    /// is malformed. Encryption callers must treat any of these as fatal;
    /// there is no plaintext fallback.
    pub async fn get_or_create(&self) -> StoreResult<Arc<ValueKey>> {
        let mut slot = self.active.lock().await;
        if let Some(key) = slot.as_ref() {
            return Ok(Arc::clone(key));
        }

        let key = match self.backend.read(KEY_ENVELOPE_ROW)? {
            Some(bytes) => {
                let envelope = StoreKeyEnvelope::deserialize(&bytes)?;
                let raw = Zeroizing::new(
                    self.keystore
                        .open(KEY_ENVELOPE_AD, &envelope.wrapped_value_key)?,
                );
                Arc::new(ValueKey::from_bytes(parse_key_32(&raw)?))
            }
            None => {
                let key = ValueKey::generate();
                let wrapped = self.keystore.seal(KEY_ENVELOPE_AD, key.for_wrapping())?;
                let envelope = StoreKeyEnvelope::new(wrapped, unix_now());
                self.backend
                    .write_atomic(KEY_ENVELOPE_ROW, &envelope.serialize()?)?;
                log::debug!("created value key envelope");
                Arc::new(key)
            }
        };

        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Drops the cached key handle and deletes the persisted envelope.
    ///
    /// Part of `full_reset`: the next `get_or_create` mints a fresh key, and
    /// everything encrypted under the old one is unrecoverable.
    pub(crate) async fn reset(&self) -> StoreResult<()> {
        let mut slot = self.active.lock().await;
        *slot = None;
        self.backend.delete(KEY_ENVELOPE_ROW)
    }
}

fn parse_key_32(bytes: &[u8]) -> StoreResult<[u8; 32]> {
    if bytes.len() != 32 {
        return Err(StoreError::InvalidEnvelope(format!(
            "value key length mismatch: expected 32, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(out)
}
