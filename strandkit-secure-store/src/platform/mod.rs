//! Platform interfaces for the encrypted store.
//!
//! The store is platform-agnostic. Everything that touches the host
//! environment sits behind two traits supplied through constructor
//! injection:
//!
//! - [`DeviceKeystore`] — non-exportable device-bound encryption used to
//!   wrap the value key
//! - [`KeyValueBackend`] — named-row persistence for encrypted records and
//!   the key envelope
//!
//! # Platform Implementations
//!
//! Hosts should provide hardware-backed keystores where available:
//!
//! - iOS: Keychain Services with `kSecAttrAccessibleWhenUnlockedThisDeviceOnly`
//! - Android: Android Keystore with hardware-backed keys
//! - Browser: `WebCrypto` with non-extractable keys in `IndexedDB`
//! - Native/dev: [`fs::FileKeystore`] (file-backed key, less secure)
//!
//! For persistence, any facility with per-row atomic writes works:
//! `IndexedDB` in the browser, app-container files elsewhere. The crate
//! ships [`fs::FileBackend`] (atomic rename) and [`memory::MemoryBackend`]
//! (tests).

pub mod fs;
pub mod memory;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{StoreError, StoreResult};

const KEYSTORE_NONCE_SIZE: usize = 12;

/// Seals `plaintext` under `key` with a fresh random nonce prepended to the
/// returned payload. Shared by the software keystore implementations.
pub(crate) fn keystore_seal(
    key: &[u8; 32],
    associated_data: &[u8],
    plaintext: &[u8],
) -> StoreResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce_bytes = [0u8; KEYSTORE_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|err| StoreError::Keystore(err.to_string()))?;
    let mut out = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Opens a payload produced by [`keystore_seal`], verifying the nonce prefix
/// and associated data.
pub(crate) fn keystore_open(
    key: &[u8; 32],
    associated_data: &[u8],
    ciphertext: &[u8],
) -> StoreResult<Vec<u8>> {
    if ciphertext.len() < KEYSTORE_NONCE_SIZE {
        return Err(StoreError::Keystore("sealed payload too short".to_string()));
    }
    let (nonce_bytes, payload) = ciphertext.split_at(KEYSTORE_NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: payload,
                aad: associated_data,
            },
        )
        .map_err(|err| StoreError::Keystore(err.to_string()))
}

/// Device-protected encryption used to wrap the value key.
///
/// # Security Requirements
///
/// - The device key MUST be non-exportable when the platform supports it.
/// - The key MUST be bound to the device (not transferable via
///   backup/restore).
/// - Implementations MUST use authenticated encryption (AEAD).
///
/// The `associated_data` parameter provides domain separation; it is not
/// encrypted but MUST be covered by the authentication tag, so any mismatch
/// when opening fails.
pub trait DeviceKeystore: Send + Sync {
    /// Seals plaintext under the device-bound key, authenticating
    /// `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore refuses the operation or the seal
    /// fails.
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StoreResult<Vec<u8>>;

    /// Opens ciphertext under the device-bound key, verifying
    /// `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the keystore cannot open.
    fn open(&self, associated_data: &[u8], ciphertext: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Named-row persistence for encrypted records and the key envelope.
///
/// Rows are opaque byte blobs addressed by a string name. The store relies
/// on per-row atomicity only; it never requires cross-row transactions.
pub trait KeyValueBackend: Send + Sync {
    /// Reads the row named `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the read fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes `bytes` atomically to the row named `name`, replacing any
    /// previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the write fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Deletes the row named `name`. Deleting an absent row is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the delete fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// Returns whether a row named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the check fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Lists the names of all rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the listing fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn names(&self) -> StoreResult<Vec<String>>;

    /// Deletes every row, including the key envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the clear fails.
    ///
    /// [`StoreError::StorageUnavailable`]: crate::StoreError::StorageUnavailable
    fn clear(&self) -> StoreResult<()>;
}
