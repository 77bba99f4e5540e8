//! Error types for the encrypted store components.

use thiserror::Error;

/// Result type for encrypted store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the encrypted storage primitives.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistent backend could not be opened, read, or written.
    ///
    /// Fatal for the calling operation; there is no automatic retry and no
    /// plaintext fallback.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Errors coming from the device keystore.
    #[error("keystore error: {0}")]
    Keystore(String),

    /// Value encryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Value decryption failed (authentication failure or corrupted
    /// ciphertext).
    ///
    /// Never escapes [`EncryptedStore::get_item`]; the corrupt record is
    /// deleted and the read resolves to "not found".
    ///
    /// [`EncryptedStore::get_item`]: crate::EncryptedStore::get_item
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or malformed store key envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The persisted key envelope was written by an unknown scheme version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedEnvelopeVersion(u32),
}
