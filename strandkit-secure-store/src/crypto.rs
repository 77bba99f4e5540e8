//! Value-encryption key and AEAD operations for stored records.
//!
//! Records are encrypted with ChaCha20-Poly1305 under a single 256-bit
//! value key. The storage key name is bound as associated data, so a record
//! copied under another name fails authentication on read.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{StoreError, StoreResult};

/// Nonce length in bytes (96 bits, one fresh nonce per write).
pub const NONCE_SIZE: usize = 12;

const VALUE_AD_PREFIX: &[u8] = b"strandkit:value:";

/// The active value-encryption key.
///
/// The raw bits are deliberately unreachable through the public API: the
/// only operations a holder can perform are [`encrypt`](Self::encrypt) and
/// [`decrypt`](Self::decrypt). The material is zeroized on drop and never
/// appears in `Debug` output. Persistence goes through the device keystore
/// as a wrapped envelope, never as plaintext.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ValueKey([u8; 32]);

impl ValueKey {
    /// Generates a fresh random key.
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Rehydrates a key unwrapped from the persisted envelope.
    pub(crate) const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Exposes the raw material so the custodian can wrap it for
    /// persistence. Crate-internal; callers outside the custodian never see
    /// key bits.
    pub(crate) const fn for_wrapping(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypts `plaintext` for the record stored under `storage_key`.
    ///
    /// Returns the fresh nonce alongside the ciphertext (which carries the
    /// authentication tag).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encryption`] if the AEAD operation fails.
    pub fn encrypt(
        &self,
        storage_key: &str,
        plaintext: &[u8],
    ) -> StoreResult<([u8; NONCE_SIZE], Vec<u8>)> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.0));
        let nonce_bytes = generate_nonce();
        let aad = value_associated_data(storage_key);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|err| StoreError::Encryption(err.to_string()))?;
        Ok((nonce_bytes, ciphertext))
    }

    /// Decrypts the record stored under `storage_key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decryption`] if authentication fails: the
    /// ciphertext or nonce was tampered with, the record was written under a
    /// different storage key, or it was encrypted with another key.
    pub fn decrypt(
        &self,
        storage_key: &str,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
    ) -> StoreResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.0));
        let aad = value_associated_data(storage_key);
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|err| StoreError::Decryption(err.to_string()))
    }
}

impl std::fmt::Debug for ValueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn value_associated_data(storage_key: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(VALUE_AD_PREFIX.len() + storage_key.len());
    aad.extend_from_slice(VALUE_AD_PREFIX);
    aad.extend_from_slice(storage_key.as_bytes());
    aad
}

fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = ValueKey::generate();
        let (nonce, ciphertext) = key.encrypt("cart", b"two bundles").expect("encrypt");
        assert_ne!(&ciphertext[..b"two bundles".len()], b"two bundles");
        // Poly1305 tag adds 16 bytes.
        assert_eq!(ciphertext.len(), b"two bundles".len() + 16);

        let plaintext = key.decrypt("cart", &nonce, &ciphertext).expect("decrypt");
        assert_eq!(plaintext, b"two bundles");
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let key = ValueKey::generate();
        let (nonce, mut ciphertext) = key.encrypt("cart", b"payload").expect("encrypt");
        ciphertext[0] ^= 0xFF;
        assert!(matches!(
            key.decrypt("cart", &nonce, &ciphertext),
            Err(StoreError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_nonce_fails_authentication() {
        let key = ValueKey::generate();
        let (mut nonce, ciphertext) = key.encrypt("cart", b"payload").expect("encrypt");
        nonce[0] ^= 0x01;
        assert!(key.decrypt("cart", &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_storage_key_is_bound_as_associated_data() {
        let key = ValueKey::generate();
        let (nonce, ciphertext) = key.encrypt("cart", b"payload").expect("encrypt");
        assert!(key.decrypt("session", &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_different_keys_cannot_decrypt() {
        let first = ValueKey::generate();
        let second = ValueKey::generate();
        let (nonce, ciphertext) = first.encrypt("cart", b"payload").expect("encrypt");
        assert!(second.decrypt("cart", &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_nonces_are_unique_across_writes() {
        let key = ValueKey::generate();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let (nonce, _) = key.encrypt("cart", b"payload").expect("encrypt");
            assert!(seen.insert(nonce), "nonce repeated");
        }
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let key = ValueKey::generate();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("0x"));
    }
}
