//! Encrypted record format for stored values.
//!
//! One JSON record per logical storage key, persisted under the
//! `value:`-prefixed row name. Nonce and ciphertext are base64 text so the
//! record stays a plain-text row in string-typed backends.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::NONCE_SIZE;
use crate::error::{StoreError, StoreResult};

const RECORD_VERSION: u32 = 1;

pub(crate) const VALUE_ROW_PREFIX: &str = "value:";

/// Returns the backend row name for a logical storage key.
pub(crate) fn value_row_name(key: &str) -> String {
    format!("{VALUE_ROW_PREFIX}{key}")
}

/// Current time as unix seconds, `0` if the clock is unset.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[derive(Serialize, Deserialize)]
pub(crate) struct EncryptedRecord {
    pub(crate) v: u32,
    pub(crate) nonce: String,
    pub(crate) ciphertext: String,
    pub(crate) updated_at: u64,
}

impl EncryptedRecord {
    pub(crate) fn new(nonce: &[u8; NONCE_SIZE], ciphertext: &[u8], updated_at: u64) -> Self {
        Self {
            v: RECORD_VERSION,
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            updated_at,
        }
    }

    pub(crate) fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| StoreError::Serialization(err.to_string()))
    }

    /// Decodes a persisted record row.
    ///
    /// Any structural defect (malformed JSON, an unknown record version, a
    /// nonce of the wrong size, broken base64) is a corruption error; the
    /// store reacts by deleting the row.
    pub(crate) fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let record: Self = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        if record.v != RECORD_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported record version: {}",
                record.v
            )));
        }
        Ok(record)
    }

    pub(crate) fn nonce_bytes(&self) -> StoreResult<[u8; NONCE_SIZE]> {
        let raw = BASE64
            .decode(&self.nonce)
            .map_err(|err| StoreError::Serialization(format!("nonce: {err}")))?;
        raw.try_into()
            .map_err(|_| StoreError::Serialization("nonce has wrong length".to_string()))
    }

    pub(crate) fn ciphertext_bytes(&self) -> StoreResult<Vec<u8>> {
        BASE64
            .decode(&self.ciphertext)
            .map_err(|err| StoreError::Serialization(format!("ciphertext: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let nonce = [7u8; NONCE_SIZE];
        let record = EncryptedRecord::new(&nonce, b"opaque bytes", 1_700_000_000);
        let bytes = record.encode().expect("encode");
        let decoded = EncryptedRecord::decode(&bytes).expect("decode");
        assert_eq!(decoded.v, RECORD_VERSION);
        assert_eq!(decoded.nonce_bytes().expect("nonce"), nonce);
        assert_eq!(
            decoded.ciphertext_bytes().expect("ciphertext"),
            b"opaque bytes"
        );
        assert_eq!(decoded.updated_at, 1_700_000_000);
    }

    #[test]
    fn test_record_is_json_text() {
        let record = EncryptedRecord::new(&[0u8; NONCE_SIZE], b"ct", 1);
        let bytes = record.encode().expect("encode");
        let text = std::str::from_utf8(&bytes).expect("utf8");
        assert!(text.contains("\"nonce\""));
        assert!(text.contains("\"ciphertext\""));
    }

    #[test]
    fn test_record_unknown_version_is_rejected() {
        let mut record = EncryptedRecord::new(&[0u8; NONCE_SIZE], b"ct", 1);
        record.v = RECORD_VERSION + 3;
        let bytes = record.encode().expect("encode");
        assert!(EncryptedRecord::decode(&bytes).is_err());
    }

    #[test]
    fn test_record_bad_nonce_length_is_rejected() {
        let mut record = EncryptedRecord::new(&[0u8; NONCE_SIZE], b"ct", 1);
        record.nonce = BASE64.encode(b"short");
        assert!(record.nonce_bytes().is_err());
    }

    #[test]
    fn test_record_malformed_json_is_rejected() {
        assert!(EncryptedRecord::decode(b"{not json").is_err());
    }

    #[test]
    fn test_value_row_name_prefix() {
        assert_eq!(value_row_name("cart"), "value:cart");
    }
}
