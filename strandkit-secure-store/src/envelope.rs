//! Store key envelope persistence helpers.
//!
//! The envelope is the only durable representation of the value key: the key
//! material itself is sealed by the device keystore, and the envelope wraps
//! the sealed bytes together with scheme metadata so a future format change
//! is detected instead of silently misread.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

const ENVELOPE_VERSION: u32 = 1;
const ENVELOPE_CIPHER: &str = "chacha20poly1305";

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct StoreKeyEnvelope {
    pub(crate) version: u32,
    pub(crate) cipher: String,
    pub(crate) wrapped_value_key: Vec<u8>,
    pub(crate) created_at: u64,
    pub(crate) updated_at: u64,
}

impl StoreKeyEnvelope {
    pub(crate) fn new(wrapped_value_key: Vec<u8>, now: u64) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            cipher: ENVELOPE_CIPHER.to_string(),
            wrapped_value_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn serialize(&self) -> StoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(bytes)
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> StoreResult<Self> {
        let envelope: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(StoreError::UnsupportedEnvelopeVersion(envelope.version));
        }
        if envelope.cipher != ENVELOPE_CIPHER {
            return Err(StoreError::InvalidEnvelope(format!(
                "unknown cipher: {}",
                envelope.cipher
            )));
        }
        Ok(envelope)
    }
}
