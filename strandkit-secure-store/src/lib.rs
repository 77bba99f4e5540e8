//! Encrypted client-side storage primitives for the Strandkit storefront.
//!
//! This crate implements the storefront's local persistence core: session,
//! user, cart, and order state is stored encrypted at rest so casual
//! inspection of the profile and script-injection token theft both come up
//! empty. Four pieces cooperate:
//!
//! 1. **Key custody** ([`KeyCustodian`]) — exactly one 256-bit value key
//!    per profile, created lazily, persisted only as a device-keystore
//!    wrapped envelope, and handed out as a handle whose raw bits no caller
//!    can read.
//! 2. **Encrypted store** ([`EncryptedStore`]) — asynchronous key-value
//!    storage of JSON-serializable values; each write is authenticated
//!    encryption under a fresh nonce, each corrupt read self-heals by
//!    deleting the record.
//! 3. **Credential hashing** ([`password`]) — slow, salted PBKDF2 digests
//!    with constant-time verification for the offline/demo sign-in path.
//! 4. **Legacy migration** ([`LegacyMigrator`]) — one-time, best-effort
//!    re-encryption of data written under the retired plain-device-key
//!    scheme.
//!
//! # Platform Integration
//!
//! All host capabilities are injected through the [`platform`] traits:
//! [`platform::DeviceKeystore`] for non-exportable key wrapping and
//! [`platform::KeyValueBackend`] for row persistence. In-memory and
//! file-backed implementations ship with the crate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use strandkit_secure_store::platform::memory::{MemoryBackend, MemoryKeystore};
//! use strandkit_secure_store::platform::{DeviceKeystore, KeyValueBackend};
//! use strandkit_secure_store::{EncryptedStore, KeyCustodian, StoreResult};
//!
//! # fn main() -> StoreResult<()> {
//! # tokio_test::block_on(async {
//! let backend: Arc<dyn KeyValueBackend> = Arc::new(MemoryBackend::new());
//! let keystore: Arc<dyn DeviceKeystore> = Arc::new(MemoryKeystore::new());
//! let custodian = Arc::new(KeyCustodian::new(keystore, Arc::clone(&backend)));
//! let store = EncryptedStore::new(backend, custodian);
//!
//! store.set_item("cart", &vec!["bundle-16in", "bundle-20in"]).await?;
//! let cart: Option<Vec<String>> = store.get_item("cart").await?;
//! assert_eq!(cart.unwrap().len(), 2);
//! # Ok(())
//! # })
//! # }
//! ```

mod crypto;
mod envelope;
mod error;
mod keys;
mod migration;
pub mod password;
pub mod platform;
mod record;
mod store;

pub use crypto::{ValueKey, NONCE_SIZE};
pub use error::{StoreError, StoreResult};
pub use keys::KeyCustodian;
pub use migration::{LegacyMigrator, MigrationReport};
pub use store::EncryptedStore;
