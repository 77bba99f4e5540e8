//! Password hashing and verification for the offline/demo sign-in path.
//!
//! Derivation is PBKDF2-HMAC-SHA-256 with a per-credential random salt and
//! a deliberately high iteration count: on the order of one second of work
//! on commodity hardware, expensive enough to make offline brute force
//! impractical while keeping interactive login usable. Verification
//! re-derives and compares in constant time.
//!
//! This module exists to support the storefront's offline/demo
//! authentication mode. Production deployments must verify credentials
//! server-side; a client-side hash must never be the sole line of defense.

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Salt length in bytes. Unique per credential.
pub const SALT_SIZE: usize = 16;

/// Derived digest length in bytes.
pub const HASH_SIZE: usize = 32;

/// Default PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 310_000;

/// A derived password hash with the salt it was derived under.
///
/// Never stores or transmits the password in reversible form.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    /// The PBKDF2 digest.
    pub hash: [u8; HASH_SIZE],
    /// The random salt used for derivation.
    pub salt: [u8; SALT_SIZE],
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("hash", &"[REDACTED]")
            .field("salt", &hex::encode(self.salt))
            .finish()
    }
}

/// Hashes `password` with the default iteration count.
///
/// Generates a fresh random salt when none is supplied; pass the stored
/// salt to re-derive an existing credential.
#[must_use]
pub fn hash_password(password: &str, salt: Option<[u8; SALT_SIZE]>) -> PasswordHash {
    hash_password_with_iterations(password, salt, PBKDF2_ITERATIONS)
}

/// Hashes `password` with an explicit iteration count.
///
/// The count must match between hashing and verification. Lower counts are
/// for tests only; real credentials use [`PBKDF2_ITERATIONS`].
#[must_use]
pub fn hash_password_with_iterations(
    password: &str,
    salt: Option<[u8; SALT_SIZE]>,
    iterations: u32,
) -> PasswordHash {
    let salt = salt.unwrap_or_else(generate_salt);
    let mut hash = [0u8; HASH_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);
    PasswordHash { hash, salt }
}

/// Verifies `password` against a stored hash and salt using the default
/// iteration count.
///
/// The comparison is constant time: it does not short-circuit on the first
/// differing byte, so timing reveals nothing about where the digests
/// diverge.
#[must_use]
pub fn verify_password(
    password: &str,
    expected_hash: &[u8; HASH_SIZE],
    salt: &[u8; SALT_SIZE],
) -> bool {
    verify_password_with_iterations(password, expected_hash, salt, PBKDF2_ITERATIONS)
}

/// Verifies `password` with an explicit iteration count.
#[must_use]
pub fn verify_password_with_iterations(
    password: &str,
    expected_hash: &[u8; HASH_SIZE],
    salt: &[u8; SALT_SIZE],
    iterations: u32,
) -> bool {
    let derived = hash_password_with_iterations(password, Some(*salt), iterations);
    derived.hash.ct_eq(expected_hash).into()
}

fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}
