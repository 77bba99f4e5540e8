//! File-backed implementations of the platform traits.
//!
//! [`FileBackend`] keeps one file per row inside a profile directory and
//! replaces rows with a write-to-temp-then-rename sequence, so a crash
//! mid-write never leaves a half-written row visible. [`FileKeystore`] holds the
//! device key in a `0600`-mode file; it is the development/native fallback
//! for hosts without a hardware keystore and is not device-bound the way
//! Keychain or Android Keystore keys are.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};

use crate::error::{StoreError, StoreResult};

use super::{keystore_open, keystore_seal, DeviceKeystore, KeyValueBackend};

const ROW_EXTENSION: &str = "bin";
const DEVICE_KEY_FILENAME: &str = "device_key.bin";

fn unavailable(context: &str, err: &std::io::Error) -> StoreError {
    StoreError::StorageUnavailable(format!("{context}: {err}"))
}

/// Key-value backend storing each row as a file under a profile directory.
///
/// Row names are hex-encoded into file names, so arbitrary storage keys
/// (including `:` separators) stay filesystem-safe and reversible.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Opens a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageUnavailable`] if the directory cannot be
    /// created.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| unavailable("create profile directory", &err))?;
        Ok(Self { root })
    }

    fn row_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{ROW_EXTENSION}", hex::encode(name.as_bytes())))
    }
}

impl KeyValueBackend for FileBackend {
    fn read(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.row_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(unavailable("read row", &err)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.row_path(name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|err| unavailable("write row", &err))?;
        fs::rename(&tmp, &path).map_err(|err| unavailable("commit row", &err))
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        match fs::remove_file(self.row_path(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(unavailable("delete row", &err)),
        }
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.row_path(name).is_file())
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        let entries =
            fs::read_dir(&self.root).map_err(|err| unavailable("list profile directory", &err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| unavailable("list profile directory", &err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ROW_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            // Skip files that were not written by this backend.
            let Ok(raw) = hex::decode(stem) else {
                continue;
            };
            if let Ok(name) = String::from_utf8(raw) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn clear(&self) -> StoreResult<()> {
        for name in self.names()? {
            self.delete(&name)?;
        }
        Ok(())
    }
}

/// Device keystore holding its key in a file inside the profile directory.
///
/// The key file is created with `0600` permissions on Unix. Unlike a
/// hardware keystore the key material is readable by the owning user, which
/// is why this implementation is meant for development and native fallback
/// deployments only.
pub struct FileKeystore {
    key: [u8; 32],
}

impl FileKeystore {
    /// Loads the device key from `dir`, generating and persisting a fresh
    /// one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Keystore`] if the key file cannot be read or
    /// created, or holds material of the wrong length.
    pub fn new(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(DEVICE_KEY_FILENAME);
        match fs::read(&path) {
            Ok(bytes) => {
                let key: [u8; 32] = bytes.try_into().map_err(|_| {
                    StoreError::Keystore("device key file has wrong length".to_string())
                })?;
                Ok(Self { key })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                write_key_file(&path, &key)?;
                Ok(Self { key })
            }
            Err(err) => Err(StoreError::Keystore(format!("read device key: {err}"))),
        }
    }
}

fn write_key_file(path: &Path, key: &[u8; 32]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| StoreError::Keystore(format!("create key directory: {err}")))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, key).map_err(|err| StoreError::Keystore(format!("write device key: {err}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
            .map_err(|err| StoreError::Keystore(format!("restrict device key: {err}")))?;
    }
    fs::rename(&tmp, path).map_err(|err| StoreError::Keystore(format!("commit device key: {err}")))
}

impl DeviceKeystore for FileKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        keystore_seal(&self.key, associated_data, plaintext)
    }

    fn open(&self, associated_data: &[u8], ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        keystore_open(&self.key, associated_data, ciphertext)
    }
}
