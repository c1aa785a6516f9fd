//! JSON-file-backed store implementations.
//!
//! Each store keeps its full contents in memory behind a mutex and rewrites
//! the whole file on mutation. The secret store commits to memory only after
//! the file write succeeded, so a failed write leaves both the caller's view
//! and the in-memory map at their pre-call value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::{PreferenceStore, SecretStore};

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ── Preference store ────────────────────────────────────────────────────

/// Plaintext preferences persisted as a JSON object.
pub struct FilePreferenceStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    /// Open or create the preference file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let entries = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        // Preference writes are best-effort: a lost setting degrades UX,
        // never security. Failures are logged, not surfaced.
        match serde_json::to_vec_pretty(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!("Preference write failed: {e}");
                }
            }
            Err(e) => tracing::warn!("Preference serialization failed: {e}"),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get_str(&self, key: &str) -> Option<String> {
        lock_unpoisoned(&self.entries).get(key).cloned()
    }

    fn set_str(&self, key: &str, value: Option<&str>) {
        let mut entries = lock_unpoisoned(&self.entries);
        match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };
        self.flush(&entries);
    }
}

// ── Secret store ────────────────────────────────────────────────────────

#[derive(Default, Serialize, Deserialize)]
struct SecretFile {
    entries: BTreeMap<String, String>,
    /// Byte entries, base64-encoded.
    binary: BTreeMap<String, String>,
}

/// Secret entries persisted as a JSON file.
///
/// Development/test stand-in for a platform keychain — see the
/// [`SecretStore`] platform contract.
pub struct FileSecretStore {
    path: PathBuf,
    contents: Mutex<SecretFile>,
}

impl FileSecretStore {
    /// Open or create the secret file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let contents = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SecretFile::default(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        Ok(Self {
            path: path.to_path_buf(),
            contents: Mutex::new(contents),
        })
    }

    fn write_file(&self, contents: &SecretFile) -> StoreResult<()> {
        let json =
            serde_json::to_vec(contents).map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Apply `mutate` to a scratch copy, persist it, then commit to memory.
    fn mutate<F>(&self, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut SecretFile),
    {
        let mut guard = lock_unpoisoned(&self.contents);
        let mut scratch = SecretFile {
            entries: guard.entries.clone(),
            binary: guard.binary.clone(),
        };
        mutate(&mut scratch);
        self.write_file(&scratch)?;
        *guard = scratch;
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(lock_unpoisoned(&self.contents).entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<&str>) -> StoreResult<()> {
        self.mutate(|file| {
            match value {
                Some(v) => file.entries.insert(key.to_string(), v.to_string()),
                None => file.entries.remove(key),
            };
        })
    }

    fn get_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let guard = lock_unpoisoned(&self.contents);
        match guard.binary.get(key) {
            Some(encoded) => BASE64
                .decode(encoded)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn set_bytes(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()> {
        self.mutate(|file| {
            match value {
                Some(v) => file.binary.insert(key.to_string(), BASE64.encode(v)),
                None => file.binary.remove(key),
            };
        })
    }

    fn clear(&self) -> StoreResult<()> {
        self.mutate(|file| {
            file.entries.clear();
            file.binary.clear();
        })
    }
}
