//! In-memory store implementations for unit testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{PreferenceStore, SecretStore};

/// In-memory PreferenceStore implementation for unit testing.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set_str(&self, key: &str, value: Option<&str>) {
        let mut entries = self.entries.write().unwrap();
        match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };
    }
}

/// In-memory SecretStore implementation for unit testing.
///
/// `fail_writes(true)` makes every mutation return
/// `StoreError::Unavailable`, simulating a keychain that became unreadable
/// (device lock removed mid-operation).
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, String>>,
    binary: RwLock<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated write failure.
    pub fn fail_writes(&self, fail: bool) {
        self.failing.store(fail, Ordering::Relaxed);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("simulated failure".into()))
        } else {
            Ok(())
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<&str>) -> StoreResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().unwrap();
        match value {
            Some(v) => entries.insert(key.to_string(), v.to_string()),
            None => entries.remove(key),
        };
        Ok(())
    }

    fn get_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.binary.read().unwrap().get(key).cloned())
    }

    fn set_bytes(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()> {
        self.check_available()?;
        let mut binary = self.binary.write().unwrap();
        match value {
            Some(v) => binary.insert(key.to_string(), v.to_vec()),
            None => binary.remove(key),
        };
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_available()?;
        self.entries.write().unwrap().clear();
        self.binary.write().unwrap().clear();
        Ok(())
    }
}
