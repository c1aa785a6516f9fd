use crate::error::StoreResult;

/// Non-secret settings storage (auto-lock policy, biometric mode,
/// first-launch flag). No confidentiality guarantee; reads are infallible
/// and a missing key is simply `None`.
pub trait PreferenceStore: Send + Sync {
    fn get_str(&self, key: &str) -> Option<String>;

    /// `None` removes the key.
    fn set_str(&self, key: &str, value: Option<&str>);

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_str(key).and_then(|v| v.parse().ok())
    }

    fn set_bool(&self, key: &str, value: Option<bool>) {
        match value {
            Some(v) => self.set_str(key, Some(if v { "true" } else { "false" })),
            None => self.set_str(key, None),
        }
    }
}

/// Protected storage for credential material and the lockout record.
///
/// Platform contract for production implementations: entries must become
/// unreadable and unwritable once the OS device lock is removed, and must
/// never be restored from a backup onto another device. The file-backed
/// implementation in this crate is a development/test stand-in and carries
/// neither guarantee.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `None` removes the key.
    fn set(&self, key: &str, value: Option<&str>) -> StoreResult<()>;

    fn get_bytes(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn set_bytes(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()>;

    /// Remove every entry.
    fn clear(&self) -> StoreResult<()>;
}
