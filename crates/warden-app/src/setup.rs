//! Composition root helpers: store construction and platform stand-ins.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use warden_core::config::{AppConfig, FIRST_LAUNCH_KEY};
use warden_core::{
    BiometricCapability, BiometricProvider, DeviceAuthError, DeviceOwnerAuth, SystemClock,
};
use warden_session::center::CenterDeps;
use warden_session::SecurityCenter;
use warden_store::file::{FilePreferenceStore, FileSecretStore};
use warden_store::{PreferenceStore, SecretStore};

pub fn data_dir(config: &AppConfig) -> PathBuf {
    PathBuf::from(&config.storage.data_dir)
}

/// Desktop harness has no biometric hardware binding; the platform shell on
/// mobile injects the real provider.
struct NoBiometrics;

#[async_trait]
impl BiometricProvider for NoBiometrics {
    async fn probe(&self) -> BiometricCapability {
        BiometricCapability::None
    }

    async fn evaluate(&self, _reason: &str) -> bool {
        false
    }
}

/// Desktop stand-in: the OS account login gate is assumed present.
struct DesktopDeviceAuth;

impl DeviceOwnerAuth for DesktopDeviceAuth {
    fn can_authenticate(&self) -> Result<bool, DeviceAuthError> {
        Ok(true)
    }
}

/// Build the fully wired security center from file-backed stores.
pub fn build_center(config: &AppConfig) -> Result<SecurityCenter> {
    let dir = data_dir(config);
    std::fs::create_dir_all(&dir)?;

    let prefs: Arc<dyn PreferenceStore> =
        Arc::new(FilePreferenceStore::open(&dir.join("prefs.json"))?);
    let secret: Arc<dyn SecretStore> =
        Arc::new(FileSecretStore::open(&dir.join("secrets.json"))?);

    // A keychain can outlive the app's own data (reinstall). If this is the
    // first launch, wipe stale secret entries — best-effort cleanup only.
    if prefs.get_bool(FIRST_LAUNCH_KEY) != Some(true) {
        if let Err(e) = secret.clear() {
            tracing::warn!("First-launch secret wipe failed: {e}");
        }
        prefs.set_bool(FIRST_LAUNCH_KEY, Some(true));
    }

    let wipe_target = secret.clone();
    let center = SecurityCenter::new(CenterDeps {
        prefs,
        secret,
        clock: Arc::new(SystemClock::new()),
        biometrics: Arc::new(NoBiometrics),
        device_auth: Arc::new(DesktopDeviceAuth),
        on_trust_lost: Box::new(move || {
            if let Err(e) = wipe_target.clear() {
                tracing::warn!("Protected-state invalidation failed: {e}");
            }
        }),
        credential_len: config.unlock.credential_len,
    })?;
    Ok(center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::config::StorageConfig;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            storage: StorageConfig {
                data_dir: dir.join("warden").to_string_lossy().into_owned(),
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn first_launch_wipes_stale_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        // Simulate a keychain that survived a reinstall: secrets exist but
        // the first-launch flag does not.
        std::fs::create_dir_all(data_dir(&config)).unwrap();
        let secret = FileSecretStore::open(&data_dir(&config).join("secrets.json")).unwrap();
        secret.set("credential.levels", Some("123456")).unwrap();
        drop(secret);

        let center = build_center(&config).unwrap();
        assert!(!center.is_primary_set());
    }

    #[tokio::test]
    async fn second_launch_preserves_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        {
            let mut center = build_center(&config).unwrap();
            center.set_primary_credential("123456").unwrap();
        }
        let center = build_center(&config).unwrap();
        assert!(center.is_primary_set());
    }
}
