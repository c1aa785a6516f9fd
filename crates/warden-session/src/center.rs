//! The composition surface of the security core.
//!
//! One `SecurityCenter` owns every component, wires them together with
//! explicit dependency passing, and exposes the observable properties and
//! commands the presentation layer consumes. Nothing in the core reaches
//! into ambient global state.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};

use warden_auth::{
    AuthError, AuthResult, CredentialVault, DeviceTrust, DeviceTrustMonitor, LockoutGuard,
    LockoutState,
};
use warden_core::config::{AutoLockPolicy, BiometricMode, BIOMETRIC_MODE_KEY};
use warden_core::{
    AuthEvent, BiometricProvider, Clock, DeviceOwnerAuth, LifecycleEvent,
};
use warden_store::{PreferenceStore, SecretStore};

use crate::coordinator::{AuthenticationCoordinator, BiometricAffordance};
use crate::session::SessionLock;
use crate::strategy::AppUnlock;

/// Everything the center needs from the platform shell.
pub struct CenterDeps {
    pub prefs: Arc<dyn PreferenceStore>,
    pub secret: Arc<dyn SecretStore>,
    pub clock: Arc<dyn Clock>,
    pub biometrics: Arc<dyn BiometricProvider>,
    pub device_auth: Arc<dyn DeviceOwnerAuth>,
    /// Erases cached sensitive state when device trust is lost.
    pub on_trust_lost: Box<dyn Fn() + Send + Sync>,
    pub credential_len: usize,
}

pub struct SecurityCenter {
    vault: Arc<Mutex<CredentialVault>>,
    lockout: LockoutGuard,
    session: Arc<Mutex<SessionLock>>,
    trust: DeviceTrustMonitor,
    prefs: Arc<dyn PreferenceStore>,
    unlock: AuthenticationCoordinator,
    events_rx: Option<mpsc::UnboundedReceiver<AuthEvent>>,
    credential_len: usize,
}

impl SecurityCenter {
    pub fn new(deps: CenterDeps) -> AuthResult<Self> {
        let vault = CredentialVault::load(deps.secret.clone(), deps.prefs.clone())?;
        let primary_rx = vault.watch_primary_set();
        let vault = Arc::new(Mutex::new(vault));

        let lockout = LockoutGuard::load(deps.secret, deps.clock.clone())?;
        let session = Arc::new(Mutex::new(SessionLock::new(
            deps.prefs.clone(),
            deps.clock,
            primary_rx,
        )));
        let trust = DeviceTrustMonitor::new(deps.device_auth, deps.on_trust_lost);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let unlock = AuthenticationCoordinator::new(
            vault.clone(),
            lockout.clone(),
            session.clone(),
            deps.biometrics,
            deps.prefs.clone(),
            Box::new(AppUnlock),
            events_tx,
            deps.credential_len,
        );

        Ok(Self {
            vault,
            lockout,
            session,
            trust,
            prefs: deps.prefs,
            unlock,
            events_rx: Some(events_rx),
            credential_len: deps.credential_len,
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        lock_unpoisoned(&self.session).handle(event);
        if event == LifecycleEvent::WillEnterForeground {
            self.trust.resolve();
        }
    }

    /// Begin a fresh unlock presentation on the app-level coordinator.
    pub async fn present_unlock(&mut self) {
        self.unlock.present().await;
    }

    // ── Unlock commands ─────────────────────────────────────────────────

    pub fn submit_credential(&mut self, candidate: &str) -> AuthResult<()> {
        self.unlock.submit_credential(candidate)
    }

    pub async fn request_biometric_unlock(&mut self) -> AuthResult<()> {
        self.unlock.request_biometric_unlock().await
    }

    // ── Settings commands ───────────────────────────────────────────────

    pub fn set_primary_credential(&mut self, candidate: &str) -> AuthResult<()> {
        self.check_shape(candidate)?;
        lock_unpoisoned(&self.vault).set_primary(candidate)?;
        self.unlock.refresh_affordance();
        Ok(())
    }

    pub fn remove_primary_credential(&mut self) -> AuthResult<()> {
        lock_unpoisoned(&self.vault).remove_primary()?;
        self.unlock.refresh_affordance();
        Ok(())
    }

    pub fn set_duress_credential(&mut self, candidate: &str) -> AuthResult<()> {
        self.check_shape(candidate)?;
        lock_unpoisoned(&self.vault).set_duress(candidate)
    }

    pub fn remove_duress_credential(&mut self) -> AuthResult<()> {
        lock_unpoisoned(&self.vault).remove_duress()
    }

    pub fn set_auto_lock_policy(&mut self, policy: AutoLockPolicy) {
        lock_unpoisoned(&self.session).set_policy(policy);
    }

    /// Enabling biometrics without a primary credential is an invalid
    /// security state and is rejected.
    pub fn set_biometric_mode(&mut self, mode: BiometricMode) -> AuthResult<()> {
        if mode.is_enabled() && !lock_unpoisoned(&self.vault).is_primary_set() {
            return Err(AuthError::NoCredential);
        }
        self.prefs
            .set_str(BIOMETRIC_MODE_KEY, Some(mode.as_token()));
        self.unlock.refresh_affordance();
        Ok(())
    }

    pub fn biometric_mode(&self) -> BiometricMode {
        self.prefs
            .get_str(BIOMETRIC_MODE_KEY)
            .and_then(|t| BiometricMode::from_token(&t))
            .unwrap_or_default()
    }

    // ── Observables ─────────────────────────────────────────────────────

    pub fn watch_locked(&self) -> watch::Receiver<bool> {
        lock_unpoisoned(&self.session).watch_locked()
    }

    pub fn is_locked(&self) -> bool {
        lock_unpoisoned(&self.session).is_locked()
    }

    pub fn watch_lockout(&self) -> watch::Receiver<LockoutState> {
        self.lockout.watch()
    }

    pub fn lockout_state(&self) -> LockoutState {
        self.lockout.state()
    }

    pub fn watch_affordance(&self) -> watch::Receiver<BiometricAffordance> {
        self.unlock.watch_affordance()
    }

    pub fn watch_primary_set(&self) -> watch::Receiver<bool> {
        lock_unpoisoned(&self.vault).watch_primary_set()
    }

    pub fn is_primary_set(&self) -> bool {
        lock_unpoisoned(&self.vault).is_primary_set()
    }

    pub fn watch_duress_set(&self) -> watch::Receiver<bool> {
        lock_unpoisoned(&self.vault).watch_duress_set()
    }

    pub fn is_duress_set(&self) -> bool {
        lock_unpoisoned(&self.vault).is_duress_set()
    }

    pub fn watch_auto_lock_policy(&self) -> watch::Receiver<AutoLockPolicy> {
        lock_unpoisoned(&self.session).watch_policy()
    }

    pub fn auto_lock_policy(&self) -> AutoLockPolicy {
        lock_unpoisoned(&self.session).policy()
    }

    pub fn watch_device_trust(&self) -> watch::Receiver<DeviceTrust> {
        self.trust.watch()
    }

    pub fn device_trust(&self) -> DeviceTrust {
        self.trust.state()
    }

    /// One-shot authentication events. Takeable once.
    pub fn take_auth_events(&mut self) -> Option<mpsc::UnboundedReceiver<AuthEvent>> {
        self.events_rx.take()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn check_shape(&self, candidate: &str) -> AuthResult<()> {
        if candidate.len() != self.credential_len
            || !candidate.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AuthError::MalformedCredential {
                expected: self.credential_len,
            });
        }
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use warden_core::{BiometricCapability, DeviceAuthError, ManualClock};
    use warden_store::memory::{MemoryPreferenceStore, MemorySecretStore};

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

    struct SwitchableDeviceAuth {
        locked_device: std::sync::atomic::AtomicBool,
    }

    impl DeviceOwnerAuth for SwitchableDeviceAuth {
        fn can_authenticate(&self) -> Result<bool, DeviceAuthError> {
            if self.locked_device.load(Ordering::Relaxed) {
                Ok(true)
            } else {
                Err(DeviceAuthError::NoDeviceLock)
            }
        }
    }

    fn center() -> (SecurityCenter, Arc<ManualClock>, Arc<SwitchableDeviceAuth>, Arc<AtomicU32>) {
        let clock = Arc::new(ManualClock::new());
        let device_auth = Arc::new(SwitchableDeviceAuth {
            locked_device: std::sync::atomic::AtomicBool::new(true),
        });
        let wiped = Arc::new(AtomicU32::new(0));
        let wiped_hook = wiped.clone();
        let center = SecurityCenter::new(CenterDeps {
            prefs: Arc::new(MemoryPreferenceStore::new()),
            secret: Arc::new(MemorySecretStore::new()),
            clock: clock.clone(),
            biometrics: Arc::new(NoBiometrics),
            device_auth: device_auth.clone(),
            on_trust_lost: Box::new(move || {
                wiped_hook.fetch_add(1, Ordering::Relaxed);
            }),
            credential_len: 6,
        })
        .unwrap();
        (center, clock, device_auth, wiped)
    }

    #[tokio::test]
    async fn end_to_end_lock_and_unlock() {
        let (mut center, clock, _, _) = center();
        center.set_primary_credential("123456").unwrap();
        center.set_auto_lock_policy(AutoLockPolicy::OneMinute);

        center.handle_lifecycle(LifecycleEvent::EnteredBackground);
        clock.advance(std::time::Duration::from_secs(90));
        center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
        assert!(center.is_locked());

        center.submit_credential("123456").unwrap();
        assert!(!center.is_locked());
    }

    #[tokio::test]
    async fn malformed_credential_rejected_in_settings() {
        let (mut center, _, _, _) = center();
        assert!(matches!(
            center.set_primary_credential("12"),
            Err(AuthError::MalformedCredential { expected: 6 })
        ));
        assert!(matches!(
            center.set_duress_credential("abcdef"),
            Err(AuthError::MalformedCredential { expected: 6 })
        ));
    }

    #[tokio::test]
    async fn biometrics_refused_without_primary() {
        let (mut center, _, _, _) = center();
        assert!(matches!(
            center.set_biometric_mode(BiometricMode::Automatic),
            Err(AuthError::NoCredential)
        ));
        center.set_primary_credential("123456").unwrap();
        center.set_biometric_mode(BiometricMode::Automatic).unwrap();
        assert_eq!(center.biometric_mode(), BiometricMode::Automatic);
    }

    #[tokio::test]
    async fn trust_loss_on_foreground_wipes_once() {
        let (mut center, _, device_auth, wiped) = center();
        center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
        assert_eq!(center.device_trust(), DeviceTrust::Trusted);

        device_auth.locked_device.store(false, Ordering::Relaxed);
        center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
        center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
        assert_eq!(center.device_trust(), DeviceTrust::Untrusted);
        assert_eq!(wiped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn cannot_lock_before_credential_exists() {
        let (mut center, _, _, _) = center();
        center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
        assert!(!center.is_locked());
    }

    #[tokio::test]
    async fn auth_events_takeable_once() {
        let (mut center, _, _, _) = center();
        assert!(center.take_auth_events().is_some());
        assert!(center.take_auth_events().is_none());
    }
}
