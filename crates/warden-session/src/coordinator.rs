//! The unified unlock protocol.
//!
//! One coordinator instance drives one unlock surface. It gates input on the
//! lockout guard, distinguishes malformed input from a genuine mismatch,
//! attempts duress validation only after primary validation fails, and
//! arbitrates the biometric path. All state transitions happen on the caller's
//! execution context; the only suspension point is the OS biometric prompt.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};

use warden_auth::{AuthResult, CredentialVault, LockoutGuard, LockoutState};
use warden_core::config::{BiometricMode, BIOMETRIC_MODE_KEY};
use warden_core::{AuthEvent, BiometricCapability, BiometricProvider, CredentialKind, UnlockPhase};
use warden_store::PreferenceStore;

use crate::session::SessionLock;
use crate::strategy::{CredentialCheck, UnlockStrategy};

/// What the unlock surface should render for the biometric option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricAffordance {
    Hidden,
    Face,
    Fingerprint,
}

pub struct AuthenticationCoordinator {
    vault: Arc<Mutex<CredentialVault>>,
    lockout: LockoutGuard,
    session: Arc<Mutex<SessionLock>>,
    biometrics: Arc<dyn BiometricProvider>,
    prefs: Arc<dyn PreferenceStore>,
    strategy: Box<dyn UnlockStrategy>,
    primary_set: watch::Receiver<bool>,
    events_tx: mpsc::UnboundedSender<AuthEvent>,
    phase_tx: watch::Sender<UnlockPhase>,
    affordance_tx: watch::Sender<BiometricAffordance>,
    capability: BiometricCapability,
    credential_len: usize,
    /// One outstanding biometric evaluation at a time.
    biometric_busy: bool,
    /// Automatic mode prompts once per presentation, not per re-render.
    auto_prompt_done: bool,
}

impl AuthenticationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vault: Arc<Mutex<CredentialVault>>,
        lockout: LockoutGuard,
        session: Arc<Mutex<SessionLock>>,
        biometrics: Arc<dyn BiometricProvider>,
        prefs: Arc<dyn PreferenceStore>,
        strategy: Box<dyn UnlockStrategy>,
        events_tx: mpsc::UnboundedSender<AuthEvent>,
        credential_len: usize,
    ) -> Self {
        let primary_set = lock_unpoisoned(&vault).watch_primary_set();
        let (phase_tx, _) = watch::channel(UnlockPhase::AwaitingInput);
        let (affordance_tx, _) = watch::channel(BiometricAffordance::Hidden);
        Self {
            vault,
            lockout,
            session,
            biometrics,
            prefs,
            strategy,
            primary_set,
            events_tx,
            phase_tx,
            affordance_tx,
            capability: BiometricCapability::None,
            credential_len,
            biometric_busy: false,
            auto_prompt_done: false,
        }
    }

    /// Begin a fresh unlock presentation: probe biometric capability, reset
    /// the per-presentation state, and fire the automatic prompt if the mode
    /// asks for one.
    pub async fn present(&mut self) {
        self.capability = self.biometrics.probe().await;
        self.biometric_busy = false;
        self.auto_prompt_done = false;

        match self.lockout.state() {
            LockoutState::Locked { unlock_at, .. } => {
                self.set_phase(UnlockPhase::Locked { until: unlock_at });
            }
            LockoutState::Open { .. } => self.set_phase(UnlockPhase::AwaitingInput),
        }
        self.refresh_affordance();

        if self.biometric_mode() == BiometricMode::Automatic
            && self.affordance_now() != BiometricAffordance::Hidden
        {
            self.auto_prompt_done = true;
            self.emit(AuthEvent::BiometricPromptRequested);
        }
    }

    /// Validate a full credential entry.
    ///
    /// Wrong-shape input is rejected before the vault is consulted and never
    /// counts toward the lockout counter. On mismatch the presentation layer
    /// clears its keypad buffer and shows the failure signal.
    pub fn submit_credential(&mut self, candidate: &str) -> AuthResult<()> {
        if self.biometric_busy {
            return Ok(());
        }
        match &*self.phase_tx.borrow() {
            UnlockPhase::Validating | UnlockPhase::Succeeded => return Ok(()),
            _ => {}
        }
        if let LockoutState::Locked { unlock_at, .. } = self.lockout.state() {
            self.set_phase(UnlockPhase::Locked { until: unlock_at });
            self.emit(AuthEvent::LockedOut { unlock_at });
            return Ok(());
        }
        if candidate.len() != self.credential_len
            || !candidate.chars().all(|c| c.is_ascii_digit())
        {
            self.emit(AuthEvent::InputRejected);
            return Ok(());
        }

        self.set_phase(UnlockPhase::Validating);
        let matched = {
            let vault = lock_unpoisoned(&self.vault);
            self.match_candidate(&vault, candidate)
        };
        match matched {
            Some(kind) => self.finish_success(candidate, kind),
            None => self.finish_failure(),
        }
    }

    /// Run the OS biometric prompt. Debounced: a second request while one is
    /// outstanding is dropped.
    pub async fn request_biometric_unlock(&mut self) -> AuthResult<()> {
        if self.biometric_busy || self.affordance_now() == BiometricAffordance::Hidden {
            return Ok(());
        }
        self.biometric_busy = true;
        self.set_phase(UnlockPhase::Validating);
        let passed = self.biometrics.evaluate("Unlock your wallet").await;
        self.biometric_busy = false;

        if passed {
            self.lockout.record_success()?;
            {
                let mut vault = lock_unpoisoned(&self.vault);
                self.strategy.on_biometric_success(&mut vault)?;
            }
            lock_unpoisoned(&self.session).unlock();
            self.set_phase(UnlockPhase::Succeeded);
            self.emit(AuthEvent::UnlockSucceeded(CredentialKind::Primary));
            self.refresh_affordance();
        } else {
            // The OS sheet already showed its own feedback; a biometric
            // mismatch never counts toward the lockout counter.
            self.set_phase(UnlockPhase::AwaitingInput);
        }
        Ok(())
    }

    pub fn watch_phase(&self) -> watch::Receiver<UnlockPhase> {
        self.phase_tx.subscribe()
    }

    pub fn watch_affordance(&self) -> watch::Receiver<BiometricAffordance> {
        self.affordance_tx.subscribe()
    }

    /// Recompute the biometric affordance after an external change
    /// (settings toggled, credential removed).
    pub fn refresh_affordance(&mut self) {
        let affordance = self.affordance_now();
        self.affordance_tx.send_if_modified(|current| {
            if *current != affordance {
                *current = affordance;
                true
            } else {
                false
            }
        });
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn match_candidate(
        &self,
        vault: &CredentialVault,
        candidate: &str,
    ) -> Option<CredentialKind> {
        // Primary validation first; duress only ever as a secondary check.
        match self.strategy.credential_check() {
            CredentialCheck::CurrentLevel => {
                if vault.is_valid(candidate) {
                    Some(CredentialKind::Primary)
                } else if self.strategy.accepts_duress() && vault.is_valid_duress(candidate) {
                    Some(CredentialKind::Duress)
                } else {
                    None
                }
            }
            CredentialCheck::AnyStoredLevel => {
                if vault.is_valid(candidate) {
                    Some(CredentialKind::Primary)
                } else if self.strategy.accepts_duress() && vault.is_valid_duress(candidate) {
                    Some(CredentialKind::Duress)
                } else if vault.contains(candidate) {
                    // An older stored level; still opens the session.
                    Some(CredentialKind::Primary)
                } else {
                    None
                }
            }
        }
    }

    fn finish_success(&mut self, candidate: &str, kind: CredentialKind) -> AuthResult<()> {
        self.lockout.record_success()?;
        {
            let mut vault = lock_unpoisoned(&self.vault);
            self.strategy.on_success(&mut vault, candidate, kind)?;
        }
        lock_unpoisoned(&self.session).unlock();
        self.set_phase(UnlockPhase::Succeeded);
        self.emit(AuthEvent::UnlockSucceeded(kind));
        self.refresh_affordance();
        Ok(())
    }

    fn finish_failure(&mut self) -> AuthResult<()> {
        let state = self.lockout.record_failure()?;
        match state {
            LockoutState::Locked { unlock_at, .. } => {
                self.set_phase(UnlockPhase::Locked { until: unlock_at });
                self.emit(AuthEvent::LockedOut { unlock_at });
            }
            LockoutState::Open { attempts_remaining } => {
                self.set_phase(UnlockPhase::Failed);
                self.emit(AuthEvent::UnlockFailed { attempts_remaining });
            }
        }
        self.refresh_affordance();
        Ok(())
    }

    fn affordance_now(&self) -> BiometricAffordance {
        let visible = self.capability.is_available()
            && self.biometric_mode().is_enabled()
            && self.strategy.allows_biometrics()
            && *self.primary_set.borrow()
            && !self.lockout.state().is_locked();
        if !visible {
            return BiometricAffordance::Hidden;
        }
        match self.capability {
            BiometricCapability::FaceLike => BiometricAffordance::Face,
            BiometricCapability::FingerprintLike => BiometricAffordance::Fingerprint,
            BiometricCapability::None => BiometricAffordance::Hidden,
        }
    }

    fn biometric_mode(&self) -> BiometricMode {
        self.prefs
            .get_str(BIOMETRIC_MODE_KEY)
            .and_then(|t| BiometricMode::from_token(&t))
            .unwrap_or_default()
    }

    fn set_phase(&mut self, phase: UnlockPhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current != phase {
                *current = phase;
                true
            } else {
                false
            }
        });
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events_tx.send(event);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
