//! Per-surface variation of the unlock protocol.
//!
//! Every unlock surface shares one flow (lockout gate → validate → record →
//! hooks); what differs is which stored levels count as a match, whether
//! biometrics may be offered, and what happens on success. That variation is
//! injected here instead of subclassed.

use warden_auth::{AuthResult, CredentialVault};
use warden_core::CredentialKind;

/// Which stored levels count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// Only the active level (plus the duress secondary check).
    CurrentLevel,
    /// Any stored level — the app-level session opens to every known
    /// credential and the matched level becomes active.
    AnyStoredLevel,
}

pub trait UnlockStrategy: Send + Sync {
    fn credential_check(&self) -> CredentialCheck;

    fn allows_biometrics(&self) -> bool {
        true
    }

    /// Whether the duress secondary check applies on this surface.
    fn accepts_duress(&self) -> bool {
        true
    }

    /// Called after a verified credential success. `kind` tells a duress-aware
    /// implementation to stage its covert protective behavior; the
    /// coordinator itself never branches on it.
    fn on_success(
        &self,
        vault: &mut CredentialVault,
        candidate: &str,
        kind: CredentialKind,
    ) -> AuthResult<()>;

    /// Called after a verified biometric success. Biometrics always
    /// normalize on the last stored level.
    fn on_biometric_success(&self, vault: &mut CredentialVault) -> AuthResult<()> {
        vault.select_last_level()
    }
}

/// App-level session unlock: any known credential opens the session and its
/// level becomes the active one.
pub struct AppUnlock;

impl UnlockStrategy for AppUnlock {
    fn credential_check(&self) -> CredentialCheck {
        CredentialCheck::AnyStoredLevel
    }

    fn on_success(
        &self,
        vault: &mut CredentialVault,
        candidate: &str,
        _kind: CredentialKind,
    ) -> AuthResult<()> {
        vault.select_level(candidate)
    }
}

/// Re-authentication before changing or removing a credential: exactly the
/// active level, no biometrics, no duress, no level switch.
pub struct CredentialChange;

impl UnlockStrategy for CredentialChange {
    fn credential_check(&self) -> CredentialCheck {
        CredentialCheck::CurrentLevel
    }

    fn allows_biometrics(&self) -> bool {
        false
    }

    fn accepts_duress(&self) -> bool {
        false
    }

    fn on_success(
        &self,
        _vault: &mut CredentialVault,
        _candidate: &str,
        _kind: CredentialKind,
    ) -> AuthResult<()> {
        Ok(())
    }
}
