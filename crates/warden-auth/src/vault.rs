//! Multi-level credential storage.
//!
//! Credentials live in an ordered sequence; the index is the "level". One
//! level is active at a time, and the duress credential — if present —
//! occupies exactly the level above the active one. The vault is the only
//! writer of the secret-store keys holding the sequence and the active-level
//! pointer.

use std::sync::Arc;

use tokio::sync::watch;
use zeroize::Zeroize;

use warden_core::config::{BiometricMode, BIOMETRIC_MODE_KEY};
use warden_store::{PreferenceStore, SecretStore};

use crate::error::{AuthError, AuthResult};

const LEVELS_KEY: &str = "credential.levels";
const ACTIVE_LEVEL_KEY: &str = "credential.active_level";

/// Must never occur inside a credential; input validation upstream admits
/// only fixed-length digit strings.
const LEVEL_SEPARATOR: char = ',';

pub struct CredentialVault {
    secret: Arc<dyn SecretStore>,
    prefs: Arc<dyn PreferenceStore>,
    levels: Vec<String>,
    current_level: usize,
    primary_set_tx: watch::Sender<bool>,
    duress_set_tx: watch::Sender<bool>,
}

impl CredentialVault {
    /// Load the vault from storage, or start fresh with a single empty level.
    pub fn load(
        secret: Arc<dyn SecretStore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> AuthResult<Self> {
        let levels: Vec<String> = match secret.get(LEVELS_KEY)? {
            Some(joined) => joined.split(LEVEL_SEPARATOR).map(str::to_string).collect(),
            None => vec![String::new()],
        };
        let current_level = secret
            .get(ACTIVE_LEVEL_KEY)?
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&i| i < levels.len())
            .unwrap_or(levels.len() - 1);

        let (primary_set_tx, _) = watch::channel(false);
        let (duress_set_tx, _) = watch::channel(false);
        let mut vault = Self {
            secret,
            prefs,
            levels,
            current_level,
            primary_set_tx,
            duress_set_tx,
        };
        vault.publish_flags();
        Ok(vault)
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// True iff `candidate` matches the active level's credential.
    pub fn is_valid(&self, candidate: &str) -> bool {
        !candidate.is_empty() && self.levels[self.current_level] == candidate
    }

    /// True iff a duress level exists and `candidate` matches it.
    pub fn is_valid_duress(&self, candidate: &str) -> bool {
        !candidate.is_empty()
            && self.levels.get(self.current_level + 1).map(String::as_str)
                == Some(candidate)
    }

    /// True iff `candidate` appears at any level.
    pub fn contains(&self, candidate: &str) -> bool {
        !candidate.is_empty() && self.levels.iter().any(|level| level == candidate)
    }

    // ── Level selection ─────────────────────────────────────────────────

    /// Make the level holding `candidate` the active one. No-op when no
    /// level holds it.
    pub fn select_level(&mut self, candidate: &str) -> AuthResult<()> {
        let Some(index) = self
            .levels
            .iter()
            .position(|level| !level.is_empty() && level == candidate)
        else {
            return Ok(());
        };
        if index != self.current_level {
            self.persist_pointer(index)?;
            self.current_level = index;
            self.publish_flags();
        }
        Ok(())
    }

    /// Make the last stored level the active one. Used by biometric unlock,
    /// which always normalizes on the top of the stack.
    pub fn select_last_level(&mut self) -> AuthResult<()> {
        let index = self.levels.len() - 1;
        if index != self.current_level {
            self.persist_pointer(index)?;
            self.current_level = index;
            self.publish_flags();
        }
        Ok(())
    }

    // ── Mutation ────────────────────────────────────────────────────────

    /// Write `candidate` at the active level.
    pub fn set_primary(&mut self, candidate: &str) -> AuthResult<()> {
        self.reject_duplicate(candidate, self.current_level)?;
        let mut next = self.levels.clone();
        next[self.current_level] = candidate.to_string();
        self.persist(&next, self.current_level)?;
        self.replace_levels(next);
        self.publish_flags();
        Ok(())
    }

    /// Clear the active level and discard the duress credential (and
    /// anything beyond it) with it.
    pub fn remove_primary(&mut self) -> AuthResult<()> {
        if !self.is_primary_set() {
            return Err(AuthError::NoCredential);
        }
        let mut next = self.levels[..=self.current_level].to_vec();
        next[self.current_level] = String::new();
        self.persist(&next, self.current_level)?;
        self.replace_levels(next);
        self.publish_flags();
        Ok(())
    }

    /// Set or overwrite the duress credential one level above the active one.
    pub fn set_duress(&mut self, candidate: &str) -> AuthResult<()> {
        let duress_index = self.current_level + 1;
        self.reject_duplicate(candidate, duress_index)?;
        let mut next = self.levels.clone();
        if duress_index < next.len() {
            next[duress_index] = candidate.to_string();
        } else {
            next.push(candidate.to_string());
        }
        self.persist(&next, self.current_level)?;
        self.replace_levels(next);
        self.publish_flags();
        Ok(())
    }

    /// Remove the duress credential, truncating the sequence back to the
    /// active level.
    pub fn remove_duress(&mut self) -> AuthResult<()> {
        if !self.is_duress_set() {
            return Err(AuthError::NoCredential);
        }
        let next = self.levels[..=self.current_level].to_vec();
        self.persist(&next, self.current_level)?;
        self.replace_levels(next);
        self.publish_flags();
        Ok(())
    }

    // ── Derived flags ───────────────────────────────────────────────────

    pub fn is_primary_set(&self) -> bool {
        !self.levels[self.current_level].is_empty()
    }

    pub fn is_duress_set(&self) -> bool {
        self.levels
            .get(self.current_level + 1)
            .is_some_and(|level| !level.is_empty())
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn watch_primary_set(&self) -> watch::Receiver<bool> {
        self.primary_set_tx.subscribe()
    }

    pub fn watch_duress_set(&self) -> watch::Receiver<bool> {
        self.duress_set_tx.subscribe()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn reject_duplicate(&self, candidate: &str, allowed_index: usize) -> AuthResult<()> {
        let reused = self.levels.iter().enumerate().any(|(i, level)| {
            i != allowed_index && !level.is_empty() && level == candidate
        });
        if reused {
            Err(AuthError::DuplicateCredential)
        } else {
            Ok(())
        }
    }

    /// Persist sequence and pointer. Memory is committed by the caller only
    /// after this succeeds.
    fn persist(&self, levels: &[String], pointer: usize) -> AuthResult<()> {
        let mut joined = levels.join(&LEVEL_SEPARATOR.to_string());
        let result = self.secret.set(LEVELS_KEY, Some(&joined));
        joined.zeroize();
        result?;
        self.persist_pointer(pointer)
    }

    fn persist_pointer(&self, pointer: usize) -> AuthResult<()> {
        self.secret
            .set(ACTIVE_LEVEL_KEY, Some(&pointer.to_string()))?;
        Ok(())
    }

    fn replace_levels(&mut self, next: Vec<String>) {
        for level in self.levels.iter_mut() {
            level.zeroize();
        }
        self.levels = next;
    }

    fn publish_flags(&mut self) {
        let primary = self.is_primary_set();
        let duress = self.is_duress_set();

        // Biometrics without a knowledge-factor fallback is an invalid
        // security state.
        if !primary {
            let enabled = self
                .prefs
                .get_str(BIOMETRIC_MODE_KEY)
                .and_then(|t| BiometricMode::from_token(&t))
                .is_some_and(|m| m.is_enabled());
            if enabled {
                tracing::info!("Primary credential unset; disabling biometric unlock");
                self.prefs
                    .set_str(BIOMETRIC_MODE_KEY, Some(BiometricMode::Off.as_token()));
            }
        }

        self.primary_set_tx.send_if_modified(|v| {
            if *v != primary {
                *v = primary;
                true
            } else {
                false
            }
        });
        self.duress_set_tx.send_if_modified(|v| {
            if *v != duress {
                *v = duress;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for CredentialVault {
    fn drop(&mut self) {
        for level in self.levels.iter_mut() {
            level.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_store::memory::{MemoryPreferenceStore, MemorySecretStore};

    fn fresh_vault() -> (CredentialVault, Arc<MemorySecretStore>, Arc<MemoryPreferenceStore>) {
        let secret = Arc::new(MemorySecretStore::new());
        let prefs = Arc::new(MemoryPreferenceStore::new());
        let vault = CredentialVault::load(secret.clone(), prefs.clone()).unwrap();
        (vault, secret, prefs)
    }

    #[test]
    fn fresh_vault_has_one_empty_level() {
        let (vault, _, _) = fresh_vault();
        assert_eq!(vault.level_count(), 1);
        assert_eq!(vault.current_level(), 0);
        assert!(!vault.is_primary_set());
        assert!(!vault.is_duress_set());
    }

    #[test]
    fn set_primary_then_validate() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        assert!(vault.is_primary_set());
        assert!(vault.is_valid("123456"));
        assert!(!vault.is_valid("654321"));
        assert!(vault.contains("123456"));
    }

    #[test]
    fn duress_validates_as_duress_not_primary() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        assert!(vault.is_valid_duress("999999"));
        assert!(!vault.is_valid("999999"));
        assert!(vault.contains("999999"));
    }

    #[test]
    fn duress_occupies_level_above_primary() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        assert_eq!(vault.level_count(), vault.current_level() + 2);
    }

    #[test]
    fn remove_primary_discards_duress() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        vault.remove_primary().unwrap();
        assert!(!vault.is_primary_set());
        assert!(!vault.is_duress_set());
        assert_eq!(vault.level_count(), vault.current_level() + 1);
        assert!(!vault.contains("999999"));
    }

    #[test]
    fn remove_duress_truncates_to_active_level() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        vault.remove_duress().unwrap();
        assert!(vault.is_primary_set());
        assert!(!vault.is_duress_set());
        assert_eq!(vault.level_count(), vault.current_level() + 1);
    }

    #[test]
    fn duplicate_across_levels_rejected() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        assert!(matches!(
            vault.set_duress("123456"),
            Err(AuthError::DuplicateCredential)
        ));
        // Re-entering the value already active at the same slot is allowed.
        vault.set_primary("123456").unwrap();
    }

    #[test]
    fn overwrite_duress_in_place_allowed() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        vault.set_duress("888888").unwrap();
        assert!(vault.is_valid_duress("888888"));
        assert!(!vault.contains("999999"));
    }

    #[test]
    fn removing_unset_credentials_is_a_policy_violation() {
        let (mut vault, _, _) = fresh_vault();
        assert!(matches!(vault.remove_primary(), Err(AuthError::NoCredential)));
        assert!(matches!(vault.remove_duress(), Err(AuthError::NoCredential)));
    }

    #[test]
    fn roundtrip_across_reload() {
        let secret = Arc::new(MemorySecretStore::new());
        let prefs = Arc::new(MemoryPreferenceStore::new());
        {
            let mut vault = CredentialVault::load(secret.clone(), prefs.clone()).unwrap();
            vault.set_primary("123456").unwrap();
            vault.set_duress("999999").unwrap();
        }
        let vault = CredentialVault::load(secret, prefs).unwrap();
        assert!(vault.is_primary_set());
        assert!(vault.is_valid("123456"));
        assert!(vault.is_valid_duress("999999"));
    }

    #[test]
    fn storage_failure_leaves_memory_unchanged() {
        let (mut vault, secret, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        secret.fail_writes(true);
        assert!(matches!(
            vault.set_primary("654321"),
            Err(AuthError::Storage(_))
        ));
        assert!(vault.is_valid("123456"));
        assert!(!vault.contains("654321"));

        assert!(vault.remove_primary().is_err());
        assert!(vault.is_primary_set());
    }

    #[test]
    fn removing_primary_forces_biometrics_off() {
        let (mut vault, _, prefs) = fresh_vault();
        vault.set_primary("123456").unwrap();
        prefs.set_str(BIOMETRIC_MODE_KEY, Some("automatic"));
        vault.remove_primary().unwrap();
        assert_eq!(prefs.get_str(BIOMETRIC_MODE_KEY).as_deref(), Some("off"));
    }

    #[test]
    fn select_level_moves_active_pointer() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        vault.select_level("999999").unwrap();
        // The duress entry is a stored level; selecting it makes it active.
        assert!(vault.is_valid("999999"));
        assert!(!vault.is_valid("123456"));
    }

    #[test]
    fn select_level_ignores_unknown_candidate() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        let before = vault.current_level();
        vault.select_level("000000").unwrap();
        assert_eq!(vault.current_level(), before);
    }

    #[test]
    fn select_last_level_normalizes_to_top() {
        let (mut vault, _, _) = fresh_vault();
        vault.set_primary("123456").unwrap();
        vault.set_duress("999999").unwrap();
        vault.select_last_level().unwrap();
        assert_eq!(vault.current_level(), vault.level_count() - 1);
    }

    #[test]
    fn selected_level_survives_reload() {
        let secret = Arc::new(MemorySecretStore::new());
        let prefs = Arc::new(MemoryPreferenceStore::new());
        {
            let mut vault = CredentialVault::load(secret.clone(), prefs.clone()).unwrap();
            vault.set_primary("123456").unwrap();
            vault.set_duress("999999").unwrap();
            vault.select_level("999999").unwrap();
        }
        let vault = CredentialVault::load(secret, prefs).unwrap();
        assert!(vault.is_valid("999999"));
    }

    #[test]
    fn primary_flag_watch_publishes_on_change() {
        let (mut vault, _, _) = fresh_vault();
        let mut rx = vault.watch_primary_set();
        assert!(!*rx.borrow_and_update());
        vault.set_primary("123456").unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        // Overwriting with another value keeps the flag true — no re-emit.
        vault.set_primary("654321").unwrap();
        assert!(!rx.has_changed().unwrap());
    }
}
