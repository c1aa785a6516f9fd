use chrono::{DateTime, Utc};

/// Which stored credential level a successful entry matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Primary,
    Duress,
}

/// Events emitted by the unlock protocol for the presentation layer to handle.
///
/// Each fires at most once per attempt — the coordinator never re-emits a
/// terminal event for the same submission.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    UnlockSucceeded(CredentialKind),
    UnlockFailed { attempts_remaining: u32 },
    LockedOut { unlock_at: DateTime<Utc> },
    /// Input rejected before validation (wrong shape). Does not count
    /// toward the lockout counter.
    InputRejected,
    /// The coordinator wants the OS biometric prompt shown now.
    BiometricPromptRequested,
}

/// App lifecycle signals delivered by the platform shell.
///
/// Handlers are idempotent — platforms deliver these in bursts and
/// occasionally twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    EnteredBackground,
    WillEnterForeground,
    DidBecomeActive,
    WillResignActive,
}

/// State machine of a single unlock presentation.
///
/// Transient — recreated each time the unlock surface is presented and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum UnlockPhase {
    AwaitingInput,
    Validating,
    Locked { until: DateTime<Utc> },
    Succeeded,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_kinds_are_distinct() {
        assert_ne!(CredentialKind::Primary, CredentialKind::Duress);
    }

    #[test]
    fn auth_event_is_send_and_clone() {
        fn assert_send<T: Send>() {}
        fn assert_clone<T: Clone>() {}
        assert_send::<AuthEvent>();
        assert_clone::<AuthEvent>();
    }

    #[test]
    fn unlock_phase_equality() {
        assert_eq!(UnlockPhase::AwaitingInput, UnlockPhase::AwaitingInput);
        assert_ne!(UnlockPhase::AwaitingInput, UnlockPhase::Validating);
    }
}
