//! Collaborator contracts consumed by the security core.
//!
//! The platform shell (mobile app, desktop harness, tests) implements these;
//! the core never reaches into ambient OS state directly.

use async_trait::async_trait;
use thiserror::Error;

/// What biometric hardware the device offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricCapability {
    FaceLike,
    FingerprintLike,
    None,
}

impl BiometricCapability {
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// OS biometric facility.
///
/// `evaluate` presents the system prompt and blocks on the user; the
/// coordinator allows at most one outstanding evaluation at a time.
#[async_trait]
pub trait BiometricProvider: Send + Sync {
    async fn probe(&self) -> BiometricCapability;

    /// Run a user-facing biometric check. `reason` is shown in the OS sheet.
    /// Returns `true` only on a verified match; cancellation and mismatch
    /// both return `false`.
    async fn evaluate(&self, reason: &str) -> bool;
}

/// Failure channel of the device-owner query, distinguishing the one case
/// that matters (no device lock configured) from everything else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAuthError {
    #[error("no device lock configured")]
    NoDeviceLock,

    #[error("device owner query failed: {0}")]
    Other(String),
}

/// Whether the OS can still authenticate the device owner (passcode or
/// biometric). The secret store's confidentiality rests on this.
pub trait DeviceOwnerAuth: Send + Sync {
    fn can_authenticate(&self) -> Result<bool, DeviceAuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_availability() {
        assert!(BiometricCapability::FaceLike.is_available());
        assert!(BiometricCapability::FingerprintLike.is_available());
        assert!(!BiometricCapability::None.is_available());
    }

    #[test]
    fn device_auth_error_distinguishes_missing_lock() {
        assert_ne!(
            DeviceAuthError::NoDeviceLock,
            DeviceAuthError::Other("restricted".into())
        );
    }
}
