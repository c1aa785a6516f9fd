pub mod error;
pub mod lockout;
pub mod trust;
pub mod vault;

pub use error::{AuthError, AuthResult};
pub use lockout::{backoff_for, LockoutGuard, LockoutState, MAX_ATTEMPTS};
pub use trust::{DeviceTrust, DeviceTrustMonitor};
pub use vault::CredentialVault;
