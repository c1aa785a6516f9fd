pub mod clock;
pub mod config;
pub mod events;
pub mod interfaces;
pub mod lifecycle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AutoLockPolicy, BiometricMode};
pub use events::{AuthEvent, CredentialKind, LifecycleEvent, UnlockPhase};
pub use interfaces::{
    BiometricCapability, BiometricProvider, DeviceAuthError, DeviceOwnerAuth,
};
