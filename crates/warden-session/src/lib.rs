pub mod center;
pub mod coordinator;
pub mod session;
pub mod strategy;

pub use center::SecurityCenter;
pub use coordinator::{AuthenticationCoordinator, BiometricAffordance};
pub use session::SessionLock;
pub use strategy::{AppUnlock, CredentialChange, CredentialCheck, UnlockStrategy};
