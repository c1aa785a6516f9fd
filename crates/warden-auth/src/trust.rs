//! Device-trust monitoring.
//!
//! The secret store's confidentiality rests on the OS still enforcing a
//! device lock. When the platform affirmatively reports that the lock was
//! removed, cached sensitive state must be invalidated — once.

use std::sync::Arc;

use tokio::sync::watch;

use warden_core::{DeviceAuthError, DeviceOwnerAuth};

/// Tri-state so a transient query failure never triggers the destructive
/// invalidation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTrust {
    Trusted,
    Untrusted,
    Indeterminate,
}

pub struct DeviceTrustMonitor {
    query: Arc<dyn DeviceOwnerAuth>,
    on_invalidate: Box<dyn Fn() + Send + Sync>,
    state_tx: watch::Sender<DeviceTrust>,
}

impl DeviceTrustMonitor {
    /// `on_invalidate` erases cached sensitive state; it fires exactly once
    /// per transition into `Untrusted`.
    pub fn new(
        query: Arc<dyn DeviceOwnerAuth>,
        on_invalidate: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        let (state_tx, _) = watch::channel(DeviceTrust::Indeterminate);
        Self {
            query,
            on_invalidate,
            state_tx,
        }
    }

    /// Re-query the platform. Called on every app-foreground event.
    pub fn resolve(&self) -> DeviceTrust {
        let next = match self.query.can_authenticate() {
            Ok(true) => DeviceTrust::Trusted,
            Err(DeviceAuthError::NoDeviceLock) => DeviceTrust::Untrusted,
            // Policy restrictions and transient errors must not destroy data.
            Ok(false) | Err(DeviceAuthError::Other(_)) => DeviceTrust::Indeterminate,
        };

        let previous = *self.state_tx.borrow();
        if next == DeviceTrust::Untrusted && previous != DeviceTrust::Untrusted {
            tracing::warn!("Device lock removed; invalidating protected state");
            (self.on_invalidate)();
        }

        self.state_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
        next
    }

    pub fn state(&self) -> DeviceTrust {
        *self.state_tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<DeviceTrust> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted device-owner query: pops the next canned answer per call.
    struct ScriptedQuery {
        answers: Mutex<Vec<Result<bool, DeviceAuthError>>>,
    }

    impl ScriptedQuery {
        fn new(mut answers: Vec<Result<bool, DeviceAuthError>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
            }
        }
    }

    impl DeviceOwnerAuth for ScriptedQuery {
        fn can_authenticate(&self) -> Result<bool, DeviceAuthError> {
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(true))
        }
    }

    fn counting_monitor(
        answers: Vec<Result<bool, DeviceAuthError>>,
    ) -> (DeviceTrustMonitor, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_hook = fired.clone();
        let monitor = DeviceTrustMonitor::new(
            Arc::new(ScriptedQuery::new(answers)),
            Box::new(move || {
                fired_hook.fetch_add(1, Ordering::Relaxed);
            }),
        );
        (monitor, fired)
    }

    #[test]
    fn starts_indeterminate() {
        let (monitor, _) = counting_monitor(vec![]);
        assert_eq!(monitor.state(), DeviceTrust::Indeterminate);
    }

    #[test]
    fn trusted_device_never_invalidates() {
        let (monitor, fired) = counting_monitor(vec![Ok(true), Ok(true)]);
        assert_eq!(monitor.resolve(), DeviceTrust::Trusted);
        assert_eq!(monitor.resolve(), DeviceTrust::Trusted);
        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn invalidation_fires_exactly_once_per_transition() {
        let (monitor, fired) = counting_monitor(vec![
            Ok(true),
            Err(DeviceAuthError::NoDeviceLock),
            Err(DeviceAuthError::NoDeviceLock),
        ]);
        monitor.resolve();
        assert_eq!(monitor.resolve(), DeviceTrust::Untrusted);
        assert_eq!(fired.load(Ordering::Relaxed), 1);
        // Still untrusted on re-query — no second firing.
        monitor.resolve();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn transient_failure_is_indeterminate_and_harmless() {
        let (monitor, fired) = counting_monitor(vec![
            Err(DeviceAuthError::Other("policy restriction".into())),
            Ok(false),
        ]);
        assert_eq!(monitor.resolve(), DeviceTrust::Indeterminate);
        assert_eq!(monitor.resolve(), DeviceTrust::Indeterminate);
        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn retrust_then_untrust_fires_again() {
        let (monitor, fired) = counting_monitor(vec![
            Err(DeviceAuthError::NoDeviceLock),
            Ok(true),
            Err(DeviceAuthError::NoDeviceLock),
        ]);
        monitor.resolve();
        monitor.resolve();
        monitor.resolve();
        assert_eq!(fired.load(Ordering::Relaxed), 2);
    }
}
