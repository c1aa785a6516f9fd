//! Session auto-lock driven by app lifecycle transitions.
//!
//! Backgrounding stamps a wall-clock instant; foregrounding compares the
//! elapsed idle time against the auto-lock policy that was in force when the
//! app went to background. A missing stamp counts as infinite idle time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use warden_core::config::{AutoLockPolicy, AUTO_LOCK_POLICY_KEY};
use warden_core::{Clock, LifecycleEvent};
use warden_store::PreferenceStore;

pub struct SessionLock {
    prefs: Arc<dyn PreferenceStore>,
    clock: Arc<dyn Clock>,
    /// Read handle on the vault's primary-credential flag; a session without
    /// a primary credential can never lock (no escape hatch).
    primary_set: watch::Receiver<bool>,
    locked_tx: watch::Sender<bool>,
    policy_tx: watch::Sender<AutoLockPolicy>,
    last_backgrounded: Option<DateTime<Utc>>,
    /// Policy captured at the start of the current backgrounding cycle.
    /// A policy change takes effect from the next cycle only.
    armed_policy: AutoLockPolicy,
}

impl SessionLock {
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        clock: Arc<dyn Clock>,
        primary_set: watch::Receiver<bool>,
    ) -> Self {
        let policy = prefs
            .get_str(AUTO_LOCK_POLICY_KEY)
            .and_then(|t| AutoLockPolicy::from_token(&t))
            .unwrap_or_default();
        let (locked_tx, _) = watch::channel(false);
        let (policy_tx, _) = watch::channel(policy);
        Self {
            prefs,
            clock,
            primary_set,
            locked_tx,
            policy_tx,
            last_backgrounded: None,
            armed_policy: policy,
        }
    }

    pub fn handle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::EnteredBackground | LifecycleEvent::WillResignActive => {
                self.did_enter_background()
            }
            LifecycleEvent::WillEnterForeground | LifecycleEvent::DidBecomeActive => {
                self.will_enter_foreground()
            }
        }
    }

    pub fn did_enter_background(&mut self) {
        if self.is_locked() {
            // Already locked: keep the meaningful stamp (cleared on lock)
            // and don't restart the idle window.
            return;
        }
        self.last_backgrounded = Some(self.clock.wall());
        self.armed_policy = self.policy();
    }

    pub fn will_enter_foreground(&mut self) {
        if self.is_locked() {
            return;
        }
        // Missing stamp = infinite idle time. A wall clock that moved
        // backwards while backgrounded is equally suspect.
        let elapsed = self
            .last_backgrounded
            .map(|stamp| (self.clock.wall() - stamp).to_std().unwrap_or(Duration::MAX))
            .unwrap_or(Duration::MAX);
        if elapsed > self.armed_policy.duration() {
            self.lock();
        }
    }

    /// Lock the session. No-op when already locked or when no primary
    /// credential exists.
    pub fn lock(&mut self) {
        if self.is_locked() || !*self.primary_set.borrow() {
            return;
        }
        self.last_backgrounded = None;
        let _ = self.locked_tx.send(true);
    }

    /// Clear the lock. Callable only after a verified authentication.
    pub fn unlock(&mut self) {
        self.last_backgrounded = None;
        self.locked_tx.send_if_modified(|locked| {
            if *locked {
                *locked = false;
                true
            } else {
                false
            }
        });
    }

    pub fn is_locked(&self) -> bool {
        *self.locked_tx.borrow()
    }

    pub fn watch_locked(&self) -> watch::Receiver<bool> {
        self.locked_tx.subscribe()
    }

    pub fn policy(&self) -> AutoLockPolicy {
        *self.policy_tx.borrow()
    }

    pub fn watch_policy(&self) -> watch::Receiver<AutoLockPolicy> {
        self.policy_tx.subscribe()
    }

    /// Persist a new policy. The running backgrounding cycle keeps the
    /// policy it was armed with.
    pub fn set_policy(&mut self, policy: AutoLockPolicy) {
        self.prefs
            .set_str(AUTO_LOCK_POLICY_KEY, Some(policy.as_token()));
        self.policy_tx.send_if_modified(|current| {
            if *current != policy {
                *current = policy;
                true
            } else {
                false
            }
        });
    }
}
