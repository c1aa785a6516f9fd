//! Brute-force lockout with escalating backoff.
//!
//! Failed-attempt count and last-failure stamp persist in the secret store
//! and survive restarts. All window arithmetic runs on the monotonic clock;
//! the wall clock only renders the absolute unlock moment for display, so
//! advancing the system clock never shortens a window.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use warden_core::Clock;
use warden_store::SecretStore;

use crate::error::AuthResult;

/// Failures tolerated before the first lock window.
pub const MAX_ATTEMPTS: u32 = 5;

const FAILED_ATTEMPTS_KEY: &str = "lockout.failed_attempts";
const LAST_FAILURE_KEY: &str = "lockout.last_failure_ms";

/// Padding on the expiry task's sleep so it observes `elapsed > backoff`,
/// never exact equality.
const EXPIRY_SLACK: Duration = Duration::from_millis(25);

/// Escalating lock window for a given failure count: the threshold attempt
/// locks for 5 minutes, each further failure steps up, capped at 30 minutes.
pub fn backoff_for(failed_attempts: u32) -> Duration {
    let over = failed_attempts.saturating_sub(MAX_ATTEMPTS);
    let minutes = match over {
        0 => 5,
        1 => 10,
        2 => 15,
        _ => 30,
    };
    Duration::from_secs(minutes * 60)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LockoutState {
    Open { attempts_remaining: u32 },
    Locked { unlock_at: DateTime<Utc>, remaining: Duration },
}

impl LockoutState {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

struct LockoutInner {
    secret: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    failed_attempts: u32,
    last_failure: Duration,
    state_tx: watch::Sender<LockoutState>,
    expiry: Option<JoinHandle<()>>,
    /// Bumped on every recompute; a deferred expiry firing for an older
    /// generation is stale and does nothing.
    generation: u64,
}

#[derive(Clone)]
pub struct LockoutGuard {
    inner: Arc<Mutex<LockoutInner>>,
}

impl LockoutGuard {
    /// Load the persisted record, or start with `(0, now)` on first use.
    ///
    /// Must be called inside a Tokio runtime — re-entering a lock window
    /// schedules the expiry task immediately.
    pub fn load(secret: Arc<dyn SecretStore>, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let failed_attempts = secret
            .get(FAILED_ATTEMPTS_KEY)?
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        let last_failure = secret
            .get(LAST_FAILURE_KEY)?
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| clock.monotonic());

        let initial = derive_state(failed_attempts, last_failure, clock.as_ref());
        let (state_tx, _) = watch::channel(initial);
        let guard = Self {
            inner: Arc::new(Mutex::new(LockoutInner {
                secret,
                clock,
                failed_attempts,
                last_failure,
                state_tx,
                expiry: None,
                generation: 0,
            })),
        };
        {
            let mut inner = lock_unpoisoned(&guard.inner);
            recompute(&mut inner, &guard.inner);
        }
        Ok(guard)
    }

    /// Current state, derived fresh from the clock.
    pub fn state(&self) -> LockoutState {
        let inner = lock_unpoisoned(&self.inner);
        derive_state(inner.failed_attempts, inner.last_failure, inner.clock.as_ref())
    }

    pub fn watch(&self) -> watch::Receiver<LockoutState> {
        lock_unpoisoned(&self.inner).state_tx.subscribe()
    }

    pub fn failed_attempts(&self) -> u32 {
        lock_unpoisoned(&self.inner).failed_attempts
    }

    /// A verified authentication success. Resets the counter.
    pub fn record_success(&self) -> AuthResult<LockoutState> {
        let mut inner = lock_unpoisoned(&self.inner);
        inner.secret.set(FAILED_ATTEMPTS_KEY, Some("0"))?;
        inner.failed_attempts = 0;
        Ok(recompute(&mut inner, &self.inner))
    }

    /// A verified credential mismatch. Increments the counter and stamps the
    /// failure instant. Persists before mutating memory.
    pub fn record_failure(&self) -> AuthResult<LockoutState> {
        let mut inner = lock_unpoisoned(&self.inner);
        let attempts = inner.failed_attempts.saturating_add(1);
        let now = inner.clock.monotonic();
        inner
            .secret
            .set(FAILED_ATTEMPTS_KEY, Some(&attempts.to_string()))?;
        inner
            .secret
            .set(LAST_FAILURE_KEY, Some(&(now.as_millis() as u64).to_string()))?;
        inner.failed_attempts = attempts;
        inner.last_failure = now;
        Ok(recompute(&mut inner, &self.inner))
    }
}

/// Pure derivation from the record and the current monotonic reading.
fn derive_state(failed_attempts: u32, last_failure: Duration, clock: &dyn Clock) -> LockoutState {
    if failed_attempts < MAX_ATTEMPTS {
        return LockoutState::Open {
            attempts_remaining: MAX_ATTEMPTS - failed_attempts,
        };
    }
    let backoff = backoff_for(failed_attempts);
    // saturating_sub: a stamp from a previous boot can sit ahead of this
    // process's monotonic origin; clamping to zero elapsed fails closed.
    let elapsed = clock.monotonic().saturating_sub(last_failure);
    if elapsed > backoff {
        // Probation: one attempt; a further failure re-locks at the next tier.
        LockoutState::Open {
            attempts_remaining: 1,
        }
    } else {
        let remaining = backoff - elapsed;
        let unlock_at = clock.wall()
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
        LockoutState::Locked {
            unlock_at,
            remaining,
        }
    }
}

/// Re-derive, republish on change, and replace the deferred expiry task.
fn recompute(inner: &mut MutexGuard<'_, LockoutInner>, handle: &Arc<Mutex<LockoutInner>>) -> LockoutState {
    let state = derive_state(inner.failed_attempts, inner.last_failure, inner.clock.as_ref());

    if let Some(task) = inner.expiry.take() {
        task.abort();
    }
    inner.generation = inner.generation.wrapping_add(1);

    if let LockoutState::Locked { remaining, .. } = state {
        let generation = inner.generation;
        let handle = Arc::clone(handle);
        inner.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining + EXPIRY_SLACK).await;
            let mut inner = lock_unpoisoned(&handle);
            if inner.generation == generation {
                recompute(&mut inner, &handle);
            }
        }));
    }

    let published = state.clone();
    inner.state_tx.send_if_modified(|current| {
        if *current != published {
            *current = published;
            true
        } else {
            false
        }
    });
    state
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
