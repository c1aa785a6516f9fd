//! Time sources for lockout and auto-lock arithmetic.
//!
//! Lockout windows are computed on a monotonic reading the user cannot
//! adjust; the wall clock is used only to display an absolute unlock moment.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// The two clocks the security components consume.
///
/// `monotonic()` is a duration since an arbitrary fixed epoch. Implementations
/// must guarantee it never goes backwards and is unaffected by wall-clock
/// changes. Consumers compare persisted monotonic stamps with
/// `saturating_sub`, so an epoch that resets between processes (see
/// [`SystemClock`]) can only lengthen a window, never shorten it.
pub trait Clock: Send + Sync {
    fn monotonic(&self) -> Duration;
    fn wall(&self) -> DateTime<Utc>;
}

/// Production clock: `Instant` anchored at construction for the monotonic
/// reading, `Utc::now()` for display.
///
/// The monotonic epoch is per-process. A platform integration that can read
/// a boot-anchored clock should supply its own `Clock` impl so lockout
/// windows also survive a relaunch at full fidelity.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-cranked clock for tests: monotonic and wall time advance
/// independently, so "the user changed the system clock" is expressible.
pub struct ManualClock {
    monotonic: Mutex<Duration>,
    wall: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            monotonic: Mutex::new(Duration::ZERO),
            wall: Mutex::new(Utc::now()),
        }
    }

    /// Advance both clocks together (normal passage of time).
    pub fn advance(&self, by: Duration) {
        self.advance_monotonic(by);
        self.advance_wall(by);
    }

    /// Advance only the monotonic reading (wall clock pinned).
    pub fn advance_monotonic(&self, by: Duration) {
        let mut m = lock_unpoisoned(&self.monotonic);
        *m += by;
    }

    /// Advance only the wall clock (user adjusts system time).
    pub fn advance_wall(&self, by: Duration) {
        let mut w = lock_unpoisoned(&self.wall);
        *w += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    /// Roll the wall clock backwards (user adjusts system time).
    pub fn rewind_wall(&self, by: Duration) {
        let mut w = lock_unpoisoned(&self.wall);
        *w -= chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *lock_unpoisoned(&self.monotonic)
    }

    fn wall(&self) -> DateTime<Utc> {
        *lock_unpoisoned(&self.wall)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_monotonic_never_decreases() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.monotonic(), Duration::ZERO);
    }

    #[test]
    fn manual_clock_advances_together() {
        let clock = ManualClock::new();
        let wall_before = clock.wall();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.monotonic(), Duration::from_secs(90));
        assert_eq!(clock.wall() - wall_before, chrono::Duration::seconds(90));
    }

    #[test]
    fn manual_clock_wall_advances_independently() {
        let clock = ManualClock::new();
        clock.advance_wall(Duration::from_secs(3600));
        assert_eq!(clock.monotonic(), Duration::ZERO);
    }
}
