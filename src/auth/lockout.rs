//! Brute-force protection keyed by phone number.
//!
//! Failures are counted in the store. Reaching exactly 3 failures locks the
//! phone for 30 seconds, exactly 6 for 60 seconds. Expired locks are resolved
//! lazily on the next check: below 6 failures the lock is cleared and the
//! count kept, at 6 or more the record is purged and counting starts over.

use crate::{
    clock::Clock,
    error::{Error, Result},
    store::LockoutStore,
};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SHORT_LOCK_THRESHOLD: i32 = 3;
pub const SHORT_LOCK_SECONDS: i64 = 30;
pub const LONG_LOCK_THRESHOLD: i32 = 6;
pub const LONG_LOCK_SECONDS: i64 = 60;

/// Lock to apply when the failure count reaches `attempts`.
#[must_use]
pub fn lock_duration(attempts: i32) -> Option<Duration> {
    match attempts {
        SHORT_LOCK_THRESHOLD => Some(Duration::seconds(SHORT_LOCK_SECONDS)),
        LONG_LOCK_THRESHOLD => Some(Duration::seconds(LONG_LOCK_SECONDS)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct LockoutGuard {
    store: Arc<dyn LockoutStore>,
    clock: Arc<dyn Clock>,
}

impl LockoutGuard {
    #[must_use]
    pub fn new(store: Arc<dyn LockoutStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count a failed login and lock the phone at the thresholds.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn record_failed_attempt(&self, phone: &str) -> Result<i32> {
        let attempts = self.store.increment_failed_attempts(phone).await?;

        if let Some(lock) = lock_duration(attempts) {
            let until = self.clock.now() + lock;
            self.store.set_blocked_until(phone, Some(until)).await?;
            warn!(
                attempts,
                lock_seconds = lock.num_seconds(),
                "Locking phone after repeated failed logins"
            );
        } else {
            debug!(attempts, "Recorded failed login");
        }

        Ok(attempts)
    }

    /// Reject the phone while it is locked; otherwise settle an expired lock.
    ///
    /// # Errors
    /// `Locked` with the remaining seconds, or a store failure.
    pub async fn check_lock(&self, phone: &str) -> Result<()> {
        let Some(record) = self.store.failed_login(phone).await? else {
            return Ok(());
        };

        let now = self.clock.now();
        if let Some(until) = record.blocked_until {
            if until > now {
                let remaining_ms = (until - now).num_milliseconds();
                let retry_after_seconds = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(1);
                return Err(Error::Locked {
                    retry_after_seconds: retry_after_seconds.max(1),
                });
            }
        }

        if record.attempts >= LONG_LOCK_THRESHOLD {
            self.store.purge_failed_logins(phone).await?;
            debug!("Purged failed-login record after long lock expired");
        } else if record.blocked_until.is_some() {
            self.store.set_blocked_until(phone, None).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore};

    const PHONE: &str = "+15551234567";

    fn guard() -> (LockoutGuard, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let guard = LockoutGuard::new(store.clone(), clock.clone());
        (guard, store, clock)
    }

    #[test]
    fn thresholds() {
        assert_eq!(lock_duration(1), None);
        assert_eq!(lock_duration(3), Some(Duration::seconds(30)));
        assert_eq!(lock_duration(4), None);
        assert_eq!(lock_duration(6), Some(Duration::seconds(60)));
        assert_eq!(lock_duration(7), None);
    }

    #[tokio::test]
    async fn unknown_phone_is_allowed() {
        let (guard, _, _) = guard();
        assert!(guard.check_lock(PHONE).await.is_ok());
    }

    #[tokio::test]
    async fn two_failures_do_not_lock() {
        let (guard, _, _) = guard();
        guard.record_failed_attempt(PHONE).await.unwrap();
        guard.record_failed_attempt(PHONE).await.unwrap();

        assert!(guard.check_lock(PHONE).await.is_ok());
    }

    #[tokio::test]
    async fn third_failure_locks_for_thirty_seconds() {
        let (guard, store, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(PHONE).await.unwrap();
        }

        let locked = guard.check_lock(PHONE).await;
        assert!(matches!(
            locked,
            Err(Error::Locked {
                retry_after_seconds: 30
            })
        ));

        clock.advance(Duration::seconds(29));
        assert!(guard.check_lock(PHONE).await.is_err());

        clock.advance(Duration::seconds(2));
        assert!(guard.check_lock(PHONE).await.is_ok());

        let record = store.failed_login(PHONE).await.unwrap().unwrap();
        assert_eq!(record.attempts, 3);
        assert_eq!(record.blocked_until, None);
    }

    #[tokio::test]
    async fn sixth_failure_locks_for_sixty_seconds_then_purges() {
        let (guard, store, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(PHONE).await.unwrap();
        }
        clock.advance(Duration::seconds(31));
        guard.check_lock(PHONE).await.unwrap();

        guard.record_failed_attempt(PHONE).await.unwrap();
        guard.record_failed_attempt(PHONE).await.unwrap();
        assert!(guard.check_lock(PHONE).await.is_ok());

        assert_eq!(guard.record_failed_attempt(PHONE).await.unwrap(), 6);
        assert!(matches!(
            guard.check_lock(PHONE).await,
            Err(Error::Locked {
                retry_after_seconds: 60
            })
        ));

        clock.advance(Duration::seconds(61));
        assert!(guard.check_lock(PHONE).await.is_ok());
        assert_eq!(store.failed_login(PHONE).await.unwrap(), None);
    }
}
