//! Guard configuration and the persisted idle budget

use std::time::Duration;

use crate::storage::{KeyValueStore, LAST_ACTIVE_AT_KEY, LOCK_AFTER_MS_KEY};

/// How often the idle monitor re-checks elapsed inactivity
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Idle budget used until the user picks one (5 minutes)
pub const DEFAULT_LOCK_AFTER: Duration = Duration::from_secs(5 * 60);

/// Smallest idle budget the guard accepts, in minutes
pub const MIN_LOCK_AFTER_MINUTES: u64 = 1;

const MS_PER_MINUTE: u64 = 60_000;

/// Static guard configuration
#[derive(Clone, Debug)]
pub struct GuardConfig {
    /// Interval of the periodic idle check
    pub check_interval: Duration,
    /// Idle budget when none has been persisted
    pub default_lock_after: Duration,
    /// Window before the deadline in which the host may show a warning
    pub warning_period: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            default_lock_after: DEFAULT_LOCK_AFTER,
            warning_period: Duration::from_secs(60),
        }
    }
}

impl GuardConfig {
    /// Shorter budget for shared devices
    pub fn strict() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            default_lock_after: Duration::from_secs(2 * 60),
            warning_period: Duration::from_secs(30),
        }
    }

    /// Longer budget for a single-user device
    pub fn relaxed() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            default_lock_after: Duration::from_secs(15 * 60),
            warning_period: Duration::from_secs(120),
        }
    }
}

/// Clamp a minute count to the minimum and convert it to milliseconds
pub fn lock_after_ms_from_minutes(minutes: u64) -> u64 {
    minutes.max(MIN_LOCK_AFTER_MINUTES).saturating_mul(MS_PER_MINUTE)
}

/// Idle budget as persisted in local storage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLockConfig {
    pub lock_after_ms: u64,
}

impl SessionLockConfig {
    /// Read the budget, falling back to `default_lock_after`
    ///
    /// Stored budgets below one minute are raised to the minimum.
    pub fn load(store: &dyn KeyValueStore, default_lock_after: Duration) -> Self {
        let lock_after_ms = store
            .get(LOCK_AFTER_MS_KEY)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(|| u64::try_from(default_lock_after.as_millis()).unwrap_or(u64::MAX))
            .max(MIN_LOCK_AFTER_MINUTES * MS_PER_MINUTE);

        Self { lock_after_ms }
    }

    pub fn lock_after(&self) -> Duration {
        Duration::from_millis(self.lock_after_ms)
    }
}

/// Parse the persisted last-activity timestamp
pub fn load_last_active_at(store: &dyn KeyValueStore) -> Option<i64> {
    store
        .get(LAST_ACTIVE_AT_KEY)
        .and_then(|v| v.parse::<i64>().ok())
}

/// Time since `last_active_at`, or `None` if activity was never recorded
pub fn idle_elapsed(last_active_at: Option<i64>, now_ms: i64) -> Option<Duration> {
    let last = last_active_at?;
    let elapsed = now_ms.saturating_sub(last).max(0);
    Some(Duration::from_millis(elapsed as u64))
}

/// Whether the idle budget has run out; missing activity counts as expired
pub fn idle_expired(last_active_at: Option<i64>, now_ms: i64, lock_after: Duration) -> bool {
    match idle_elapsed(last_active_at, now_ms) {
        Some(elapsed) => elapsed >= lock_after,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(15));
        assert_eq!(config.default_lock_after, Duration::from_secs(300));
    }

    #[test]
    fn test_minutes_are_clamped() {
        assert_eq!(lock_after_ms_from_minutes(0), 60_000);
        assert_eq!(lock_after_ms_from_minutes(1), 60_000);
        assert_eq!(lock_after_ms_from_minutes(10), 600_000);
        assert_eq!(lock_after_ms_from_minutes(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_load_uses_default_when_absent_or_garbage() {
        let store = MemoryKeyValueStore::new();
        let config = SessionLockConfig::load(&store, DEFAULT_LOCK_AFTER);
        assert_eq!(config.lock_after(), DEFAULT_LOCK_AFTER);

        store.set(LOCK_AFTER_MS_KEY, "soon").unwrap();
        let config = SessionLockConfig::load(&store, DEFAULT_LOCK_AFTER);
        assert_eq!(config.lock_after(), DEFAULT_LOCK_AFTER);
    }

    #[test]
    fn test_last_active_at_ignores_garbage() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(load_last_active_at(&store), None);

        store.set(LAST_ACTIVE_AT_KEY, "yesterday").unwrap();
        assert_eq!(load_last_active_at(&store), None);

        store.set(LAST_ACTIVE_AT_KEY, "1700000000000").unwrap();
        assert_eq!(load_last_active_at(&store), Some(1_700_000_000_000));
    }

    #[test]
    fn test_load_raises_tiny_budget() {
        let store = MemoryKeyValueStore::new();
        store.set(LOCK_AFTER_MS_KEY, "500").unwrap();
        let config = SessionLockConfig::load(&store, DEFAULT_LOCK_AFTER);
        assert_eq!(config.lock_after_ms, 60_000);
    }

    #[test]
    fn test_idle_expired_boundaries() {
        let budget = Duration::from_secs(60);
        assert!(!idle_expired(Some(0), 59_999, budget));
        assert!(idle_expired(Some(0), 60_000, budget));
        assert!(idle_expired(None, 0, budget));
        // Clock moved backwards: treat as no idle time
        assert!(!idle_expired(Some(10_000), 0, budget));
    }
}
