//! Brute-force failure tracking and temporary bans.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::observability::metrics;

#[derive(Debug)]
struct BruteForceEntry {
    failures: u32,
    banned_at: Option<Instant>,
    ban_expiry: Option<Instant>,
}

/// Tracks authentication failures per IP and bans repeat offenders.
///
/// The failure counter is cumulative: a successful authentication never
/// decrements or resets it. Only crossing the threshold (which starts a ban)
/// and ban expiry affect future admission. Entries whose ban has lapsed are
/// reclaimed by [`sweep`](Self::sweep); entries that never reach the
/// threshold are kept indefinitely.
pub struct BruteForceTracker {
    entries: DashMap<String, BruteForceEntry>,
    threshold: u32,
    ban_duration: Duration,
}

impl BruteForceTracker {
    pub fn new(threshold: u32, ban_duration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            threshold,
            ban_duration,
        }
    }

    /// True iff `ip` has a ban whose expiry is strictly in the future.
    ///
    /// Expired bans are lifted lazily by this comparison; the entry itself
    /// is only removed by the next sweep.
    pub fn is_banned(&self, ip: &str) -> bool {
        self.ban_remaining(ip).is_some()
    }

    /// Remaining ban time for `ip`, if a ban is active.
    pub fn ban_remaining(&self, ip: &str) -> Option<Duration> {
        let entry = self.entries.get(ip)?;
        let expiry = entry.ban_expiry?;
        let now = Instant::now();
        if expiry > now {
            Some(expiry - now)
        } else {
            None
        }
    }

    /// Record one authentication failure for `ip`, banning it once the
    /// cumulative count reaches the threshold.
    pub fn record_failure(&self, ip: &str) {
        let mut entry = self
            .entries
            .entry(ip.to_string())
            .or_insert_with(|| BruteForceEntry {
                failures: 0,
                banned_at: None,
                ban_expiry: None,
            });

        entry.failures = entry.failures.saturating_add(1);
        metrics::record_auth_failure();

        // Every failure at or past the threshold re-arms the ban window.
        if entry.failures >= self.threshold {
            let now = Instant::now();
            entry.banned_at = Some(now);
            entry.ban_expiry = Some(now + self.ban_duration);
            metrics::record_ban();
            tracing::warn!(
                ip = %ip,
                failures = entry.failures,
                ban_secs = self.ban_duration.as_secs(),
                "Banning IP after repeated authentication failures"
            );
        }
    }

    /// Remove entries whose ban expiry is strictly before `now`.
    ///
    /// Entries with no ban (failures below the threshold) are left alone,
    /// however old; only a lapsed ban marks an entry reclaimable.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !matches!(entry.ban_expiry, Some(expiry) if expiry < now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked IPs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn failures(&self, ip: &str) -> u32 {
        self.entries.get(ip).map(|e| e.failures).unwrap_or(0)
    }
}
