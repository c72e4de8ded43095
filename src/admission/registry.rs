//! Per-key limiter registry.
//!
//! # Responsibilities
//! - Lazily create one token bucket per admission key
//! - Track last activity per entry for idle eviction
//! - Sweep idle entries without blocking request paths
//!
//! # Design Decisions
//! - DashMap shards keys, so unrelated keys never contend on one lock
//! - The entry API makes get-or-create atomic: when two requests race on a
//!   new key, exactly one bucket is installed and both callers use it
//! - Last-seen is a relaxed atomic; bucket state sits behind a per-entry
//!   mutex so concurrent token consumption for one key is linearized

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::admission::bucket::TokenBucket;
use crate::config::RouteLimitConfig;

/// One admission key's state: its bucket and when it was last seen.
///
/// Last-seen is nanoseconds relative to the owning registry's anchor.
pub struct LimiterEntry {
    bucket: Mutex<TokenBucket>,
    last_seen_nanos: AtomicU64,
}

impl LimiterEntry {
    fn new(bucket: TokenBucket, now_nanos: u64) -> Self {
        Self {
            bucket: Mutex::new(bucket),
            last_seen_nanos: AtomicU64::new(now_nanos),
        }
    }

    /// Run `f` against the bucket under its lock.
    ///
    /// A poisoned lock is recovered rather than propagated: admission must
    /// always produce a decision.
    pub fn with_bucket<T>(&self, f: impl FnOnce(&mut TokenBucket) -> T) -> T {
        let mut bucket = self
            .bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut bucket)
    }

    fn touch(&self, now_nanos: u64) {
        self.last_seen_nanos.store(now_nanos, Ordering::Relaxed);
    }

    fn idle_since(&self, now_nanos: u64) -> Duration {
        let last = self.last_seen_nanos.load(Ordering::Relaxed);
        Duration::from_nanos(now_nanos.saturating_sub(last))
    }
}

/// Concurrent, lazily-populated map of admission key to limiter.
///
/// One registry exists per route class; keys in different classes never
/// share state.
pub struct LimiterRegistry {
    entries: DashMap<String, Arc<LimiterEntry>>,
    limits: RouteLimitConfig,
    anchor: Instant,
}

impl LimiterRegistry {
    pub fn new(limits: RouteLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            limits,
            anchor: Instant::now(),
        }
    }

    /// The route-class limits this registry enforces.
    pub fn limits(&self) -> &RouteLimitConfig {
        &self.limits
    }

    fn now_nanos(&self) -> u64 {
        self.anchor.elapsed().as_nanos() as u64
    }

    /// Fetch the limiter for `key`, creating a full bucket on first sight.
    ///
    /// Refreshes the entry's last-seen timestamp. Creation races resolve to
    /// a single winner through the entry API; the loser's freshly built
    /// bucket is dropped and the installed one is returned.
    pub fn get_or_create(&self, key: &str) -> Arc<LimiterEntry> {
        let now = self.now_nanos();
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(key = %key, "Creating rate limiter entry");
                Arc::new(LimiterEntry::new(
                    TokenBucket::new(self.limits.refill_rate(), f64::from(self.limits.burst)),
                    now,
                ))
            })
            .clone();
        entry.touch(now);
        entry
    }

    /// Remove every entry idle longer than `idle_threshold`.
    ///
    /// Returns the number removed. Holds no lock beyond DashMap's per-shard
    /// traversal, so live admission checks are never stalled.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        let now = self.now_nanos();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.idle_since(now) <= idle_threshold);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
