//! Periodic eviction of idle limiters and lapsed bans.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::admission::middleware::AdmissionControl;
use crate::observability::metrics;

/// Background task that keeps the admission maps bounded.
///
/// Each tick sweeps all three limiter registries with an idle threshold of
/// twice the tick interval, plus the brute-force tracker for lapsed bans.
/// The task exits when the shutdown signal fires; sweeping runs concurrently
/// with live admission and only ever holds a map shard for the duration of
/// one traversal.
pub struct CleanupScheduler {
    control: Arc<AdmissionControl>,
    interval: Duration,
}

impl CleanupScheduler {
    pub fn new(control: Arc<AdmissionControl>, interval: Duration) -> Self {
        Self { control, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Cleanup scheduler starting"
        );

        let idle_threshold = self.interval * 2;
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; consume it
        // so the first sweep happens one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (limiters, bans) = self.control.sweep(idle_threshold);
                    if limiters > 0 || bans > 0 {
                        metrics::record_sweep(limiters, bans);
                        tracing::debug!(
                            limiters_removed = limiters,
                            bans_removed = bans,
                            "Cleanup pass evicted stale entries"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cleanup scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
