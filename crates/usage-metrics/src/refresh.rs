//! Refresh loop — republishes the usage ledger into the counter caches.
//!
//! Each cycle takes one read snapshot, walks every record in key order and
//! hands well-formed ones to the [`CounterRouter`]. Nothing that happens
//! inside a cycle stops the loop: a failed snapshot skips the cycle, a
//! malformed record skips the record.

use std::borrow::Cow;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use usage_state::{RawRecord, StateError, UsageRecord, UsageSource};

use crate::router::CounterRouter;

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Records read from the snapshot.
    pub visited: u64,
    /// Records routed into a cache.
    pub applied: u64,
    /// Records skipped for a bad value length.
    pub malformed: u64,
    /// Records the cursor failed to read.
    pub unreadable: u64,
}

/// Periodically copies ledger records into counter caches.
pub struct RefreshLoop<S> {
    source: S,
    router: CounterRouter,
    interval: Duration,
}

impl<S: UsageSource> RefreshLoop<S> {
    pub fn new(source: S, router: CounterRouter, interval: Duration) -> Self {
        Self {
            source,
            router,
            interval,
        }
    }

    /// Run one refresh cycle.
    ///
    /// Returns `None` when no snapshot could be taken and the cycle was skipped.
    pub fn refresh_once(&self) -> Option<CycleStats> {
        let snapshot = match self.source.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "usage snapshot failed, skipping cycle");
                return None;
            }
        };
        let records = match snapshot.records() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "usage cursor failed, skipping cycle");
                return None;
            }
        };

        let mut stats = CycleStats::default();
        for entry in records {
            let record = match entry {
                Ok(record) => record,
                Err(e) => {
                    stats.unreadable += 1;
                    warn!(error = %e, "failed to read usage record");
                    continue;
                }
            };
            stats.visited += 1;
            match self.apply(&record) {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    stats.malformed += 1;
                    let key = String::from_utf8_lossy(&record.key);
                    debug!(%key, error = %e, "skipping malformed usage record");
                }
            }
        }

        debug!(
            visited = stats.visited,
            applied = stats.applied,
            malformed = stats.malformed,
            unreadable = stats.unreadable,
            "usage refresh cycle complete"
        );
        Some(stats)
    }

    fn apply(&self, record: &RawRecord) -> Result<(), StateError> {
        let usage = UsageRecord::decode(&record.value)?;
        let key = String::from_utf8_lossy(&record.key);
        if matches!(key, Cow::Owned(_)) {
            debug!(%key, "usage key is not valid UTF-8, publishing lossy name");
        }
        self.router.route(&key, usage.used_bytes, usage.num_objects);
        Ok(())
    }

    /// Refresh, then sleep, until the shutdown signal flips or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "usage refresh loop started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.refresh_once();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        info!("usage refresh loop stopped");
    }
}
