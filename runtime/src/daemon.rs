//! Supervised acquisition loop.
//!
//! One tick is acquire → commit → metrics (→ alert). Ticks are separated by
//! an interruptible sleep. Nothing that happens inside a tick stops the loop;
//! only the shutdown signal or run-once mode does.

use crate::acquisition::RecordSource;
use crate::alert::AlertSink;
use crate::config::DaemonConfig;
use crate::store::{SnapshotStore, StoreError, WriteReceipt};
use crate::types::{CanonicalRecord, DaemonMetrics};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const FAILURE_ALERT_TITLE: &str = "Scrape daemon failing";
pub const SUCCESS_ALERT_TITLE: &str = "Scrape successful";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DaemonState {
    Idle,
    Acquiring,
    Committing,
    Sleeping,
    ShuttingDown,
}

/// Counters carried from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonTracker {
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Cooperative shutdown flag shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a commit did with one batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommitOutcome {
    /// Nothing acquired; the canonical snapshot was left alone.
    Empty { marker: PathBuf },
    Written(WriteReceipt),
}

/// Apply the write policy to one batch: an empty batch only leaves a marker,
/// a non-empty one backs up the previous snapshot and replaces it.
pub fn commit_records(
    store: &SnapshotStore,
    records: Vec<CanonicalRecord>,
    now: DateTime<Utc>,
) -> Result<CommitOutcome, StoreError> {
    if records.is_empty() {
        let marker = store.write_empty_marker(now)?;
        return Ok(CommitOutcome::Empty { marker });
    }
    Ok(CommitOutcome::Written(store.write_snapshot(records, now)?))
}

/// One acquisition plus commit outside the loop. Metrics and alerts are
/// left to the loop.
pub async fn trigger_once(source: &dyn RecordSource, store: &SnapshotStore) -> Result<CommitOutcome> {
    let records = source.acquire().await?;
    let outcome = commit_records(store, records, Utc::now())?;
    Ok(outcome)
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Empty,
    Committed { count: usize, persisted: bool },
    Failed { streak: u32, alerted: bool },
}

pub struct Daemon {
    config: DaemonConfig,
    source: Arc<dyn RecordSource>,
    store: SnapshotStore,
    alerts: Arc<dyn AlertSink>,
    shutdown: ShutdownSignal,
    tracker: DaemonTracker,
    state: DaemonState,
}

impl Daemon {
    pub fn new(
        config: DaemonConfig,
        source: Arc<dyn RecordSource>,
        store: SnapshotStore,
        alerts: Arc<dyn AlertSink>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            config,
            source,
            store,
            alerts,
            shutdown,
            tracker: DaemonTracker::default(),
            state: DaemonState::Idle,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn tracker(&self) -> &DaemonTracker {
        &self.tracker
    }

    fn enter(&mut self, state: DaemonState) {
        debug!(from = ?self.state, to = ?state, "daemon state");
        self.state = state;
    }

    /// Run ticks until shutdown, or once in run-once mode.
    pub async fn run(&mut self) -> DaemonTracker {
        info!(
            interval_secs = self.config.interval.as_secs(),
            run_once = self.config.run_once,
            failure_threshold = self.config.failure_threshold,
            "acquisition daemon starting"
        );

        while !self.shutdown.is_triggered() {
            let outcome = self.tick().await;
            debug!(?outcome, "tick finished");
            if self.config.run_once {
                break;
            }
            self.enter(DaemonState::Sleeping);
            self.sleep_interval().await;
        }

        self.enter(DaemonState::ShuttingDown);
        info!("acquisition daemon exiting");
        self.tracker.clone()
    }

    /// Sleep for the configured interval in poll-sized steps, returning early
    /// on shutdown.
    async fn sleep_interval(&self) {
        let step = self.config.poll_interval.max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;
        while !self.shutdown.is_triggered() && waited < self.config.interval {
            let nap = step.min(self.config.interval - waited);
            tokio::time::sleep(nap).await;
            waited += nap;
        }
    }

    /// One acquire and commit cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.enter(DaemonState::Idle);
        self.enter(DaemonState::Acquiring);
        let acquired = self.source.acquire().await;
        self.enter(DaemonState::Committing);
        let now = Utc::now();

        match acquired {
            Ok(records) => self.commit(records, now).await,
            Err(e) => self.record_failure(e, now).await,
        }
    }

    async fn commit(&mut self, records: Vec<CanonicalRecord>, now: DateTime<Utc>) -> TickOutcome {
        let count = records.len();
        let persisted = match commit_records(&self.store, records, now) {
            Ok(CommitOutcome::Empty { marker }) => {
                warn!(marker = %marker.display(), "acquired no records, keeping existing snapshot");
                true
            }
            Ok(CommitOutcome::Written(receipt)) => {
                info!(
                    count,
                    backup = receipt.backup.as_deref().unwrap_or("none"),
                    "snapshot written"
                );
                true
            }
            Err(e) => {
                error!(count, "persisting acquisition failed: {e}");
                false
            }
        };

        if count == 0 {
            self.write_metrics(now, 0);
            return TickOutcome::Empty;
        }

        self.tracker.consecutive_failures = 0;
        if persisted {
            self.tracker.last_success_at = Some(now);
        }
        self.write_metrics(now, count);

        let min_count = self.config.alert_on_success_min_count.max(1);
        if self.config.alert_on_success && count >= min_count {
            let body = format!("Successful scrape: {count} records at {}", now.to_rfc3339());
            let result = self.alerts.send(SUCCESS_ALERT_TITLE, &body).await;
            info!(result = %result.summary(), "success alert");
        } else {
            debug!(
                count,
                min_count,
                enabled = self.config.alert_on_success,
                "success alert suppressed"
            );
        }

        TickOutcome::Committed { count, persisted }
    }

    async fn record_failure(&mut self, err: anyhow::Error, now: DateTime<Utc>) -> TickOutcome {
        self.tracker.consecutive_failures += 1;
        let streak = self.tracker.consecutive_failures;
        let threshold = self.config.failure_threshold.max(1);
        error!(streak, threshold, "acquisition failed: {err:#}");

        let mut alerted = false;
        if streak >= threshold {
            let body = format!("Daemon has failed {streak} times in a row. Error: {err:#}");
            let result = self.alerts.send(FAILURE_ALERT_TITLE, &body).await;
            info!(result = %result.summary(), "failure alert");
            self.tracker.consecutive_failures = 0;
            alerted = true;
        }

        self.write_metrics(now, 0);
        TickOutcome::Failed { streak, alerted }
    }

    fn write_metrics(&self, now: DateTime<Utc>, count: usize) {
        let metrics = DaemonMetrics {
            last_scrape: now,
            last_count: count,
            consecutive_failures: self.tracker.consecutive_failures,
            last_success_at: self.tracker.last_success_at,
        };
        if let Err(e) = self.store.write_metrics(&metrics) {
            error!("writing daemon metrics failed: {e}");
        }
    }
}
