//! Background sweep that physically deletes tables past their grace period.
//!
//! Each tick takes a registry snapshot, picks the pending entries whose
//! `reclaim_after` has been reached, and for each one runs
//! `begin_reclaim` → delete → `complete_reclaim`, or `abort_reclaim` when the
//! delete fails. Failed entries back off exponentially so a broken path is
//! not retried on every tick.
//!
//! ## Timeouts
//!
//! Every delete runs on its own task. When it outlives `delete_timeout` the
//! tick stops waiting, counts the attempt as failed and moves on, but the
//! entry stays `Reclaiming` until the delete has really returned. Only then
//! is it completed or put back to `Pending`, so an undrop can never restore a
//! table whose files are still being removed.
//!
//! ## Shutdown
//!
//! The loop only looks at the shutdown signal between ticks. A tick that is
//! running when shutdown is requested finishes first, and deletes left over
//! from earlier timeouts get one more `delete_timeout` to return.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use common::Clock;
use common::config::DroppedTablesConfig;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delete::PhysicalDelete;
use crate::entry::DroppedTableEntry;
use crate::error::RegistryError;
use crate::metrics::ReclaimMetrics;
use crate::registry::DroppedTablesRegistry;

#[derive(Debug, Clone)]
pub struct ReclaimerConfig {
    pub tick_interval: Duration,
    pub delete_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_retry_backoff: Duration,
    pub max_concurrent_deletes: usize,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self::from(&DroppedTablesConfig::default())
    }
}

impl From<&DroppedTablesConfig> for ReclaimerConfig {
    fn from(config: &DroppedTablesConfig) -> Self {
        Self {
            tick_interval: config.reclaim_tick_interval,
            delete_timeout: config.delete_timeout,
            retry_backoff: config.retry_backoff,
            max_retry_backoff: config.max_retry_backoff,
            max_concurrent_deletes: config.max_concurrent_deletes.max(1),
        }
    }
}

impl ReclaimerConfig {
    /// Delay before the next attempt after `failures` consecutive failures.
    fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.retry_backoff
            .saturating_mul(factor)
            .min(self.max_retry_backoff)
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pending entries past their deadline
    pub due: usize,
    pub reclaimed: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Due entries skipped because of an earlier failure
    pub deferred: usize,
    /// Due entries that were undropped or claimed after the snapshot
    pub lost_races: usize,
}

impl TickReport {
    pub fn is_noop(&self) -> bool {
        self.due == 0
    }
}

#[derive(Debug, Clone)]
struct RetryState {
    failures: u32,
    next_attempt_at: DateTime<Utc>,
}

enum Outcome {
    Reclaimed,
    Failed,
    TimedOut,
    LostRace,
}

/// How a delete task left its entry.
enum Resolution {
    Reclaimed,
    /// The delete succeeded but the entry was no longer tracked
    Vanished,
    Failed(anyhow::Error),
}

/// An entry this reclaimer moved to `Reclaiming`, owned by its delete task.
///
/// If the task ends without resolving it (the delete panicked, or the runtime
/// shut down and dropped the task) the entry goes back to `Pending`. Either
/// way the delete is no longer running at that point.
struct InFlightReclaim {
    registry: Arc<DroppedTablesRegistry>,
    uuid: Uuid,
    resolved: bool,
}

impl InFlightReclaim {
    fn new(registry: Arc<DroppedTablesRegistry>, uuid: Uuid) -> Self {
        Self {
            registry,
            uuid,
            resolved: false,
        }
    }

    fn complete(mut self) -> crate::Result<()> {
        self.resolved = true;
        self.registry.complete_reclaim(self.uuid)
    }

    fn abort(mut self) {
        self.resolved = true;
        if let Err(e) = self.registry.abort_reclaim(self.uuid) {
            warn!(uuid = %self.uuid, error = %e, "Failed to abort reclaim");
        }
    }
}

impl Drop for InFlightReclaim {
    fn drop(&mut self) {
        if !self.resolved {
            warn!(uuid = %self.uuid, "Delete task ended early, returning entry to pending");
            let _ = self.registry.abort_reclaim(self.uuid);
        }
    }
}

pub struct Reclaimer {
    registry: Arc<DroppedTablesRegistry>,
    deleter: Arc<dyn PhysicalDelete>,
    clock: Arc<dyn Clock>,
    config: ReclaimerConfig,
    metrics: ReclaimMetrics,
    retries: DashMap<Uuid, RetryState>,
    /// Deletes that outlived `delete_timeout` and are still running
    lingering: DashMap<Uuid, JoinHandle<Resolution>>,
}

impl Reclaimer {
    pub fn new(
        registry: Arc<DroppedTablesRegistry>,
        deleter: Arc<dyn PhysicalDelete>,
        clock: Arc<dyn Clock>,
        config: ReclaimerConfig,
    ) -> Self {
        Self {
            registry,
            deleter,
            clock,
            config,
            metrics: ReclaimMetrics::new(),
            retries: DashMap::new(),
            lingering: DashMap::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: ReclaimMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &ReclaimMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &ReclaimerConfig {
        &self.config
    }

    /// When a previously failed entry becomes eligible again, if it is backing off.
    pub fn retry_at(&self, uuid: Uuid) -> Option<DateTime<Utc>> {
        self.retries.get(&uuid).map(|state| state.next_attempt_at)
    }

    /// Consecutive delete failures recorded for an entry.
    pub fn failure_count(&self, uuid: Uuid) -> u32 {
        self.retries.get(&uuid).map_or(0, |state| state.failures)
    }

    /// Timed-out deletes not yet seen to return.
    pub fn lingering_deletes(&self) -> usize {
        self.lingering.len()
    }

    /// Run one sweep.
    pub async fn tick(&self) -> TickReport {
        self.metrics.record_tick();
        self.lingering.retain(|_, task| !task.is_finished());
        let now = self.clock.now();
        let snapshot = self.registry.snapshot();

        // Undropped or reclaimed entries no longer need retry bookkeeping
        let live: HashSet<Uuid> = snapshot.iter().map(|entry| entry.uuid()).collect();
        self.retries.retain(|uuid, _| live.contains(uuid));

        let mut report = TickReport::default();
        let mut eligible = Vec::new();
        for entry in snapshot.iter().filter(|entry| entry.is_due(now)) {
            report.due += 1;
            if self.is_backing_off(entry.uuid(), now) {
                report.deferred += 1;
                self.metrics.record_backoff_deferral();
                continue;
            }
            eligible.push(entry.uuid());
        }

        if report.is_noop() {
            debug!(tracked = snapshot.len(), "No dropped tables due for reclaim");
            return report;
        }
        self.metrics.record_due(report.due);

        let outcomes: Vec<Outcome> = futures::stream::iter(eligible)
            .map(|uuid| self.reclaim_one(uuid))
            .buffer_unordered(self.config.max_concurrent_deletes)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Reclaimed => report.reclaimed += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::TimedOut => report.timed_out += 1,
                Outcome::LostRace => report.lost_races += 1,
            }
        }

        info!(
            due = report.due,
            reclaimed = report.reclaimed,
            failed = report.failed,
            timed_out = report.timed_out,
            deferred = report.deferred,
            lost_races = report.lost_races,
            "Reclaim sweep completed"
        );

        report
    }

    fn is_backing_off(&self, uuid: Uuid, now: DateTime<Utc>) -> bool {
        self.retries
            .get(&uuid)
            .is_some_and(|state| state.next_attempt_at > now)
    }

    async fn reclaim_one(&self, uuid: Uuid) -> Outcome {
        let entry = match self.registry.begin_reclaim(uuid) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(uuid = %uuid, error = %e, "Entry changed since snapshot, skipping");
                self.metrics.record_lost_race();
                return Outcome::LostRace;
            }
        };

        let mut task = self.spawn_delete(entry);
        match tokio::time::timeout(self.config.delete_timeout, &mut task).await {
            Ok(Ok(Resolution::Reclaimed)) => {
                self.retries.remove(&uuid);
                Outcome::Reclaimed
            }
            Ok(Ok(Resolution::Vanished)) => {
                self.metrics.record_lost_race();
                Outcome::LostRace
            }
            Ok(Ok(Resolution::Failed(e))) => {
                self.metrics.record_delete_failure();
                self.record_failure(RegistryError::DeleteFailed {
                    uuid,
                    reason: format!("{e:#}"),
                });
                Outcome::Failed
            }
            Ok(Err(e)) => {
                self.metrics.record_delete_failure();
                self.record_failure(RegistryError::DeleteFailed {
                    uuid,
                    reason: format!("delete task failed: {e}"),
                });
                Outcome::Failed
            }
            Err(_) => {
                self.metrics.record_delete_timeout();
                self.record_failure(RegistryError::DeleteFailed {
                    uuid,
                    reason: format!("timed out after {:?}", self.config.delete_timeout),
                });
                warn!(uuid = %uuid, "Delete still running, entry stays reclaiming until it returns");
                self.lingering.insert(uuid, task);
                Outcome::TimedOut
            }
        }
    }

    /// Run the delete of a `Reclaiming` entry to completion on its own task.
    ///
    /// The task resolves the entry itself, so the outcome sticks even when
    /// nobody is waiting for it any more.
    fn spawn_delete(&self, entry: DroppedTableEntry) -> JoinHandle<Resolution> {
        let in_flight = InFlightReclaim::new(self.registry.clone(), entry.uuid());
        let deleter = self.deleter.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            match deleter.delete(&entry).await {
                Ok(()) => match in_flight.complete() {
                    Ok(()) => {
                        metrics.record_reclaimed();
                        Resolution::Reclaimed
                    }
                    Err(e) => {
                        warn!(uuid = %entry.uuid(), error = %e, "Deleted table vanished from registry");
                        Resolution::Vanished
                    }
                },
                Err(e) => {
                    in_flight.abort();
                    Resolution::Failed(e)
                }
            }
        })
    }

    /// Give deletes that timed out earlier one more `delete_timeout` to return.
    async fn wait_for_lingering(&self) {
        let uuids: Vec<Uuid> = self.lingering.iter().map(|task| *task.key()).collect();
        for uuid in uuids {
            let Some((_, task)) = self.lingering.remove(&uuid) else {
                continue;
            };
            if tokio::time::timeout(self.config.delete_timeout, task)
                .await
                .is_err()
            {
                warn!(uuid = %uuid, "Delete still running at shutdown, entry left reclaiming");
            }
        }
    }

    fn record_failure(&self, error: RegistryError) {
        let RegistryError::DeleteFailed { uuid, .. } = &error else {
            return;
        };
        let now = self.clock.now();

        let mut state = self.retries.entry(*uuid).or_insert(RetryState {
            failures: 0,
            next_attempt_at: now,
        });
        state.failures = state.failures.saturating_add(1);
        let delay = self.config.backoff(state.failures);
        state.next_attempt_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        warn!(
            uuid = %uuid,
            failures = state.failures,
            retry_at = %state.next_attempt_at,
            error = %error,
            "Reclaim failed, entry returned to pending"
        );
    }

    /// Tick every `tick_interval` until `shutdown` fires or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_interval = ?self.config.tick_interval,
            delete_timeout = ?self.config.delete_timeout,
            "Reclaimer started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.wait_for_lingering().await;
        info!("Reclaimer stopped");
    }

    /// Spawn [`Reclaimer::run`] on the current runtime.
    pub fn spawn(self: Arc<Self>) -> ReclaimerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        ReclaimerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a spawned reclaimer loop.
pub struct ReclaimerHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Ask the loop to stop and wait for the current tick to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.context("Reclaimer task failed")?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryState, TableIdentity};
    use crate::testing::ScriptedDeleter;
    use common::clock::ManualClock;

    const GRACE: Duration = Duration::from_secs(10);

    struct Fixture {
        registry: Arc<DroppedTablesRegistry>,
        deleter: Arc<ScriptedDeleter>,
        clock: Arc<ManualClock>,
        reclaimer: Arc<Reclaimer>,
    }

    fn config() -> ReclaimerConfig {
        ReclaimerConfig {
            tick_interval: Duration::from_millis(100),
            delete_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(60),
            max_retry_backoff: Duration::from_secs(600),
            max_concurrent_deletes: 4,
        }
    }

    fn fixture_with(deleter: ScriptedDeleter) -> Fixture {
        let registry = Arc::new(DroppedTablesRegistry::new());
        let deleter = Arc::new(deleter);
        let clock = Arc::new(ManualClock::at_epoch());
        let reclaimer = Arc::new(Reclaimer::new(
            registry.clone(),
            deleter.clone(),
            clock.clone(),
            config(),
        ));
        Fixture {
            registry,
            deleter,
            clock,
            reclaimer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedDeleter::new())
    }

    impl Fixture {
        fn drop_table(&self, name: &str) -> (Uuid, String) {
            let uuid = Uuid::new_v4();
            let path = format!("store/{name}");
            self.registry
                .mark_dropped(
                    TableIdentity::new("db", name, uuid),
                    path.clone(),
                    self.clock.now(),
                    GRACE,
                )
                .unwrap();
            (uuid, path)
        }

        fn at(&self, secs: i64) {
            self.clock.set(DateTime::from_timestamp(secs, 0).unwrap());
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = config();
        assert_eq!(config.backoff(1), Duration::from_secs(60));
        assert_eq!(config.backoff(2), Duration::from_secs(120));
        assert_eq!(config.backoff(3), Duration::from_secs(240));
        assert_eq!(config.backoff(5), Duration::from_secs(600));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_tick_with_nothing_due_is_noop() {
        let f = fixture();
        f.drop_table("t1");
        f.at(5);

        let report = f.reclaimer.tick().await;
        assert!(report.is_noop());
        assert!(f.deleter.calls().is_empty());
        assert_eq!(f.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_due_entry_is_reclaimed() {
        let f = fixture();
        let (uuid, path) = f.drop_table("t1");
        f.at(11);

        let report = f.reclaimer.tick().await;
        assert_eq!(report.due, 1);
        assert_eq!(report.reclaimed, 1);
        assert_eq!(f.deleter.calls(), vec![path.clone()]);
        assert!(f.deleter.is_deleted(&path));
        assert!(!f.registry.contains(uuid));
        assert_eq!(f.reclaimer.metrics().entries_reclaimed(), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_inclusive() {
        let f = fixture();
        let (uuid, _) = f.drop_table("t1");

        f.at(9);
        assert!(f.reclaimer.tick().await.is_noop());
        assert!(f.registry.contains(uuid));

        f.at(10);
        assert_eq!(f.reclaimer.tick().await.reclaimed, 1);
        assert!(!f.registry.contains(uuid));
    }

    #[tokio::test]
    async fn test_failed_delete_reverts_to_pending_and_backs_off() {
        let f = fixture();
        let (uuid, path) = f.drop_table("t2");
        f.deleter.fail_next(&path, 2);

        f.at(11);
        let report = f.reclaimer.tick().await;
        assert_eq!(report.failed, 1);
        assert_eq!(f.registry.get(uuid).unwrap().state(), EntryState::Pending);
        assert_eq!(f.reclaimer.failure_count(uuid), 1);
        assert_eq!(
            f.reclaimer.retry_at(uuid),
            DateTime::from_timestamp(71, 0)
        );

        // Still inside the backoff window
        f.at(12);
        let report = f.reclaimer.tick().await;
        assert_eq!(report.deferred, 1);
        assert_eq!(f.deleter.call_count(&path), 1);

        f.at(71);
        assert_eq!(f.reclaimer.tick().await.failed, 1);
        assert_eq!(f.reclaimer.failure_count(uuid), 2);
        assert_eq!(
            f.reclaimer.retry_at(uuid),
            DateTime::from_timestamp(191, 0)
        );

        f.at(190);
        assert_eq!(f.reclaimer.tick().await.deferred, 1);

        f.at(191);
        assert_eq!(f.reclaimer.tick().await.reclaimed, 1);
        assert!(!f.registry.contains(uuid));
        assert_eq!(f.reclaimer.retry_at(uuid), None);
        assert_eq!(f.deleter.call_count(&path), 3);
    }

    #[tokio::test]
    async fn test_undrop_after_failure_stops_retries() {
        let f = fixture();
        let (uuid, path) = f.drop_table("t2");
        f.deleter.fail_next(&path, 1);

        f.at(11);
        assert_eq!(f.reclaimer.tick().await.failed, 1);

        f.at(12);
        f.registry.undrop(uuid).unwrap();

        f.at(10_000);
        let report = f.reclaimer.tick().await;
        assert!(report.is_noop());
        assert_eq!(f.deleter.call_count(&path), 1);
        assert_eq!(f.reclaimer.failure_count(uuid), 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let f = fixture();
        let (bad, bad_path) = f.drop_table("bad");
        let (good, _) = f.drop_table("good");
        f.deleter.fail_next(&bad_path, 1);

        f.at(11);
        let report = f.reclaimer.tick().await;
        assert_eq!(report.due, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.reclaimed, 1);
        assert!(f.registry.contains(bad));
        assert!(!f.registry.contains(good));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_delete_times_out_but_stays_reclaiming() {
        let f = fixture();
        let (uuid, path) = f.drop_table("slow");
        f.deleter.hang_on(&path);

        f.at(11);
        let report = f.reclaimer.tick().await;
        assert_eq!(report.timed_out, 1);
        assert_eq!(f.reclaimer.metrics().delete_timeouts(), 1);
        assert_eq!(f.reclaimer.failure_count(uuid), 1);
        assert_eq!(f.reclaimer.lingering_deletes(), 1);

        // The delete is still running, so the table cannot come back
        assert_eq!(f.registry.get(uuid).unwrap().state(), EntryState::Reclaiming);
        assert_eq!(f.registry.undrop(uuid), Err(RegistryError::InProgress(uuid)));

        f.at(10_000);
        assert!(f.reclaimer.tick().await.is_noop());
        assert_eq!(f.deleter.call_count(&path), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delete_completes_after_timeout() {
        let f = fixture();
        let (uuid, path) = f.drop_table("t1");
        f.deleter.stall_next(&path, Duration::from_secs(30));

        f.at(11);
        assert_eq!(f.reclaimer.tick().await.timed_out, 1);
        assert!(f.deleter.is_deleted(&path));
        assert_eq!(f.registry.undrop(uuid), Err(RegistryError::InProgress(uuid)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!f.registry.contains(uuid));
        assert_eq!(f.reclaimer.metrics().entries_reclaimed(), 1);

        f.at(11 + 60);
        assert!(f.reclaimer.tick().await.is_noop());
        assert_eq!(f.reclaimer.lingering_deletes(), 0);
        assert_eq!(f.deleter.call_count(&path), 1);
        assert_eq!(f.deleter.repeat_deletes(&path), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undrop_mid_reclaim_is_refused() {
        let f = fixture_with(ScriptedDeleter::new().with_delay(Duration::from_secs(1)));
        let (uuid, path) = f.drop_table("t1");
        f.at(11);

        let tick = tokio::spawn({
            let reclaimer = f.reclaimer.clone();
            async move { reclaimer.tick().await }
        });
        while f.deleter.call_count(&path) == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(f.registry.undrop(uuid), Err(RegistryError::InProgress(uuid)));

        let report = tick.await.unwrap();
        assert_eq!(report.reclaimed, 1);
        assert!(!f.registry.contains(uuid));
        assert_eq!(f.deleter.call_count(&path), 1);
        assert_eq!(f.deleter.repeat_deletes(&path), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tick_keeps_entry_until_delete_returns() {
        let f = fixture_with(ScriptedDeleter::new().with_delay(Duration::from_secs(1)));
        let (uuid, path) = f.drop_table("t1");
        f.at(11);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), f.reclaimer.tick()).await;
        assert!(cancelled.is_err());
        assert_eq!(f.registry.get(uuid).unwrap().state(), EntryState::Reclaiming);
        assert_eq!(f.registry.undrop(uuid), Err(RegistryError::InProgress(uuid)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(f.deleter.is_deleted(&path));
        assert!(!f.registry.contains(uuid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_reclaims_and_shuts_down() {
        let f = fixture();
        let (uuid, _) = f.drop_table("t1");
        f.at(11);

        let handle = f.reclaimer.clone().spawn();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!f.registry.contains(uuid));
        assert!(f.reclaimer.metrics().ticks() >= 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_delete() {
        let f = fixture_with(ScriptedDeleter::new().with_delay(Duration::from_secs(2)));
        let (uuid, path) = f.drop_table("t1");
        f.at(11);

        let handle = f.reclaimer.clone().spawn();
        while f.deleter.call_count(&path) == 0 {
            tokio::task::yield_now().await;
        }

        handle.shutdown().await.unwrap();
        assert!(f.deleter.is_deleted(&path));
        assert!(!f.registry.contains(uuid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_timed_out_delete() {
        let f = fixture();
        let (uuid, path) = f.drop_table("t1");
        f.deleter.stall_next(&path, Duration::from_secs(8));
        f.at(11);

        let handle = f.reclaimer.clone().spawn();
        while f.deleter.call_count(&path) == 0 {
            tokio::task::yield_now().await;
        }

        handle.shutdown().await.unwrap();
        assert_eq!(f.reclaimer.metrics().delete_timeouts(), 1);
        assert!(f.deleter.is_deleted(&path));
        assert!(!f.registry.contains(uuid));
    }
}
