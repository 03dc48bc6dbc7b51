// src/sync/mod.rs
//! Idempotent upsert of the curated event list into a remote calendar.
//!
//! 1) discovery: list remote items over the lookahead window, stretched to
//!    cover every incoming event, and index the ones carrying our
//!    `(source, source_id)` metadata
//! 2) diff: matched → update (full overwrite), unmatched → create
//! 3) dispatch in sequential batches; a failed write is recorded against its
//!    event and its batch, and every other write still goes out
//!
//! Only configuration or authentication problems come back as `Err`.

pub mod google;
pub mod memory;
pub mod store;

pub use google::GoogleCalendarStore;
pub use memory::MemoryStore;
pub use store::{CalendarStore, EventPayload, RemoteItem, TimeWindow};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::event::{Event, ReconciliationKey};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("GOOGLE_CALENDAR_ID is not set")]
    MissingCalendarId,
    #[error("service account credentials are not set")]
    MissingCredentials,
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid calendar url: {0}")]
    InvalidUrl(String),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("calendar api returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// What to do with our remote items whose key is no longer in the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    #[default]
    Keep,
    Delete,
}

/// How much of the remote calendar discovery reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// One query over `[now, now + lookahead)`, widened to every incoming event.
    #[default]
    Window,
    /// One query per calendar date the incoming events start on.
    TouchedDates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub lookahead: chrono::Duration,
    pub batch_size: usize,
    /// Pause between batches; zero disables it.
    pub batch_delay: Duration,
    pub stale_policy: StalePolicy,
    pub discovery: DiscoveryMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            lookahead: chrono::Duration::days(35),
            batch_size: 50,
            batch_delay: Duration::from_millis(200),
            stale_policy: StalePolicy::Keep,
            discovery: DiscoveryMode::Window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Created { remote_id: String },
    Updated { remote_id: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub key: ReconciliationKey,
    pub title: String,
    pub outcome: OpOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    FullySynced,
    Partial { failed: usize },
    NothingSynced,
}

/// One entry per input event, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub entries: Vec<SyncEntry>,
    /// Discovery query units that failed (their items are treated as unknown).
    pub discovery_failures: usize,
    /// Stale items removed under `StalePolicy::Delete`.
    pub deleted: usize,
    pub delete_failures: usize,
    /// Batch numbers (from 0) with at least one failed write.
    pub failed_batches: Vec<usize>,
}

impl SyncReport {
    fn count(&self, f: impl Fn(&OpOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| f(&e.outcome)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, OpOutcome::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, OpOutcome::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, OpOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, OpOutcome::Failed { .. }))
    }

    /// No failures → fully synced; failures and no writes → nothing synced.
    pub fn status(&self) -> SyncStatus {
        let failed = self.failed();
        if failed == 0 {
            SyncStatus::FullySynced
        } else if self.created() + self.updated() == 0 {
            SyncStatus::NothingSynced
        } else {
            SyncStatus::Partial { failed }
        }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_created_total", "Remote items created.");
        describe_counter!("sync_updated_total", "Remote items updated in place.");
        describe_counter!("sync_failed_total", "Create/update operations that failed.");
        describe_counter!("sync_discovery_failures_total", "Failed discovery queries.");
    });
}

/// A remote item that carries our key.
#[derive(Debug, Clone)]
struct Known {
    id: String,
    source: Option<String>,
    source_id: String,
}

#[derive(Debug, Default)]
struct Discovered {
    by_source_id: HashMap<String, Vec<Known>>,
    failures: usize,
}

impl Discovered {
    fn add(&mut self, item: RemoteItem) {
        let Some(source_id) = item.source_id.filter(|s| !s.is_empty()) else {
            return;
        };
        let bucket = self.by_source_id.entry(source_id.clone()).or_default();
        if bucket.iter().any(|k| k.id == item.id) {
            return;
        }
        bucket.push(Known {
            id: item.id,
            source: item.source,
            source_id,
        });
    }

    /// Same `source_id`, and a stored source tag that is absent or equal.
    fn lookup(&self, key: &ReconciliationKey) -> Option<&Known> {
        let bucket = self.by_source_id.get(&key.source_id)?;
        let tag = key.source.as_str();
        bucket
            .iter()
            .find(|k| k.source.as_deref() == Some(tag))
            .or_else(|| bucket.iter().find(|k| k.source.is_none()))
    }

    fn all(&self) -> impl Iterator<Item = &Known> {
        self.by_source_id.values().flatten()
    }
}

enum Op {
    Create,
    Update(String),
}

struct Planned {
    index: usize,
    op: Op,
    payload: EventPayload,
}

pub struct Reconciler {
    store: Arc<dyn CalendarStore>,
    options: SyncOptions,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CalendarStore>, options: SyncOptions) -> Self {
        let batch_size = options.batch_size.max(1);
        Self {
            store,
            options: SyncOptions {
                batch_size,
                ..options
            },
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub async fn sync(&self, events: &[Event]) -> Result<SyncReport, SyncError> {
        self.sync_at(events, Utc::now()).await
    }

    /// `sync` with an explicit "now" for the discovery window.
    pub async fn sync_at(
        &self,
        events: &[Event],
        now: DateTime<Utc>,
    ) -> Result<SyncReport, SyncError> {
        ensure_metrics_described();
        self.store.authenticate().await?;

        let discovered = self.discover(events, now).await;
        let mut report = SyncReport {
            discovery_failures: discovered.failures,
            ..SyncReport::default()
        };

        let mut outcomes: Vec<Option<OpOutcome>> = vec![None; events.len()];
        let mut plan = Vec::with_capacity(events.len());
        let mut claimed: HashSet<ReconciliationKey> = HashSet::new();
        for (index, ev) in events.iter().enumerate() {
            if ev.source_id.trim().is_empty() {
                outcomes[index] = Some(OpOutcome::Skipped {
                    reason: "empty source_id".to_string(),
                });
                continue;
            }
            let key = ev.reconciliation_key();
            if !claimed.insert(key.clone()) {
                outcomes[index] = Some(OpOutcome::Skipped {
                    reason: "duplicate reconciliation key in input".to_string(),
                });
                continue;
            }
            let op = match discovered.lookup(&key) {
                Some(known) => Op::Update(known.id.clone()),
                None => Op::Create,
            };
            plan.push(Planned {
                index,
                op,
                payload: EventPayload::from_event(ev),
            });
        }

        self.dispatch(plan, &mut outcomes, &mut report.failed_batches).await;

        report.entries = events
            .iter()
            .zip(outcomes)
            .map(|(ev, outcome)| SyncEntry {
                key: ev.reconciliation_key(),
                title: ev.title.clone(),
                outcome: outcome.unwrap_or_else(|| OpOutcome::Skipped {
                    reason: "not dispatched".to_string(),
                }),
            })
            .collect();

        if self.options.stale_policy == StalePolicy::Delete {
            self.delete_stale(&discovered, &claimed, &mut report).await;
        }

        counter!("sync_created_total").increment(report.created() as u64);
        counter!("sync_updated_total").increment(report.updated() as u64);
        counter!("sync_failed_total").increment(report.failed() as u64);
        tracing::info!(
            target: "sync",
            created = report.created(),
            updated = report.updated(),
            skipped = report.skipped(),
            failed = report.failed(),
            deleted = report.deleted,
            discovery_failures = report.discovery_failures,
            "sync finished"
        );
        Ok(report)
    }

    fn discovery_windows(&self, events: &[Event], now: DateTime<Utc>) -> Vec<TimeWindow> {
        match self.options.discovery {
            DiscoveryMode::Window => {
                // Zero-length items sitting on an edge still intersect.
                let edge = chrono::Duration::minutes(1);
                let start = events
                    .iter()
                    .map(|e| e.start().with_timezone(&Utc) - edge)
                    .fold(now, |a, b| a.min(b));
                let end = events
                    .iter()
                    .map(|e| e.end().with_timezone(&Utc) + edge)
                    .fold(now + self.options.lookahead, |a, b| a.max(b));
                vec![TimeWindow::new(start, end)]
            }
            DiscoveryMode::TouchedDates => events
                .iter()
                .map(Event::start_date)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter_map(TimeWindow::for_date)
                .collect(),
        }
    }

    async fn discover(&self, events: &[Event], now: DateTime<Utc>) -> Discovered {
        let mut discovered = Discovered::default();
        for window in self.discovery_windows(events, now) {
            match self.store.list(window).await {
                Ok(items) => items.into_iter().for_each(|i| discovered.add(i)),
                Err(e) => {
                    discovered.failures += 1;
                    counter!("sync_discovery_failures_total").increment(1);
                    tracing::warn!(
                        target: "sync",
                        start = %window.start,
                        end = %window.end,
                        error = %e,
                        "discovery failed; items in this window are treated as unknown"
                    );
                }
            }
        }
        tracing::debug!(
            target: "sync",
            known = discovered.all().count(),
            failures = discovered.failures,
            "discovery done"
        );
        discovered
    }

    async fn pause_between_batches(&self, batch_no: usize) {
        if batch_no > 0 && !self.options.batch_delay.is_zero() {
            tokio::time::sleep(self.options.batch_delay).await;
        }
    }

    async fn dispatch(
        &self,
        plan: Vec<Planned>,
        outcomes: &mut [Option<OpOutcome>],
        failed_batches: &mut Vec<usize>,
    ) {
        for (batch_no, batch) in plan.chunks(self.options.batch_size).enumerate() {
            self.pause_between_batches(batch_no).await;

            let mut failed = 0usize;
            for item in batch {
                let outcome = match self.apply(item).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(
                            target: "sync",
                            batch = batch_no,
                            title = %item.payload.summary,
                            error = %e,
                            "write failed"
                        );
                        failed += 1;
                        OpOutcome::Failed {
                            error: format!("batch {batch_no}: {e}"),
                        }
                    }
                };
                outcomes[item.index] = Some(outcome);
            }
            if failed > 0 {
                tracing::warn!(target: "sync", batch = batch_no, failed, size = batch.len(), "batch had failures");
                failed_batches.push(batch_no);
            }
        }
    }

    async fn apply(&self, item: &Planned) -> Result<OpOutcome, SyncError> {
        match &item.op {
            Op::Create => {
                let remote_id = self.store.insert(&item.payload).await?;
                Ok(OpOutcome::Created { remote_id })
            }
            Op::Update(id) => {
                self.store.update(id, &item.payload).await?;
                Ok(OpOutcome::Updated {
                    remote_id: id.clone(),
                })
            }
        }
    }

    async fn delete_stale(
        &self,
        discovered: &Discovered,
        incoming: &HashSet<ReconciliationKey>,
        report: &mut SyncReport,
    ) {
        let incoming_ids: HashSet<&str> = incoming.iter().map(|k| k.source_id.as_str()).collect();
        let mut stale: Vec<&Known> = discovered
            .all()
            .filter(|k| match k.source.as_deref().and_then(|s| s.parse().ok()) {
                Some(source) => !incoming.contains(&ReconciliationKey {
                    source,
                    source_id: k.source_id.clone(),
                }),
                None => !incoming_ids.contains(k.source_id.as_str()),
            })
            .collect();
        stale.sort_by(|a, b| a.id.cmp(&b.id));

        for (batch_no, batch) in stale.chunks(self.options.batch_size).enumerate() {
            self.pause_between_batches(batch_no).await;
            for known in batch {
                match self.store.delete(&known.id).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        tracing::warn!(target: "sync", batch = batch_no, id = %known.id, error = %e, "stale delete failed");
                        report.delete_failures += 1;
                    }
                }
            }
        }
        if report.deleted > 0 {
            tracing::info!(target: "sync", deleted = report.deleted, "removed stale items");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, MONTREAL};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn ev(title: &str, source_id: &str, day: u32) -> Event {
        let start = MONTREAL.with_ymd_and_hms(2025, 6, day, 19, 0, 0).unwrap();
        Event::new(title, start, start + ChronoDuration::hours(2), EventSource::VilleMtl, source_id)
            .unwrap()
    }

    fn opts() -> SyncOptions {
        SyncOptions {
            batch_delay: Duration::ZERO,
            ..SyncOptions::default()
        }
    }

    #[tokio::test]
    async fn empty_source_id_is_skipped_not_sent() {
        let store = Arc::new(MemoryStore::new());
        let rec = Reconciler::new(store.clone(), opts());
        let report = rec.sync_at(&[ev("No id", " ", 3)], now()).await.unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(store.calls().insert, 0);
        assert_eq!(report.status(), SyncStatus::FullySynced);
    }

    #[tokio::test]
    async fn repeated_key_in_input_is_written_once() {
        let store = Arc::new(MemoryStore::new());
        let rec = Reconciler::new(store.clone(), opts());
        let report = rec
            .sync_at(&[ev("A", "same", 3), ev("A again", "same", 4)], now())
            .await
            .unwrap();
        assert_eq!(report.created(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn foreign_items_are_never_matched() {
        let store = Arc::new(MemoryStore::new());
        store.insert_foreign(EventPayload::from_event(&ev("Mine?", "x-1", 3)));
        let rec = Reconciler::new(store.clone(), opts());
        let report = rec.sync_at(&[ev("Mine?", "x-1", 3)], now()).await.unwrap();
        assert_eq!(report.created(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn source_tag_mismatch_is_not_matched() {
        let store = Arc::new(MemoryStore::new());
        let rec = Reconciler::new(store.clone(), opts());
        rec.sync_at(&[ev("City", "42", 3)], now()).await.unwrap();

        let mut other = ev("Blog", "42", 3);
        other.source = EventSource::MtlBlog;
        let report = rec.sync_at(&[other], now()).await.unwrap();
        assert_eq!(report.created(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn discovery_failure_is_counted_and_degrades_to_create() {
        let store = Arc::new(MemoryStore::new().failing_list());
        let rec = Reconciler::new(store.clone(), opts());
        let report = rec.sync_at(&[ev("A", "a", 3)], now()).await.unwrap();
        assert_eq!(report.discovery_failures, 1);
        assert_eq!(report.created(), 1);
    }

    #[tokio::test]
    async fn touched_dates_queries_each_start_date_once() {
        let store = Arc::new(MemoryStore::new());
        let rec = Reconciler::new(
            store.clone(),
            SyncOptions {
                discovery: DiscoveryMode::TouchedDates,
                ..opts()
            },
        );
        rec.sync_at(&[ev("A", "a", 3), ev("B", "b", 3), ev("C", "c", 5)], now())
            .await
            .unwrap();
        assert_eq!(store.calls().list, 2);

        let report = rec
            .sync_at(&[ev("A", "a", 3), ev("B", "b", 3), ev("C", "c", 5)], now())
            .await
            .unwrap();
        assert_eq!(report.updated(), 3);
    }

    #[test]
    fn status_rules() {
        let entry = |outcome| SyncEntry {
            key: ReconciliationKey {
                source: EventSource::Reddit,
                source_id: "k".into(),
            },
            title: "t".into(),
            outcome,
        };
        let ok = entry(OpOutcome::Created { remote_id: "1".into() });
        let bad = entry(OpOutcome::Failed { error: "x".into() });

        let mut r = SyncReport::default();
        assert_eq!(r.status(), SyncStatus::FullySynced);
        r.entries = vec![ok.clone(), bad.clone()];
        assert_eq!(r.status(), SyncStatus::Partial { failed: 1 });
        r.entries = vec![bad.clone(), bad];
        assert_eq!(r.status(), SyncStatus::NothingSynced);
    }
}
