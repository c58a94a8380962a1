use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, TxHash};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::ledger::models::{AttendanceSession, EventKind, LedgerEvent};

/// Merge point for the backfilled and live event sources.
///
/// The store holds the best-known timeline for one ledger address, ordered
/// by `(block_number, log_index)` descending. Records are never mutated or
/// removed after insertion; `(tx_hash, log_index)` is the sole identity
/// used to reject duplicates. Single writer, any number of read-only
/// observers.
pub struct HistoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    timeline: Vec<LedgerEvent>,
    seen: HashSet<(TxHash, u64)>,
    /// Upper bound of the backfilled block range, once applied.
    baseline: Option<u64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Establish the baseline timeline from a completed backfill. Callable
    /// exactly once per session.
    pub async fn apply_historical(
        &self,
        records: Vec<LedgerEvent>,
        max_block: u64,
    ) -> AppResult<usize> {
        let mut inner = self.inner.write().await;
        if inner.baseline.is_some() {
            return Err(AppError::Internal(
                "historical baseline already applied for this session".to_string(),
            ));
        }

        let mut timeline: Vec<LedgerEvent> = Vec::with_capacity(records.len());
        for record in records {
            if inner.seen.insert(record.identity()) {
                timeline.push(record);
            }
        }
        timeline.sort_by(|a, b| b.ord_key().cmp(&a.ord_key()));

        let applied = timeline.len();
        inner.timeline = timeline;
        inner.baseline = Some(max_block);
        Ok(applied)
    }

    /// Insert one live record. Idempotent re-delivery is expected from the
    /// live channel: anything already present by identity, or at or below
    /// the backfilled range, is a silent no-op. Returns whether the record
    /// was admitted.
    pub async fn apply_live(&self, record: LedgerEvent) -> bool {
        let mut inner = self.inner.write().await;

        let Some(baseline) = inner.baseline else {
            warn!(
                "Live record {:?} delivered before the backfill baseline; dropping",
                record.identity()
            );
            return false;
        };
        if record.block_number <= baseline {
            debug!(
                "Live record {:?} at block {} is inside the backfilled range; dropping",
                record.identity(),
                record.block_number
            );
            return false;
        }
        if inner.seen.contains(&record.identity()) {
            return false;
        }

        inner.seen.insert(record.identity());
        let key = record.ord_key();
        let position = inner
            .timeline
            .partition_point(|existing| existing.ord_key() > key);
        inner.timeline.insert(position, record);
        true
    }

    pub async fn baseline(&self) -> Option<u64> {
        self.inner.read().await.baseline
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.timeline.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the full timeline, newest first.
    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.inner.read().await.timeline.clone()
    }

    pub async fn events_of_kind(&self, kind: EventKind) -> Vec<LedgerEvent> {
        self.inner
            .read()
            .await
            .timeline
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }

    /// Fixed-size page over the (optionally kind-filtered) timeline.
    pub async fn page(
        &self,
        page: usize,
        page_size: usize,
        kind: Option<EventKind>,
    ) -> Vec<LedgerEvent> {
        if page_size == 0 {
            return Vec::new();
        }
        let inner = self.inner.read().await;
        inner
            .timeline
            .iter()
            .filter(|event| kind.map_or(true, |k| event.kind == k))
            .skip(page * page_size)
            .take(page_size)
            .cloned()
            .collect()
    }

    pub async fn counts_by_kind(&self) -> HashMap<EventKind, usize> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for event in &inner.timeline {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Attendance sessions for one employee, oldest first, derived from
    /// the check-in / check-out records. A check-out always closes the
    /// most recent still-open check-in.
    pub async fn attendance_sessions(&self, who: Address) -> Vec<AttendanceSession> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<AttendanceSession> = Vec::new();

        // Timeline is newest-first; walk it oldest-first.
        for event in inner.timeline.iter().rev() {
            if event.actor != who {
                continue;
            }
            match event.kind {
                EventKind::CheckIn => sessions.push(AttendanceSession {
                    employee: who,
                    opened_at: event.timestamp,
                    closed_at: None,
                    worked_minutes: None,
                }),
                EventKind::CheckOut => {
                    if let Some(open) = sessions.iter_mut().rev().find(|s| s.is_open()) {
                        open.closed_at = Some(event.timestamp);
                        open.worked_minutes = event.worked_minutes;
                    }
                }
                _ => {}
            }
        }
        sessions
    }

    /// The employee's still-open session, if any.
    pub async fn open_session(&self, who: Address) -> Option<AttendanceSession> {
        self.attendance_sessions(who)
            .await
            .into_iter()
            .find(|session| session.is_open())
    }

    /// Serialize the reconciled timeline, newest first.
    pub async fn export_json(&self) -> AppResult<String> {
        let inner = self.inner.read().await;
        serde_json::to_string_pretty(&inner.timeline)
            .map_err(|e| AppError::Internal(format!("timeline export failed: {e}")))
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
