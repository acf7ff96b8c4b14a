//! Record-store abstraction. The subsystem consumes a durable store offering
//! create/read/update/delete plus simple filtered range queries; everything
//! is keyed or idempotent, so no in-process locking is needed beyond the
//! store's own maps.
//!
//! `MemoryStore` is the bundled DashMap-backed implementation. A
//! database-backed store slots in behind the same trait.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use lotpulse_core::error::{AnalyticsError, AnalyticsResult};

use crate::rollup::DailyMetrics;
use crate::types::{BusinessEvent, Interaction, PageView, PerformanceMetric, Session};

/// Outcome of a uniqueness-preserving session insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInsert {
    Created,
    /// A session with this id already exists; the caller should re-fetch.
    Conflict,
}

/// Per-record-type totals for the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordCounts {
    pub sessions: u64,
    pub page_views: u64,
    pub interactions: u64,
    pub business_events: u64,
    pub performance_metrics: u64,
    pub daily_metrics: u64,
}

/// Durable record store consumed by every component of the subsystem.
pub trait AnalyticsStore: Send + Sync {
    // ── Sessions ────────────────────────────────────────────────────────

    /// Insert a session only if no record with its id exists. Two racing
    /// requests presenting the same fresh id resolve to one `Created` and
    /// one `Conflict`.
    fn create_session(&self, session: Session) -> AnalyticsResult<SessionInsert>;

    /// Replace an existing session record (full overwrite).
    fn save_session(&self, session: &Session) -> AnalyticsResult<()>;

    fn get_session(&self, session_id: &str) -> AnalyticsResult<Option<Session>>;

    /// Sessions whose `start_time` lies in `[start, end)`.
    fn sessions_started_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Session>>;

    /// Active sessions whose `last_activity` is strictly before `cutoff`.
    fn active_sessions_idle_before(&self, cutoff: DateTime<Utc>)
        -> AnalyticsResult<Vec<Session>>;

    /// Count of active sessions touched at or after `since`.
    fn count_active_sessions_since(&self, since: DateTime<Utc>) -> AnalyticsResult<u64>;

    /// Delete sessions started at or before `cutoff`; returns the number
    /// removed. All deletion horizons are inclusive: a record exactly at the
    /// boundary is aged out.
    fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize>;

    // ── Page views ──────────────────────────────────────────────────────

    fn insert_page_view(&self, view: PageView) -> AnalyticsResult<()>;

    fn page_views_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PageView>>;

    fn count_page_views_since(&self, since: DateTime<Utc>) -> AnalyticsResult<u64>;

    fn delete_page_views_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize>;

    // ── Interactions ────────────────────────────────────────────────────

    fn insert_interaction(&self, interaction: Interaction) -> AnalyticsResult<()>;

    fn interactions_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Interaction>>;

    /// Delete interactions older than `cutoff` on one side of the retention
    /// split: `long_retention` selects conversion/business categories.
    fn delete_interactions_before(
        &self,
        cutoff: DateTime<Utc>,
        long_retention: bool,
    ) -> AnalyticsResult<usize>;

    // ── Business events ─────────────────────────────────────────────────

    fn insert_business_event(&self, event: BusinessEvent) -> AnalyticsResult<()>;

    fn business_events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<BusinessEvent>>;

    fn delete_business_events_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize>;

    // ── Performance samples ─────────────────────────────────────────────

    fn insert_performance(&self, metric: PerformanceMetric) -> AnalyticsResult<()>;

    fn performance_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceMetric>>;

    fn delete_performance_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize>;

    // ── Daily rollups ───────────────────────────────────────────────────

    /// Insert or fully replace the rollup keyed by its midnight date. The
    /// aggregator is the only writer; no partial patches exist.
    fn upsert_daily_metrics(&self, day: DailyMetrics) -> AnalyticsResult<()>;

    fn get_daily_metrics(&self, date: DateTime<Utc>) -> AnalyticsResult<Option<DailyMetrics>>;

    /// Rollups whose date lies in `[start, end)`, ordered ascending.
    fn daily_metrics_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<DailyMetrics>>;

    fn delete_daily_metrics_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize>;

    // ── Health ──────────────────────────────────────────────────────────

    fn record_counts(&self) -> AnalyticsResult<RecordCounts>;
}

/// In-memory store backed by per-record-type DashMaps.
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    page_views: DashMap<Uuid, PageView>,
    interactions: DashMap<Uuid, Interaction>,
    business_events: DashMap<Uuid, BusinessEvent>,
    performance: DashMap<Uuid, PerformanceMetric>,
    daily: DashMap<i64, DailyMetrics>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_window(ts: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    ts >= start && ts < end
}

impl AnalyticsStore for MemoryStore {
    fn create_session(&self, session: Session) -> AnalyticsResult<SessionInsert> {
        match self.sessions.entry(session.session_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(SessionInsert::Conflict),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(SessionInsert::Created)
            }
        }
    }

    fn save_session(&self, session: &Session) -> AnalyticsResult<()> {
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> AnalyticsResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    fn sessions_started_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| in_window(s.start_time, start, end))
            .map(|s| s.clone())
            .collect())
    }

    fn active_sessions_idle_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.is_active && s.last_activity < cutoff)
            .map(|s| s.clone())
            .collect())
    }

    fn count_active_sessions_since(&self, since: DateTime<Utc>) -> AnalyticsResult<u64> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.is_active && s.last_activity >= since)
            .count() as u64)
    }

    fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.start_time > cutoff);
        Ok(before - self.sessions.len())
    }

    fn insert_page_view(&self, view: PageView) -> AnalyticsResult<()> {
        self.page_views.insert(view.id, view);
        Ok(())
    }

    fn page_views_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PageView>> {
        Ok(self
            .page_views
            .iter()
            .filter(|v| in_window(v.timestamp, start, end))
            .map(|v| v.clone())
            .collect())
    }

    fn count_page_views_since(&self, since: DateTime<Utc>) -> AnalyticsResult<u64> {
        Ok(self
            .page_views
            .iter()
            .filter(|v| v.timestamp >= since)
            .count() as u64)
    }

    fn delete_page_views_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        let before = self.page_views.len();
        self.page_views.retain(|_, v| v.timestamp > cutoff);
        Ok(before - self.page_views.len())
    }

    fn insert_interaction(&self, interaction: Interaction) -> AnalyticsResult<()> {
        self.interactions.insert(interaction.id, interaction);
        Ok(())
    }

    fn interactions_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Interaction>> {
        Ok(self
            .interactions
            .iter()
            .filter(|i| in_window(i.timestamp, start, end))
            .map(|i| i.clone())
            .collect())
    }

    fn delete_interactions_before(
        &self,
        cutoff: DateTime<Utc>,
        long_retention: bool,
    ) -> AnalyticsResult<usize> {
        let before = self.interactions.len();
        self.interactions.retain(|_, i| {
            i.category.long_retention() != long_retention || i.timestamp > cutoff
        });
        Ok(before - self.interactions.len())
    }

    fn insert_business_event(&self, event: BusinessEvent) -> AnalyticsResult<()> {
        self.business_events.insert(event.id, event);
        Ok(())
    }

    fn business_events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<BusinessEvent>> {
        Ok(self
            .business_events
            .iter()
            .filter(|e| in_window(e.timestamp, start, end))
            .map(|e| e.clone())
            .collect())
    }

    fn delete_business_events_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        let before = self.business_events.len();
        self.business_events.retain(|_, e| e.timestamp > cutoff);
        Ok(before - self.business_events.len())
    }

    fn insert_performance(&self, metric: PerformanceMetric) -> AnalyticsResult<()> {
        self.performance.insert(metric.id, metric);
        Ok(())
    }

    fn performance_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceMetric>> {
        Ok(self
            .performance
            .iter()
            .filter(|m| in_window(m.timestamp, start, end))
            .map(|m| m.clone())
            .collect())
    }

    fn delete_performance_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        let before = self.performance.len();
        self.performance.retain(|_, m| m.timestamp > cutoff);
        Ok(before - self.performance.len())
    }

    fn upsert_daily_metrics(&self, day: DailyMetrics) -> AnalyticsResult<()> {
        self.daily.insert(day.date.timestamp(), day);
        Ok(())
    }

    fn get_daily_metrics(&self, date: DateTime<Utc>) -> AnalyticsResult<Option<DailyMetrics>> {
        Ok(self.daily.get(&date.timestamp()).map(|d| d.clone()))
    }

    fn daily_metrics_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<DailyMetrics>> {
        let mut days: Vec<DailyMetrics> = self
            .daily
            .iter()
            .filter(|d| in_window(d.date, start, end))
            .map(|d| d.clone())
            .collect();
        days.sort_by_key(|d| d.date);
        Ok(days)
    }

    fn delete_daily_metrics_before(&self, cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        let before = self.daily.len();
        self.daily.retain(|_, d| d.date > cutoff);
        Ok(before - self.daily.len())
    }

    fn record_counts(&self) -> AnalyticsResult<RecordCounts> {
        Ok(RecordCounts {
            sessions: self.sessions.len() as u64,
            page_views: self.page_views.len() as u64,
            interactions: self.interactions.len() as u64,
            business_events: self.business_events.len() as u64,
            performance_metrics: self.performance.len() as u64,
            daily_metrics: self.daily.len() as u64,
        })
    }
}

/// Store whose every operation fails — exercises the degrade-silently paths
/// in tests, the way a capture/noop sink pair does for event emission.
pub struct FailingStore;

impl FailingStore {
    fn err<T>(&self) -> AnalyticsResult<T> {
        Err(AnalyticsError::Store("injected store failure".to_string()))
    }
}

impl AnalyticsStore for FailingStore {
    fn create_session(&self, _session: Session) -> AnalyticsResult<SessionInsert> {
        self.err()
    }
    fn save_session(&self, _session: &Session) -> AnalyticsResult<()> {
        self.err()
    }
    fn get_session(&self, _session_id: &str) -> AnalyticsResult<Option<Session>> {
        self.err()
    }
    fn sessions_started_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Session>> {
        self.err()
    }
    fn active_sessions_idle_before(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Session>> {
        self.err()
    }
    fn count_active_sessions_since(&self, _since: DateTime<Utc>) -> AnalyticsResult<u64> {
        self.err()
    }
    fn delete_sessions_before(&self, _cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        self.err()
    }
    fn insert_page_view(&self, _view: PageView) -> AnalyticsResult<()> {
        self.err()
    }
    fn page_views_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PageView>> {
        self.err()
    }
    fn count_page_views_since(&self, _since: DateTime<Utc>) -> AnalyticsResult<u64> {
        self.err()
    }
    fn delete_page_views_before(&self, _cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        self.err()
    }
    fn insert_interaction(&self, _interaction: Interaction) -> AnalyticsResult<()> {
        self.err()
    }
    fn interactions_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<Interaction>> {
        self.err()
    }
    fn delete_interactions_before(
        &self,
        _cutoff: DateTime<Utc>,
        _long_retention: bool,
    ) -> AnalyticsResult<usize> {
        self.err()
    }
    fn insert_business_event(&self, _event: BusinessEvent) -> AnalyticsResult<()> {
        self.err()
    }
    fn business_events_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<BusinessEvent>> {
        self.err()
    }
    fn delete_business_events_before(&self, _cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        self.err()
    }
    fn insert_performance(&self, _metric: PerformanceMetric) -> AnalyticsResult<()> {
        self.err()
    }
    fn performance_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<PerformanceMetric>> {
        self.err()
    }
    fn delete_performance_before(&self, _cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        self.err()
    }
    fn upsert_daily_metrics(&self, _day: DailyMetrics) -> AnalyticsResult<()> {
        self.err()
    }
    fn get_daily_metrics(&self, _date: DateTime<Utc>) -> AnalyticsResult<Option<DailyMetrics>> {
        self.err()
    }
    fn daily_metrics_in(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<DailyMetrics>> {
        self.err()
    }
    fn delete_daily_metrics_before(&self, _cutoff: DateTime<Utc>) -> AnalyticsResult<usize> {
        self.err()
    }
    fn record_counts(&self) -> AnalyticsResult<RecordCounts> {
        self.err()
    }
}

/// Convenience: a fresh shared in-memory store.
pub fn memory_store() -> Arc<dyn AnalyticsStore> {
    Arc::new(MemoryStore::new())
}
