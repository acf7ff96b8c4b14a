//! Rollup aggregator — computes one `DailyMetrics` record per UTC calendar
//! day from the raw stores. Deterministic and idempotent: the inputs are
//! immutable raw records plus a date-bounded query, so re-running a day
//! reproduces the record exactly. The aggregator is the only writer of
//! `DailyMetrics`, and it always replaces the whole record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use lotpulse_core::error::AnalyticsResult;
use lotpulse_events::{AnalyticsStore, DailyMetrics};

use crate::metrics::{derive_breakdown, derive_metric_set};

/// Truncate any instant to 00:00:00 UTC of its calendar day.
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

pub struct RollupAggregator {
    store: Arc<dyn AnalyticsStore>,
}

impl RollupAggregator {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Compute and persist the rollup for the day containing `date`.
    ///
    /// An error aborts the whole computation; no partial record is ever
    /// written because the single upsert happens last.
    pub fn compute_daily_metrics(&self, date: DateTime<Utc>) -> AnalyticsResult<DailyMetrics> {
        let day_start = start_of_day(date);
        let day_end = day_start + Duration::days(1);

        let sessions = self.store.sessions_started_in(day_start, day_end)?;
        let page_views = self.store.page_views_in(day_start, day_end)?;
        let interactions = self.store.interactions_in(day_start, day_end)?;
        let business_events = self.store.business_events_in(day_start, day_end)?;
        let performance = self.store.performance_in(day_start, day_end)?;

        let day = DailyMetrics {
            date: day_start,
            metrics: derive_metric_set(&sessions, &page_views, &business_events, &performance),
            breakdown: derive_breakdown(&page_views, &interactions),
        };

        self.store.upsert_daily_metrics(day.clone())?;
        metrics::counter!("rollup.days_computed").increment(1);
        info!(
            date = %day_start.date_naive(),
            sessions = day.metrics.total_sessions,
            page_views = day.metrics.total_page_views,
            "daily rollup computed"
        );
        Ok(day)
    }
}
