//! Retention and cleanup. One job closes idle sessions and then deletes
//! expired records category by category. Category failures are isolated: a
//! failing delete is logged, counted, and the sweep moves on to the next
//! category.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use lotpulse_core::clock::Clock;
use lotpulse_core::config::RetentionConfig;
use lotpulse_events::AnalyticsStore;

/// What a single cleanup sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub sessions_closed: usize,
    pub sessions_deleted: usize,
    pub page_views_deleted: usize,
    pub interactions_deleted: usize,
    pub conversion_interactions_deleted: usize,
    pub business_events_deleted: usize,
    pub performance_deleted: usize,
    pub daily_metrics_deleted: usize,
    /// Categories that failed; their counts above stay at zero.
    pub errors: usize,
}

pub struct RetentionJob {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    idle_timeout_mins: u32,
}

impl RetentionJob {
    pub fn new(
        store: Arc<dyn AnalyticsStore>,
        clock: Arc<dyn Clock>,
        retention: RetentionConfig,
        idle_timeout_mins: u32,
    ) -> Self {
        Self {
            store,
            clock,
            retention,
            idle_timeout_mins,
        }
    }

    /// Run one full sweep: close idle sessions, then enforce every
    /// category's horizon.
    pub fn run(&self) -> CleanupReport {
        let now = self.clock.now();
        let mut report = CleanupReport::default();

        report.sessions_closed = self.close_idle_sessions(now, &mut report.errors);

        let horizon = |days: u32| now - Duration::days(i64::from(days));

        report.sessions_deleted = self.sweep(
            "sessions",
            &mut report.errors,
            self.store
                .delete_sessions_before(horizon(self.retention.session_days)),
        );
        report.page_views_deleted = self.sweep(
            "page_views",
            &mut report.errors,
            self.store
                .delete_page_views_before(horizon(self.retention.page_view_days)),
        );
        report.interactions_deleted = self.sweep(
            "interactions",
            &mut report.errors,
            self.store
                .delete_interactions_before(horizon(self.retention.interaction_days), false),
        );
        report.conversion_interactions_deleted = self.sweep(
            "conversion_interactions",
            &mut report.errors,
            self.store.delete_interactions_before(
                horizon(self.retention.conversion_interaction_days),
                true,
            ),
        );
        report.business_events_deleted = self.sweep(
            "business_events",
            &mut report.errors,
            self.store
                .delete_business_events_before(horizon(self.retention.business_event_days)),
        );
        report.performance_deleted = self.sweep(
            "performance",
            &mut report.errors,
            self.store
                .delete_performance_before(horizon(self.retention.performance_days)),
        );
        report.daily_metrics_deleted = self.sweep(
            "daily_metrics",
            &mut report.errors,
            self.store
                .delete_daily_metrics_before(horizon(self.retention.daily_metrics_days)),
        );

        metrics::counter!("retention.sweeps").increment(1);
        info!(
            sessions_closed = report.sessions_closed,
            sessions_deleted = report.sessions_deleted,
            page_views_deleted = report.page_views_deleted,
            interactions_deleted = report.interactions_deleted,
            conversion_interactions_deleted = report.conversion_interactions_deleted,
            business_events_deleted = report.business_events_deleted,
            performance_deleted = report.performance_deleted,
            daily_metrics_deleted = report.daily_metrics_deleted,
            errors = report.errors,
            "cleanup sweep finished"
        );
        report
    }

    /// Sessions idle past the timeout are closed, not deleted: deletion is
    /// strictly the horizon's job.
    fn close_idle_sessions(&self, now: DateTime<Utc>, errors: &mut usize) -> usize {
        let cutoff = now - Duration::minutes(i64::from(self.idle_timeout_mins));
        let idle = match self.store.active_sessions_idle_before(cutoff) {
            Ok(idle) => idle,
            Err(e) => {
                warn!(error = %e, "idle-session lookup failed");
                *errors += 1;
                return 0;
            }
        };

        let mut closed = 0;
        for mut session in idle {
            session.is_active = false;
            session.end_time = Some(now);
            session.refresh_duration();
            match self.store.save_session(&session) {
                Ok(()) => closed += 1,
                Err(e) => {
                    warn!(error = %e, session_id = %session.session_id, "failed to close idle session");
                    *errors += 1;
                }
            }
        }
        closed
    }

    fn sweep(
        &self,
        category: &str,
        errors: &mut usize,
        result: lotpulse_core::AnalyticsResult<usize>,
    ) -> usize {
        match result {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(error = %e, category = category, "retention delete failed");
                *errors += 1;
                0
            }
        }
    }
}
