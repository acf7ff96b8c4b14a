//! Aggregation side of the subsystem: the idempotent daily rollup, the
//! two-tier dashboard query, real-time queries, retention, and the
//! background scheduler that drives the periodic jobs.

pub mod dashboard;
pub mod metrics;
pub mod realtime;
pub mod retention;
pub mod rollup;
pub mod scheduler;

pub use dashboard::{DashboardService, DashboardSource, DashboardSummary};
pub use realtime::{ActivityItem, RealtimeQueries, RealtimeSnapshot};
pub use retention::{CleanupReport, RetentionJob};
pub use rollup::{start_of_day, RollupAggregator};
pub use scheduler::AnalyticsScheduler;
