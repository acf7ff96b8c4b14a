//! Background scheduler driving the periodic rollup and cleanup jobs on
//! tokio intervals. Each job runs in its own task so a slow cleanup never
//! delays a rollup tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use lotpulse_core::clock::Clock;
use lotpulse_core::config::SchedulerConfig;

use crate::retention::RetentionJob;
use crate::rollup::{start_of_day, RollupAggregator};

pub struct AnalyticsScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl AnalyticsScheduler {
    /// Spawn the rollup and cleanup loops. Both fire immediately on start
    /// and then on their configured intervals.
    pub fn start(
        rollup: Arc<RollupAggregator>,
        retention: Arc<RetentionJob>,
        config: &SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            rollup_interval_secs = config.rollup_interval_secs,
            cleanup_interval_secs = config.cleanup_interval_secs,
            "starting analytics scheduler"
        );

        let rollup_handle = {
            let period = Duration::from_secs(config.rollup_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    // Recompute the previous UTC day on every tick;
                    // idempotence makes repeat runs harmless.
                    let yesterday = start_of_day(clock.now()) - ChronoDuration::days(1);
                    if let Err(e) = rollup.compute_daily_metrics(yesterday) {
                        error!(error = %e, date = %yesterday.date_naive(), "scheduled rollup failed");
                    }
                }
            })
        };

        let cleanup_handle = {
            let period = Duration::from_secs(config.cleanup_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    retention.run();
                }
            })
        };

        Self {
            handles: vec![rollup_handle, cleanup_handle],
        }
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("analytics scheduler stopped");
    }
}

impl Drop for AnalyticsScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lotpulse_core::clock::fixed_clock;
    use lotpulse_core::config::RetentionConfig;
    use lotpulse_events::{AnalyticsStore, DeviceInfo, DeviceType, MemoryStore, Session};

    fn scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            rollup_interval_secs: 3600,
            cleanup_interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_first_tick_runs_both_jobs() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 3, 0, 0).unwrap();
        let clock = fixed_clock(now);
        let store = Arc::new(MemoryStore::new());

        // Yesterday's raw data and an idle session for cleanup to close
        store
            .save_session(&Session {
                session_id: "idle".into(),
                user_id: None,
                start_time: now - chrono::Duration::hours(5),
                last_activity: now - chrono::Duration::hours(4),
                end_time: None,
                is_active: true,
                duration_secs: 3600,
                user_agent: "test".into(),
                ip: "10.0.0.1".into(),
                device: DeviceInfo {
                    device_type: DeviceType::Desktop,
                    os: "Linux".into(),
                    browser: "Firefox".into(),
                },
                pages: vec![],
                total_page_views: 1,
            })
            .unwrap();

        let rollup = Arc::new(RollupAggregator::new(store.clone()));
        let retention = Arc::new(RetentionJob::new(
            store.clone(),
            clock.clone(),
            RetentionConfig::default(),
            30,
        ));

        let mut scheduler =
            AnalyticsScheduler::start(rollup, retention, &scheduler_config(), clock);
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown();

        let yesterday = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let rollup = store.get_daily_metrics(yesterday).unwrap();
        assert!(rollup.is_some(), "first tick should roll up yesterday");
        // The seeded session started 2025-06-01 22:00, inside yesterday's
        // window.
        assert_eq!(rollup.unwrap().metrics.total_sessions, 1);

        let closed = store.get_session("idle").unwrap().unwrap();
        assert!(!closed.is_active, "first tick should close idle sessions");
    }

    #[tokio::test]
    async fn test_shutdown_stops_tasks() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 3, 0, 0).unwrap();
        let clock = fixed_clock(now);
        let store = Arc::new(MemoryStore::new());
        let rollup = Arc::new(RollupAggregator::new(store.clone()));
        let retention = Arc::new(RetentionJob::new(
            store,
            clock.clone(),
            RetentionConfig::default(),
            30,
        ));

        let mut scheduler =
            AnalyticsScheduler::start(rollup, retention, &scheduler_config(), clock);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown();
        assert!(scheduler.handles.is_empty());
    }
}
