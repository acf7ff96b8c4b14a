//! Service wiring: builds the store, tracker, recorders, aggregation
//! services, and the background scheduler from one `AppConfig`.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use lotpulse_aggregate::{
    AnalyticsScheduler, DashboardService, RealtimeQueries, RetentionJob, RollupAggregator,
};
use lotpulse_core::clock::Clock;
use lotpulse_core::config::AppConfig;
use lotpulse_events::{memory_store, AnalyticsStore};
use lotpulse_tracker::{EventRecorder, SessionTracker};

use crate::rest::AppState;

pub struct AnalyticsService {
    config: AppConfig,
    state: AppState,
    scheduler: AnalyticsScheduler,
}

impl AnalyticsService {
    /// Assemble the full pipeline and start the background jobs.
    pub fn initialize(config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let store: Arc<dyn AnalyticsStore> = memory_store();
        let production = config.is_production();

        let tracker = Arc::new(SessionTracker::new(store.clone(), clock.clone()));
        let recorder = Arc::new(EventRecorder::new(
            store.clone(),
            clock.clone(),
            &config.tracking,
            production,
        ));
        let dashboard = Arc::new(DashboardService::new(
            store.clone(),
            clock.clone(),
            &config.cache,
        ));
        let realtime = Arc::new(RealtimeQueries::new(store.clone(), clock.clone()));

        let aggregator = Arc::new(RollupAggregator::new(store.clone()));
        let retention = Arc::new(RetentionJob::new(
            store.clone(),
            clock.clone(),
            config.retention.clone(),
            config.tracking.idle_timeout_mins,
        ));
        let scheduler = AnalyticsScheduler::start(
            aggregator,
            retention,
            &config.scheduler,
            clock.clone(),
        );

        let state = AppState {
            store,
            clock,
            tracker,
            recorder,
            dashboard,
            realtime,
            node_id: config.node_id.clone(),
            production,
            idle_timeout_mins: config.tracking.idle_timeout_mins,
            op_timeout_ms: config.tracking.op_timeout_ms,
            alerts: config.alerts.clone(),
            start_time: Instant::now(),
        };

        info!(
            node_id = %config.node_id,
            environment = %config.environment,
            "analytics service initialized"
        );

        Self {
            config,
            state,
            scheduler,
        }
    }

    pub fn app_state(&self) -> AppState {
        self.state.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        info!("analytics service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotpulse_core::clock::system_clock;

    #[tokio::test]
    async fn test_initialize_and_shutdown() {
        let mut service = AnalyticsService::initialize(AppConfig::default(), system_clock());
        assert_eq!(service.app_state().node_id, "lotpulse-01");
        assert!(!service.app_state().production);
        service.shutdown();
    }
}
