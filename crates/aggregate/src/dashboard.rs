//! Two-tier dashboard query: answer from precomputed daily rollups when any
//! exist for the window, otherwise fall back to scanning the raw stores with
//! the same derivation logic the rollup uses. On any store failure the query
//! returns an explicit zero-valued shape instead of an error.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use lotpulse_core::clock::Clock;
use lotpulse_core::config::CacheConfig;
use lotpulse_events::{AnalyticsStore, DailyMetrics, MetricSet};

use crate::metrics::{avg_present, derive_metric_set};
use crate::rollup::start_of_day;

/// Which tier answered the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSource {
    Rollup,
    RawScan,
    /// Store failure; all metrics are zero-valued.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub window_days: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: DashboardSource,
    /// Number of rollup records the answer was built from (0 for raw scans).
    pub days_aggregated: u64,
    pub metrics: MetricSet,
}

pub struct DashboardService {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
    cache: Option<DashMap<u32, (DateTime<Utc>, DashboardSummary)>>,
    cache_ttl: Duration,
}

impl DashboardService {
    pub fn new(store: Arc<dyn AnalyticsStore>, clock: Arc<dyn Clock>, cache: &CacheConfig) -> Self {
        Self {
            store,
            clock,
            cache: cache.enabled.then(DashMap::new),
            cache_ttl: Duration::seconds(cache.ttl_secs as i64),
        }
    }

    /// Aggregate metrics over the last `days` calendar days (including the
    /// current, partial one).
    pub fn query(&self, days: u32) -> DashboardSummary {
        let days = days.max(1);
        let now = self.clock.now();

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&days) {
                let (cached_at, summary) = entry.value();
                if now - *cached_at < self.cache_ttl {
                    metrics::counter!("dashboard.cache_hits").increment(1);
                    return summary.clone();
                }
            }
        }

        let summary = self.compute(days, now);
        if let Some(cache) = &self.cache {
            cache.insert(days, (now, summary.clone()));
        }
        summary
    }

    fn compute(&self, days: u32, now: DateTime<Utc>) -> DashboardSummary {
        let start = start_of_day(now) - Duration::days(i64::from(days) - 1);

        let rollups = match self.store.daily_metrics_in(start, now) {
            Ok(rollups) => rollups,
            Err(e) => {
                warn!(error = %e, "rollup lookup failed, returning empty dashboard");
                return self.empty(days, start, now);
            }
        };

        if !rollups.is_empty() {
            debug!(days = days, rollups = rollups.len(), "dashboard served from rollups");
            return DashboardSummary {
                window_days: days,
                start,
                end: now,
                source: DashboardSource::Rollup,
                days_aggregated: rollups.len() as u64,
                metrics: combine_rollups(&rollups),
            };
        }

        // No rollups cover the window (same-day or not-yet-aggregated
        // ranges): scan raw stores with the rollup's own derivation.
        match self.raw_scan(start, now) {
            Ok(metrics) => {
                debug!(days = days, "dashboard served from raw scan");
                DashboardSummary {
                    window_days: days,
                    start,
                    end: now,
                    source: DashboardSource::RawScan,
                    days_aggregated: 0,
                    metrics,
                }
            }
            Err(e) => {
                warn!(error = %e, "raw dashboard scan failed, returning empty dashboard");
                self.empty(days, start, now)
            }
        }
    }

    fn raw_scan(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> lotpulse_core::AnalyticsResult<MetricSet> {
        let sessions = self.store.sessions_started_in(start, end)?;
        let page_views = self.store.page_views_in(start, end)?;
        let business_events = self.store.business_events_in(start, end)?;
        let performance = self.store.performance_in(start, end)?;
        Ok(derive_metric_set(
            &sessions,
            &page_views,
            &business_events,
            &performance,
        ))
    }

    fn empty(&self, days: u32, start: DateTime<Utc>, end: DateTime<Utc>) -> DashboardSummary {
        DashboardSummary {
            window_days: days,
            start,
            end,
            source: DashboardSource::Empty,
            days_aggregated: 0,
            metrics: MetricSet::default(),
        }
    }
}

/// Fold per-day rollups into one window summary: counters sum, rate and
/// duration fields take the arithmetic mean across available days (an
/// accepted approximation, not a sample-weighted mean).
fn combine_rollups(rollups: &[DailyMetrics]) -> MetricSet {
    let days = rollups.len() as f64;
    let sum = |f: fn(&MetricSet) -> u64| rollups.iter().map(|r| f(&r.metrics)).sum::<u64>();
    let mean = |f: fn(&MetricSet) -> f64| rollups.iter().map(|r| f(&r.metrics)).sum::<f64>() / days;

    MetricSet {
        unique_visitors: sum(|m| m.unique_visitors),
        total_sessions: sum(|m| m.total_sessions),
        total_page_views: sum(|m| m.total_page_views),
        avg_session_duration_secs: mean(|m| m.avg_session_duration_secs),
        bounce_rate: mean(|m| m.bounce_rate),
        listings_viewed: sum(|m| m.listings_viewed),
        dealer_contacts: sum(|m| m.dealer_contacts),
        phone_call_clicks: sum(|m| m.phone_call_clicks),
        search_queries: sum(|m| m.search_queries),
        news_articles_read: sum(|m| m.news_articles_read),
        favorites_added: sum(|m| m.favorites_added),
        conversion_rate: mean(|m| m.conversion_rate),
        total_conversion_value: rollups
            .iter()
            .map(|r| r.metrics.total_conversion_value)
            .sum(),
        avg_conversion_value: mean(|m| m.avg_conversion_value),
        mobile_users: sum(|m| m.mobile_users),
        tablet_users: sum(|m| m.tablet_users),
        desktop_users: sum(|m| m.desktop_users),
        avg_load_time_ms: avg_present(rollups.iter().map(|r| r.metrics.avg_load_time_ms)),
        avg_fcp_ms: avg_present(rollups.iter().map(|r| r.metrics.avg_fcp_ms)),
        avg_lcp_ms: avg_present(rollups.iter().map(|r| r.metrics.avg_lcp_ms)),
        avg_fid_ms: avg_present(rollups.iter().map(|r| r.metrics.avg_fid_ms)),
        avg_cls: avg_present(rollups.iter().map(|r| r.metrics.avg_cls)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::RollupAggregator;
    use chrono::TimeZone;
    use lotpulse_core::clock::fixed_clock;
    use lotpulse_events::{
        BusinessEvent, BusinessEventDetails, BusinessEventType, DeviceInfo, DeviceType,
        FailingStore, MemoryStore, PageView, Session,
    };
    use uuid::Uuid;

    fn no_cache() -> CacheConfig {
        CacheConfig {
            enabled: false,
            ttl_secs: 0,
        }
    }

    fn seed_raw_day(store: &MemoryStore, day: DateTime<Utc>) {
        let morning = day + Duration::hours(9);
        for (id, views) in [("a", 2u64), ("b", 1), ("c", 1)] {
            store
                .save_session(&Session {
                    session_id: format!("{}-{}", day.date_naive(), id),
                    user_id: None,
                    start_time: morning,
                    last_activity: morning + Duration::minutes(4),
                    end_time: None,
                    is_active: true,
                    duration_secs: 240,
                    user_agent: "test".into(),
                    ip: "10.0.0.1".into(),
                    device: DeviceInfo {
                        device_type: DeviceType::Desktop,
                        os: "Linux".into(),
                        browser: "Firefox".into(),
                    },
                    pages: vec![],
                    total_page_views: views,
                })
                .unwrap();
        }
        for _ in 0..4 {
            store
                .insert_page_view(PageView {
                    id: Uuid::new_v4(),
                    session_id: format!("{}-a", day.date_naive()),
                    user_id: None,
                    page: "/listings/42".into(),
                    title: "Listing 42".into(),
                    referrer: None,
                    timestamp: morning,
                    load_time_ms: None,
                    time_on_page_secs: None,
                    bounced: None,
                })
                .unwrap();
        }
        store
            .insert_business_event(BusinessEvent {
                id: Uuid::new_v4(),
                session_id: format!("{}-a", day.date_naive()),
                user_id: None,
                event_type: BusinessEventType::DealerContact,
                entity_id: None,
                entity_type: None,
                conversion_value: 50.0,
                details: BusinessEventDetails::default(),
                timestamp: morning,
            })
            .unwrap();
    }

    #[test]
    fn test_rollup_tier_preferred_and_summed() {
        let store = Arc::new(MemoryStore::new());
        let day1 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let day2 = day1 + Duration::days(1);
        seed_raw_day(&store, day1);
        seed_raw_day(&store, day2);

        let aggregator = RollupAggregator::new(store.clone());
        aggregator.compute_daily_metrics(day1).unwrap();
        aggregator.compute_daily_metrics(day2).unwrap();

        let now = day2 + Duration::hours(12);
        let service = DashboardService::new(store, fixed_clock(now), &no_cache());
        let summary = service.query(2);

        assert_eq!(summary.source, DashboardSource::Rollup);
        assert_eq!(summary.days_aggregated, 2);
        assert_eq!(summary.metrics.total_sessions, 6);
        assert_eq!(summary.metrics.total_page_views, 8);
        assert_eq!(summary.metrics.dealer_contacts, 2);
        assert_eq!(summary.metrics.total_conversion_value, 100.0);
        // Rates are averaged, not summed
        assert!((summary.metrics.bounce_rate - 66.666).abs() < 0.1);
    }

    #[test]
    fn test_raw_fallback_when_no_rollups() {
        let store = Arc::new(MemoryStore::new());
        let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        seed_raw_day(&store, day);

        let now = day + Duration::hours(12);
        let service = DashboardService::new(store, fixed_clock(now), &no_cache());
        let summary = service.query(1);

        assert_eq!(summary.source, DashboardSource::RawScan);
        assert_eq!(summary.metrics.total_sessions, 3);
        assert_eq!(summary.metrics.total_page_views, 4);
    }

    #[test]
    fn test_two_tier_equivalence() {
        let store = Arc::new(MemoryStore::new());
        let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        seed_raw_day(&store, day);
        RollupAggregator::new(store.clone())
            .compute_daily_metrics(day)
            .unwrap();

        let now = day + Duration::hours(23);
        let service = DashboardService::new(store.clone(), fixed_clock(now), &no_cache());

        let from_rollup = service.query(1);
        assert_eq!(from_rollup.source, DashboardSource::Rollup);

        // Drop the rollup; same window must recompute identically from raw
        store
            .delete_daily_metrics_before(day + Duration::days(1))
            .unwrap();
        let from_raw = service.query(1);
        assert_eq!(from_raw.source, DashboardSource::RawScan);

        assert_eq!(
            from_rollup.metrics.total_sessions,
            from_raw.metrics.total_sessions
        );
        assert_eq!(
            from_rollup.metrics.total_page_views,
            from_raw.metrics.total_page_views
        );
        assert_eq!(
            from_rollup.metrics.total_conversion_value,
            from_raw.metrics.total_conversion_value
        );
        assert!(
            (from_rollup.metrics.bounce_rate - from_raw.metrics.bounce_rate).abs() < 1e-9
        );
        assert!((from_rollup.metrics.avg_session_duration_secs
            - from_raw.metrics.avg_session_duration_secs)
            .abs()
            < 1e-9);
    }

    #[test]
    fn test_cache_serves_within_ttl() {
        let store = Arc::new(MemoryStore::new());
        let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        seed_raw_day(&store, day);

        let clock = fixed_clock(day + Duration::hours(12));
        let cache = CacheConfig {
            enabled: true,
            ttl_secs: 60,
        };
        let service = DashboardService::new(store.clone(), clock.clone(), &cache);

        let first = service.query(1);
        assert_eq!(first.metrics.total_sessions, 3);

        // New raw data within the TTL is not reflected yet
        store
            .save_session(&Session {
                session_id: "late-arrival".into(),
                user_id: None,
                start_time: day + Duration::hours(11),
                last_activity: day + Duration::hours(11),
                end_time: None,
                is_active: true,
                duration_secs: 0,
                user_agent: "test".into(),
                ip: "10.0.0.2".into(),
                device: DeviceInfo {
                    device_type: DeviceType::Mobile,
                    os: "iOS".into(),
                    browser: "Safari".into(),
                },
                pages: vec![],
                total_page_views: 1,
            })
            .unwrap();
        let second = service.query(1);
        assert_eq!(second.metrics.total_sessions, 3);

        // Past the TTL the cache entry is stale and the query recomputes
        clock.advance(Duration::seconds(61));
        let third = service.query(1);
        assert_eq!(third.metrics.total_sessions, 4);
    }

    #[test]
    fn test_store_failure_returns_zero_shape() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let service = DashboardService::new(Arc::new(FailingStore), fixed_clock(now), &no_cache());
        let summary = service.query(7);
        assert_eq!(summary.source, DashboardSource::Empty);
        assert_eq!(summary.metrics, MetricSet::default());
    }
}
