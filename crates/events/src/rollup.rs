//! Daily rollup record — one `DailyMetrics` per calendar day, created or
//! fully replaced by the rollup aggregator and by nothing else. Because the
//! inputs are immutable raw records over a fixed day window, recomputing a
//! day always yields an identical record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scalar metrics for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub unique_visitors: u64,
    pub total_sessions: u64,
    pub total_page_views: u64,
    pub avg_session_duration_secs: f64,
    /// Percentage of sessions with exactly one page view.
    pub bounce_rate: f64,
    pub listings_viewed: u64,
    pub dealer_contacts: u64,
    pub phone_call_clicks: u64,
    pub search_queries: u64,
    pub news_articles_read: u64,
    pub favorites_added: u64,
    /// (dealer contacts + phone-call clicks) / unique visitors, as a percent.
    pub conversion_rate: f64,
    pub total_conversion_value: f64,
    pub avg_conversion_value: f64,
    pub mobile_users: u64,
    pub tablet_users: u64,
    pub desktop_users: u64,
    /// Performance averages cover only samples that reported the field;
    /// `None` means no sample did.
    pub avg_load_time_ms: Option<f64>,
    pub avg_fcp_ms: Option<f64>,
    pub avg_lcp_ms: Option<f64>,
    pub avg_fid_ms: Option<f64>,
    pub avg_cls: Option<f64>,
}

/// A page ranked by view count, annotated with its distinct-session reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCount {
    pub page: String,
    pub views: u64,
    pub unique_sessions: u64,
}

/// A search query ranked by frequency with the fraction of searches that
/// returned at least one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCount {
    pub query: String,
    pub count: u64,
    pub success_rate: f64,
}

/// Per-day breakdown lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub top_pages: Vec<PageCount>,
    pub top_searches: Vec<SearchCount>,
    /// `None`: not computed — no geolocation source is wired in, and the
    /// aggregator never fabricates data.
    pub top_countries: Option<Vec<(String, u64)>>,
    /// Referrer classification: direct / search / social / referral.
    pub traffic_sources: HashMap<String, u64>,
}

/// The rollup record for one UTC calendar day, keyed by midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Truncated to 00:00:00 UTC; unique key.
    pub date: DateTime<Utc>,
    pub metrics: MetricSet,
    pub breakdown: DailyBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_metrics_serde_round_trip() {
        let day = DailyMetrics {
            date: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            metrics: MetricSet {
                unique_visitors: 3,
                total_sessions: 3,
                total_page_views: 4,
                bounce_rate: 66.7,
                avg_load_time_ms: Some(812.5),
                ..Default::default()
            },
            breakdown: DailyBreakdown {
                top_pages: vec![PageCount {
                    page: "/listings/42".into(),
                    views: 2,
                    unique_sessions: 2,
                }],
                top_searches: vec![],
                top_countries: None,
                traffic_sources: HashMap::from([("direct".to_string(), 3)]),
            },
        };

        let json = serde_json::to_string(&day).unwrap();
        let parsed: DailyMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, day);
        assert!(parsed.breakdown.top_countries.is_none());
    }
}
