//! Metric derivation shared by the rollup aggregator and the dashboard's
//! raw-scan fallback. Both tiers call the same routines so the two query
//! paths can never drift apart in their definitions.

use std::collections::{HashMap, HashSet};

use lotpulse_events::{
    BusinessEvent, BusinessEventType, DailyBreakdown, Interaction, MetricSet, PageCount,
    PageView, PerformanceMetric, SearchCount, Session,
};

const TOP_PAGES_LIMIT: usize = 20;

/// Derive the full scalar metric set from raw records of one window.
pub fn derive_metric_set(
    sessions: &[Session],
    page_views: &[PageView],
    business_events: &[BusinessEvent],
    performance: &[PerformanceMetric],
) -> MetricSet {
    let total_sessions = sessions.len() as u64;
    let unique_visitors = sessions
        .iter()
        .map(|s| s.session_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let avg_session_duration_secs = if sessions.is_empty() {
        0.0
    } else {
        sessions.iter().map(|s| s.duration_secs as f64).sum::<f64>() / sessions.len() as f64
    };

    let bounced = sessions.iter().filter(|s| s.total_page_views == 1).count() as f64;
    let bounce_rate = if total_sessions == 0 {
        0.0
    } else {
        bounced / total_sessions as f64 * 100.0
    };

    let count_events = |event_type: BusinessEventType| {
        business_events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count() as u64
    };
    let listings_viewed = count_events(BusinessEventType::ListingView);
    let dealer_contacts = count_events(BusinessEventType::DealerContact);
    let phone_call_clicks = count_events(BusinessEventType::PhoneCall);
    let search_queries = count_events(BusinessEventType::SearchPerformed);
    let news_articles_read = count_events(BusinessEventType::NewsRead);
    let favorites_added = count_events(BusinessEventType::ListingFavorite);

    let conversion_rate = if unique_visitors == 0 {
        0.0
    } else {
        (dealer_contacts + phone_call_clicks) as f64 / unique_visitors as f64 * 100.0
    };

    let total_conversion_value: f64 = business_events.iter().map(|e| e.conversion_value).sum();
    let converting_events = business_events
        .iter()
        .filter(|e| e.conversion_value > 0.0)
        .count();
    let avg_conversion_value = if converting_events == 0 {
        0.0
    } else {
        total_conversion_value / converting_events as f64
    };

    let mut mobile_users = 0;
    let mut tablet_users = 0;
    let mut desktop_users = 0;
    for session in sessions {
        match session.device.device_type {
            lotpulse_events::DeviceType::Mobile => mobile_users += 1,
            lotpulse_events::DeviceType::Tablet => tablet_users += 1,
            lotpulse_events::DeviceType::Desktop => desktop_users += 1,
        }
    }

    MetricSet {
        unique_visitors,
        total_sessions,
        total_page_views: page_views.len() as u64,
        avg_session_duration_secs,
        bounce_rate,
        listings_viewed,
        dealer_contacts,
        phone_call_clicks,
        search_queries,
        news_articles_read,
        favorites_added,
        conversion_rate,
        total_conversion_value,
        avg_conversion_value,
        mobile_users,
        tablet_users,
        desktop_users,
        avg_load_time_ms: avg_present(performance.iter().map(|p| p.timings.load_time)),
        avg_fcp_ms: avg_present(
            performance
                .iter()
                .map(|p| p.timings.first_contentful_paint),
        ),
        avg_lcp_ms: avg_present(
            performance
                .iter()
                .map(|p| p.timings.largest_contentful_paint),
        ),
        avg_fid_ms: avg_present(performance.iter().map(|p| p.timings.first_input_delay)),
        avg_cls: avg_present(
            performance
                .iter()
                .map(|p| p.timings.cumulative_layout_shift),
        ),
    }
}

/// Average over samples that actually carry the field; `None` if no sample
/// does. Missing fields are skipped, never treated as zero.
pub fn avg_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Derive the per-window breakdown lists. Ordering is deterministic (count
/// descending, key ascending on ties) so recomputing a day reproduces the
/// record exactly.
pub fn derive_breakdown(page_views: &[PageView], interactions: &[Interaction]) -> DailyBreakdown {
    DailyBreakdown {
        top_pages: top_pages(page_views, TOP_PAGES_LIMIT),
        top_searches: top_searches(interactions),
        // No geolocation source is wired in; report as not computed rather
        // than fabricating values.
        top_countries: None,
        traffic_sources: traffic_sources(page_views),
    }
}

/// Group page views by page, annotated with distinct-session reach.
pub fn top_pages(page_views: &[PageView], limit: usize) -> Vec<PageCount> {
    let mut by_page: HashMap<&str, (u64, HashSet<&str>)> = HashMap::new();
    for view in page_views {
        let entry = by_page.entry(view.page.as_str()).or_default();
        entry.0 += 1;
        entry.1.insert(view.session_id.as_str());
    }

    let mut pages: Vec<PageCount> = by_page
        .into_iter()
        .map(|(page, (views, sessions))| PageCount {
            page: page.to_string(),
            views,
            unique_sessions: sessions.len() as u64,
        })
        .collect();
    pages.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.page.cmp(&b.page)));
    pages.truncate(limit);
    pages
}

/// Group `search` interactions by query text with a success rate: the
/// fraction of that query's searches whose result count was positive.
fn top_searches(interactions: &[Interaction]) -> Vec<SearchCount> {
    let mut by_query: HashMap<String, (u64, u64)> = HashMap::new();
    for interaction in interactions {
        if interaction.event_type != "search" {
            continue;
        }
        let Some(query) = interaction
            .metadata
            .get("query")
            .and_then(|q| q.as_str())
        else {
            continue;
        };
        let succeeded = interaction
            .metadata
            .get("results_count")
            .and_then(|c| c.as_u64())
            .is_some_and(|c| c > 0);
        let entry = by_query.entry(query.to_string()).or_default();
        entry.0 += 1;
        if succeeded {
            entry.1 += 1;
        }
    }

    let mut searches: Vec<SearchCount> = by_query
        .into_iter()
        .map(|(query, (count, successes))| SearchCount {
            query,
            count,
            success_rate: successes as f64 / count as f64,
        })
        .collect();
    searches.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
    searches
}

/// Classify a referrer into a traffic source bucket.
pub fn classify_referrer(referrer: Option<&str>) -> &'static str {
    let Some(referrer) = referrer.filter(|r| !r.is_empty()) else {
        return "direct";
    };
    let referrer = referrer.to_ascii_lowercase();

    const SEARCH_ENGINES: &[&str] = &["google.", "bing.com", "yahoo.", "duckduckgo.com"];
    const SOCIAL_NETWORKS: &[&str] = &[
        "facebook.com",
        "instagram.com",
        "twitter.com",
        "x.com",
        "linkedin.com",
        "youtube.com",
        "reddit.com",
        "pinterest.",
        "tiktok.com",
    ];

    if SEARCH_ENGINES.iter().any(|domain| referrer.contains(domain)) {
        "search"
    } else if SOCIAL_NETWORKS
        .iter()
        .any(|domain| referrer.contains(domain))
    {
        "social"
    } else {
        "referral"
    }
}

fn traffic_sources(page_views: &[PageView]) -> HashMap<String, u64> {
    let mut sources: HashMap<String, u64> = HashMap::new();
    for view in page_views {
        let bucket = classify_referrer(view.referrer.as_deref());
        *sources.entry(bucket.to_string()).or_default() += 1;
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lotpulse_events::{
        BusinessEventDetails, DeviceInfo, DeviceType, InteractionCategory, PerfTimings,
    };
    use uuid::Uuid;

    fn session(id: &str, page_views: u64, device: DeviceType) -> Session {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        Session {
            session_id: id.to_string(),
            user_id: None,
            start_time: start,
            last_activity: start + chrono::Duration::seconds(120),
            end_time: None,
            is_active: true,
            duration_secs: 120,
            user_agent: "test".into(),
            ip: "10.0.0.1".into(),
            device: DeviceInfo {
                device_type: device,
                os: "Linux".into(),
                browser: "Firefox".into(),
            },
            pages: vec![],
            total_page_views: page_views,
        }
    }

    fn page_view(session_id: &str, page: &str, referrer: Option<&str>) -> PageView {
        PageView {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_id: None,
            page: page.to_string(),
            title: page.to_string(),
            referrer: referrer.map(str::to_string),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 5, 0).unwrap(),
            load_time_ms: None,
            time_on_page_secs: None,
            bounced: None,
        }
    }

    fn business_event(event_type: BusinessEventType, value: f64) -> BusinessEvent {
        BusinessEvent {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            user_id: None,
            event_type,
            entity_id: None,
            entity_type: None,
            conversion_value: value,
            details: BusinessEventDetails::default(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 10, 0).unwrap(),
        }
    }

    fn search_interaction(query: &str, results: u64) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            user_id: None,
            event_type: "search".into(),
            category: InteractionCategory::Interaction,
            page: "/search".into(),
            element_id: None,
            element_text: None,
            value: None,
            metadata: std::collections::HashMap::from([
                ("query".to_string(), serde_json::json!(query)),
                ("results_count".to_string(), serde_json::json!(results)),
            ]),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_bounce_rate() {
        // Page-view counts [1, 1, 2, 3]: two bounces out of four sessions
        let sessions = vec![
            session("a", 1, DeviceType::Desktop),
            session("b", 1, DeviceType::Mobile),
            session("c", 2, DeviceType::Desktop),
            session("d", 3, DeviceType::Tablet),
        ];
        let metrics = derive_metric_set(&sessions, &[], &[], &[]);
        assert_eq!(metrics.bounce_rate, 50.0);
        assert_eq!(metrics.total_sessions, 4);
        assert_eq!(metrics.mobile_users, 1);
        assert_eq!(metrics.tablet_users, 1);
        assert_eq!(metrics.desktop_users, 2);
    }

    #[test]
    fn test_conversion_rate() {
        let sessions: Vec<Session> = (0..100)
            .map(|i| session(&format!("s-{i}"), 2, DeviceType::Desktop))
            .collect();
        let events = vec![
            business_event(BusinessEventType::DealerContact, 0.0),
            business_event(BusinessEventType::DealerContact, 0.0),
            business_event(BusinessEventType::DealerContact, 0.0),
            business_event(BusinessEventType::PhoneCall, 0.0),
            business_event(BusinessEventType::PhoneCall, 0.0),
        ];
        let metrics = derive_metric_set(&sessions, &[], &events, &[]);
        assert_eq!(metrics.conversion_rate, 5.0);

        // No visitors: no divide-by-zero
        let metrics = derive_metric_set(&[], &[], &events, &[]);
        assert_eq!(metrics.conversion_rate, 0.0);
    }

    #[test]
    fn test_avg_conversion_value_skips_zero_value_events() {
        let events = vec![
            business_event(BusinessEventType::DealerContact, 50.0),
            business_event(BusinessEventType::SearchPerformed, 0.0),
        ];
        let metrics = derive_metric_set(&[], &[], &events, &[]);
        assert_eq!(metrics.total_conversion_value, 50.0);
        assert_eq!(metrics.avg_conversion_value, 50.0);
    }

    #[test]
    fn test_performance_averages_skip_missing_fields() {
        let sample = |load: Option<f64>, fcp: Option<f64>| PerformanceMetric {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            page: "/".into(),
            timings: PerfTimings {
                load_time: load,
                first_contentful_paint: fcp,
                ..Default::default()
            },
            connection: None,
            device_hint: None,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        };
        let samples = vec![
            sample(Some(800.0), None),
            sample(Some(1200.0), None),
            sample(None, None),
        ];
        let metrics = derive_metric_set(&[], &[], &[], &samples);
        assert_eq!(metrics.avg_load_time_ms, Some(1000.0));
        assert_eq!(metrics.avg_fcp_ms, None);
        assert_eq!(metrics.avg_cls, None);
    }

    #[test]
    fn test_top_pages_with_unique_sessions() {
        let views = vec![
            page_view("a", "/listings/1", None),
            page_view("a", "/listings/1", None),
            page_view("b", "/listings/1", None),
            page_view("b", "/dealers/2", None),
        ];
        let pages = top_pages(&views, 20);
        assert_eq!(pages[0].page, "/listings/1");
        assert_eq!(pages[0].views, 3);
        assert_eq!(pages[0].unique_sessions, 2);
        assert_eq!(pages[1].views, 1);
    }

    #[test]
    fn test_top_searches_success_rate() {
        let interactions = vec![
            search_interaction("flatbed trailer", 12),
            search_interaction("flatbed trailer", 0),
            search_interaction("horse trailer", 3),
        ];
        let breakdown = derive_breakdown(&[], &interactions);
        assert_eq!(breakdown.top_searches.len(), 2);
        let flatbed = &breakdown.top_searches[0];
        assert_eq!(flatbed.query, "flatbed trailer");
        assert_eq!(flatbed.count, 2);
        assert_eq!(flatbed.success_rate, 0.5);
        assert!(breakdown.top_countries.is_none());
    }

    #[test]
    fn test_referrer_classification() {
        assert_eq!(classify_referrer(None), "direct");
        assert_eq!(classify_referrer(Some("")), "direct");
        assert_eq!(
            classify_referrer(Some("https://www.google.com/search?q=trailers")),
            "search"
        );
        assert_eq!(classify_referrer(Some("https://facebook.com/groups/1")), "social");
        assert_eq!(
            classify_referrer(Some("https://trailerforum.example.com/thread/9")),
            "referral"
        );
    }
}
