//! Real-time metric queries for the dashboard's "happening now" panel.
//! These read the live raw stores directly, never the rollups. Every query
//! degrades to an empty/zero shape on store failure so the dashboard renders
//! regardless.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use lotpulse_core::clock::Clock;
use lotpulse_events::{AnalyticsStore, BusinessEventType, PageCount};

use crate::metrics::top_pages;

const ACTIVE_WINDOW_MINS: i64 = 5;
const NOTABLE_WINDOW_MINS: i64 = 60;
const NOTABLE_LIMIT: usize = 10;
const TOP_PAGES_LIMIT: usize = 10;

/// A recent business-flavored interaction rendered for an activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub description: String,
    pub event_type: String,
    pub page: String,
    pub timestamp: DateTime<Utc>,
}

/// The four independent real-time readings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RealtimeSnapshot {
    pub active_sessions_5m: u64,
    pub page_views_24h: u64,
    pub recent_activity: Vec<ActivityItem>,
    pub top_pages_24h: Vec<PageCount>,
    pub generated_at: Option<DateTime<Utc>>,
}

pub struct RealtimeQueries {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
}

impl RealtimeQueries {
    pub fn new(store: Arc<dyn AnalyticsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Assemble all four readings. The queries are independent; one failing
    /// leaves the others intact.
    pub fn snapshot(&self) -> RealtimeSnapshot {
        let now = self.clock.now();
        RealtimeSnapshot {
            active_sessions_5m: self.active_sessions(now),
            page_views_24h: self.page_views_24h(now),
            recent_activity: self.recent_activity(now),
            top_pages_24h: self.top_pages_24h(now),
            generated_at: Some(now),
        }
    }

    fn active_sessions(&self, now: DateTime<Utc>) -> u64 {
        self.store
            .count_active_sessions_since(now - Duration::minutes(ACTIVE_WINDOW_MINS))
            .unwrap_or_else(|e| {
                warn!(error = %e, "active-session query failed");
                0
            })
    }

    fn page_views_24h(&self, now: DateTime<Utc>) -> u64 {
        self.store
            .count_page_views_since(now - Duration::hours(24))
            .unwrap_or_else(|e| {
                warn!(error = %e, "page-view count query failed");
                0
            })
    }

    /// The most recent notable interactions: only business-flavored event
    /// types qualify, each rendered with a human-readable description.
    fn recent_activity(&self, now: DateTime<Utc>) -> Vec<ActivityItem> {
        let since = now - Duration::minutes(NOTABLE_WINDOW_MINS);
        let mut notable: Vec<ActivityItem> = match self.store.interactions_in(since, now) {
            Ok(interactions) => interactions
                .into_iter()
                .filter_map(|i| {
                    let business = BusinessEventType::parse(&i.event_type)?;
                    Some(ActivityItem {
                        description: business.describe().to_string(),
                        event_type: i.event_type,
                        page: i.page,
                        timestamp: i.timestamp,
                    })
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "recent-activity query failed");
                Vec::new()
            }
        };
        notable.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        notable.truncate(NOTABLE_LIMIT);
        notable
    }

    fn top_pages_24h(&self, now: DateTime<Utc>) -> Vec<PageCount> {
        match self.store.page_views_in(now - Duration::hours(24), now) {
            Ok(views) => top_pages(&views, TOP_PAGES_LIMIT),
            Err(e) => {
                warn!(error = %e, "top-pages query failed");
                Vec::new()
            }
        }
    }
}
