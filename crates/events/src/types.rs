//! Raw analytics record types — sessions, page views, interactions, business
//! events, and performance samples. All share an opaque string `session_id`
//! join key with no enforced referential integrity: every write path is
//! independent and best-effort, so orphaned child records are legal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device class bucketed from the user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

/// Parsed device context attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub os: String,
    pub browser: String,
}

/// A bounded sequence of activity from one visitor. Opened on first contact,
/// mutated on every subsequent request bearing the same id, closed by the
/// idle-session sweep. Never deleted except by the retention horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// `None` while the session is open.
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Derived: `last_activity - start_time`, in seconds.
    pub duration_secs: i64,
    pub user_agent: String,
    pub ip: String,
    pub device: DeviceInfo,
    /// Ordered trail of visited paths.
    pub pages: Vec<String>,
    pub total_page_views: u64,
}

impl Session {
    /// Recompute the derived duration after touching `last_activity`.
    pub fn refresh_duration(&mut self) {
        self.duration_secs = (self.last_activity - self.start_time).num_seconds();
    }

    /// Whether the session has been idle at least `idle_mins` as of `now`.
    pub fn idle_at_least(&self, now: DateTime<Utc>, idle_mins: u32) -> bool {
        now - self.last_activity >= chrono::Duration::minutes(i64::from(idle_mins))
    }
}

/// One qualifying page request (read-only, non-API path). Immutable once
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Option<String>,
    pub page: String,
    pub title: String,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub load_time_ms: Option<u64>,
    pub time_on_page_secs: Option<u64>,
    pub bounced: Option<bool>,
}

/// Coarse category for generic interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionCategory {
    Interaction,
    Content,
    Conversion,
    Navigation,
    System,
    Engagement,
    Business,
}

impl InteractionCategory {
    /// Conversion-relevant categories are retained on the longer horizon.
    pub fn long_retention(&self) -> bool {
        matches!(
            self,
            InteractionCategory::Conversion | InteractionCategory::Business
        )
    }
}

/// Generic catch-all event: UI interactions, internal API-call telemetry,
/// and error captures all land here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub category: InteractionCategory,
    pub page: String,
    pub element_id: Option<String>,
    pub element_text: Option<String>,
    pub value: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Closed vocabulary of measurable, monetizable user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessEventType {
    ListingView,
    ListingInquiry,
    DealerContact,
    PhoneCall,
    ListingFavorite,
    SearchPerformed,
    FilterApplied,
    NewsRead,
    FormSubmission,
    UserRegistration,
    UserLogin,
}

impl BusinessEventType {
    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessEventType::ListingView => "listing_view",
            BusinessEventType::ListingInquiry => "listing_inquiry",
            BusinessEventType::DealerContact => "dealer_contact",
            BusinessEventType::PhoneCall => "phone_call",
            BusinessEventType::ListingFavorite => "listing_favorite",
            BusinessEventType::SearchPerformed => "search_performed",
            BusinessEventType::FilterApplied => "filter_applied",
            BusinessEventType::NewsRead => "news_read",
            BusinessEventType::FormSubmission => "form_submission",
            BusinessEventType::UserRegistration => "user_registration",
            BusinessEventType::UserLogin => "user_login",
        }
    }

    /// Human-readable description for activity feeds.
    pub fn describe(&self) -> &'static str {
        match self {
            BusinessEventType::ListingView => "viewed a listing",
            BusinessEventType::ListingInquiry => "sent a listing inquiry",
            BusinessEventType::DealerContact => "contacted a dealer",
            BusinessEventType::PhoneCall => "clicked to call",
            BusinessEventType::ListingFavorite => "favorited a listing",
            BusinessEventType::SearchPerformed => "ran a search",
            BusinessEventType::FilterApplied => "applied a filter",
            BusinessEventType::NewsRead => "read a news article",
            BusinessEventType::FormSubmission => "submitted a form",
            BusinessEventType::UserRegistration => "registered an account",
            BusinessEventType::UserLogin => "logged in",
        }
    }

    /// Parse a wire name back into the closed vocabulary.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "listing_view" => Some(BusinessEventType::ListingView),
            "listing_inquiry" => Some(BusinessEventType::ListingInquiry),
            "dealer_contact" => Some(BusinessEventType::DealerContact),
            "phone_call" => Some(BusinessEventType::PhoneCall),
            "listing_favorite" => Some(BusinessEventType::ListingFavorite),
            "search_performed" => Some(BusinessEventType::SearchPerformed),
            "filter_applied" => Some(BusinessEventType::FilterApplied),
            "news_read" => Some(BusinessEventType::NewsRead),
            "form_submission" => Some(BusinessEventType::FormSubmission),
            "user_registration" => Some(BusinessEventType::UserRegistration),
            "user_login" => Some(BusinessEventType::UserLogin),
            _ => None,
        }
    }
}

/// Typed context payload for a business event. All fields optional; only the
/// slice relevant to the event type is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessEventDetails {
    pub listing_id: Option<String>,
    pub listing_title: Option<String>,
    pub search_query: Option<String>,
    pub results_count: Option<u64>,
    pub contact_method: Option<String>,
    pub form_name: Option<String>,
}

/// A conversion-relevant action from the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessEvent {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Option<String>,
    pub event_type: BusinessEventType,
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub conversion_value: f64,
    pub details: BusinessEventDetails,
    pub timestamp: DateTime<Utc>,
}

/// Client-reported web-vitals timings. Missing fields are skipped during
/// averaging, never treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfTimings {
    pub first_contentful_paint: Option<f64>,
    pub largest_contentful_paint: Option<f64>,
    pub first_input_delay: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub load_time: Option<f64>,
    pub dom_content_loaded: Option<f64>,
    pub time_to_first_byte: Option<f64>,
}

/// A client-submitted performance sample, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub id: Uuid,
    pub session_id: String,
    pub page: String,
    pub timings: PerfTimings,
    pub connection: Option<String>,
    pub device_hint: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_duration_refresh() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut session = Session {
            session_id: "s-1".into(),
            user_id: None,
            start_time: start,
            last_activity: start,
            end_time: None,
            is_active: true,
            duration_secs: 0,
            user_agent: "test".into(),
            ip: "127.0.0.1".into(),
            device: DeviceInfo {
                device_type: DeviceType::Desktop,
                os: "Linux".into(),
                browser: "Firefox".into(),
            },
            pages: vec![],
            total_page_views: 0,
        };

        session.last_activity = start + chrono::Duration::seconds(95);
        session.refresh_duration();
        assert_eq!(session.duration_secs, 95);

        assert!(!session.idle_at_least(start + chrono::Duration::minutes(29), 30));
        // idle_at_least is measured from last_activity
        assert!(session.idle_at_least(
            session.last_activity + chrono::Duration::minutes(30),
            30
        ));
    }

    #[test]
    fn test_business_event_type_round_trip() {
        for event_type in [
            BusinessEventType::ListingView,
            BusinessEventType::DealerContact,
            BusinessEventType::SearchPerformed,
            BusinessEventType::UserLogin,
        ] {
            assert_eq!(
                BusinessEventType::parse(event_type.as_str()),
                Some(event_type)
            );
        }
        assert_eq!(BusinessEventType::parse("listing_sold"), None);
    }

    #[test]
    fn test_category_retention_split() {
        assert!(InteractionCategory::Conversion.long_retention());
        assert!(InteractionCategory::Business.long_retention());
        assert!(!InteractionCategory::System.long_retention());
        assert!(!InteractionCategory::Navigation.long_retention());
    }

    #[test]
    fn test_interaction_serde() {
        let interaction = Interaction {
            id: Uuid::new_v4(),
            session_id: "s-1".into(),
            user_id: Some("u-1".into()),
            event_type: "search".into(),
            category: InteractionCategory::Interaction,
            page: "/search".into(),
            element_id: None,
            element_text: None,
            value: None,
            metadata: HashMap::from([(
                "results_count".to_string(),
                serde_json::json!(12),
            )]),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&interaction).unwrap();
        let parsed: Interaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, "search");
        assert_eq!(parsed.category, InteractionCategory::Interaction);
    }
}
