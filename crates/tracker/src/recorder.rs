//! Append-only event recorders. Four independent write paths — page views,
//! generic interactions, business events, performance samples — plus the
//! response-instrumentation and error-tracking hooks that feed the
//! interaction stream. Every path degrades silently: a write failure is
//! counted and logged, never surfaced to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::warn;
use uuid::Uuid;

use lotpulse_core::clock::Clock;
use lotpulse_core::config::TrackingConfig;
use lotpulse_events::{
    AnalyticsStore, BusinessEvent, BusinessEventDetails, BusinessEventType, Interaction,
    InteractionCategory, PageView, PerfTimings, PerformanceMetric,
};

/// Fields accepted from any interaction call site.
#[derive(Debug, Clone, Default)]
pub struct InteractionDraft {
    pub event_type: String,
    pub category: Option<InteractionCategory>,
    pub page: String,
    pub element_id: Option<String>,
    pub element_text: Option<String>,
    pub value: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Best-effort writer for all four raw-event streams.
pub struct EventRecorder {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
    sampling_rate: f64,
    error_message_max_len: usize,
    capture_stacks: bool,
}

impl EventRecorder {
    pub fn new(
        store: Arc<dyn AnalyticsStore>,
        clock: Arc<dyn Clock>,
        tracking: &TrackingConfig,
        production: bool,
    ) -> Self {
        Self {
            store,
            clock,
            sampling_rate: tracking.sampling_rate,
            error_message_max_len: tracking.error_message_max_len,
            capture_stacks: !production,
        }
    }

    /// Sampling applies to page views and generic interactions only;
    /// conversion-relevant streams are always kept.
    fn sampled_in(&self) -> bool {
        self.sampling_rate >= 1.0 || rand::thread_rng().gen::<f64>() < self.sampling_rate
    }

    fn swallow(&self, stream: &'static str, result: lotpulse_core::AnalyticsResult<()>) {
        match result {
            Ok(()) => {
                metrics::counter!("recorder.accepted", "stream" => stream).increment(1);
            }
            Err(e) => {
                metrics::counter!("recorder.failed", "stream" => stream).increment(1);
                warn!(error = %e, stream = stream, "analytics write failed, dropping event");
            }
        }
    }

    /// Append a page view and fold the path into the session's trail.
    ///
    /// The page-view insert and the session update are two independent,
    /// non-transactional writes; under concurrent requests to the same
    /// session they may be observed inconsistently, which is accepted.
    pub fn record_page_view(
        &self,
        session_id: &str,
        user_id: Option<String>,
        page: &str,
        title: &str,
        referrer: Option<String>,
        load_time_ms: Option<u64>,
    ) {
        if !self.sampled_in() {
            metrics::counter!("recorder.sampled_out", "stream" => "page_view").increment(1);
            return;
        }
        let view = PageView {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_id,
            page: page.to_string(),
            title: title.to_string(),
            referrer,
            timestamp: self.clock.now(),
            load_time_ms,
            time_on_page_secs: None,
            bounced: None,
        };
        self.swallow("page_view", self.store.insert_page_view(view));
        self.swallow("session_pages", self.append_session_page(session_id, page));
    }

    fn append_session_page(
        &self,
        session_id: &str,
        page: &str,
    ) -> lotpulse_core::AnalyticsResult<()> {
        if let Some(mut session) = self.store.get_session(session_id)? {
            session.pages.push(page.to_string());
            session.total_page_views += 1;
            self.store.save_session(&session)?;
        }
        Ok(())
    }

    /// Record a free-form interaction. Category defaults to `interaction`.
    pub fn record_interaction(
        &self,
        session_id: &str,
        user_id: Option<String>,
        draft: InteractionDraft,
    ) {
        let category = draft.category.unwrap_or(InteractionCategory::Interaction);
        if !category.long_retention() && !self.sampled_in() {
            metrics::counter!("recorder.sampled_out", "stream" => "interaction").increment(1);
            return;
        }
        let interaction = Interaction {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_id,
            event_type: draft.event_type,
            category,
            page: draft.page,
            element_id: draft.element_id,
            element_text: draft.element_text,
            value: draft.value,
            metadata: draft.metadata,
            timestamp: self.clock.now(),
        };
        self.swallow("interaction", self.store.insert_interaction(interaction));
    }

    /// Record a conversion-relevant action from the closed vocabulary.
    /// Never sampled.
    #[allow(clippy::too_many_arguments)]
    pub fn record_business_event(
        &self,
        session_id: &str,
        user_id: Option<String>,
        event_type: BusinessEventType,
        entity_id: Option<String>,
        entity_type: Option<String>,
        conversion_value: f64,
        details: BusinessEventDetails,
    ) {
        let event = BusinessEvent {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_id,
            event_type,
            entity_id,
            entity_type,
            conversion_value,
            details,
            timestamp: self.clock.now(),
        };
        self.swallow("business_event", self.store.insert_business_event(event));
    }

    /// Store a client-submitted timing payload verbatim.
    pub fn record_performance(
        &self,
        session_id: &str,
        page: &str,
        timings: PerfTimings,
        connection: Option<String>,
        device_hint: Option<String>,
    ) {
        let metric = PerformanceMetric {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            page: page.to_string(),
            timings,
            connection,
            device_hint,
            timestamp: self.clock.now(),
        };
        self.swallow("performance", self.store.insert_performance(metric));
    }

    /// Response-instrumentation hook: capture outgoing status and latency as
    /// a `system` interaction.
    pub fn record_response(&self, session_id: &str, path: &str, status: u16, latency_ms: u64) {
        self.record_interaction(
            session_id,
            None,
            InteractionDraft {
                event_type: "api_call".to_string(),
                category: Some(InteractionCategory::System),
                page: path.to_string(),
                metadata: HashMap::from([
                    ("status".to_string(), serde_json::json!(status)),
                    ("duration_ms".to_string(), serde_json::json!(latency_ms)),
                ]),
                ..Default::default()
            },
        );
    }

    /// Error-tracking hook for 4xx/5xx faults. The message is truncated to a
    /// bounded length; stacks are captured only outside production.
    pub fn record_error(
        &self,
        session_id: &str,
        path: &str,
        status: u16,
        message: &str,
        stack: Option<&str>,
    ) {
        let mut truncated: String = message.chars().take(self.error_message_max_len).collect();
        if truncated.len() < message.len() {
            truncated.push('…');
        }
        let mut metadata = HashMap::from([
            ("status".to_string(), serde_json::json!(status)),
            ("message".to_string(), serde_json::json!(truncated)),
        ]);
        if self.capture_stacks {
            if let Some(stack) = stack {
                metadata.insert("stack".to_string(), serde_json::json!(stack));
            }
        }
        self.record_interaction(
            session_id,
            None,
            InteractionDraft {
                event_type: "server_error".to_string(),
                category: Some(InteractionCategory::System),
                page: path.to_string(),
                metadata,
                ..Default::default()
            },
        );
    }
}
