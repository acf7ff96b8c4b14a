//! REST handlers for tracking ingestion and the dashboard/operational
//! endpoints. Ingestion endpoints always answer success: a storage failure
//! is an internal matter, never the client's.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use lotpulse_aggregate::{DashboardService, DashboardSummary, RealtimeQueries, RealtimeSnapshot};
use lotpulse_core::clock::Clock;
use lotpulse_core::config::AlertConfig;
use lotpulse_events::{
    AnalyticsStore, BusinessEventDetails, BusinessEventType, InteractionCategory, PerfTimings,
    RecordCounts,
};
use lotpulse_tracker::recorder::InteractionDraft;
use lotpulse_tracker::{EventRecorder, SessionTracker, TrackedSession};

/// Default dashboard window when `?days` is absent.
const DEFAULT_DASHBOARD_DAYS: u32 = 7;

/// Widest dashboard window a single query may request.
const MAX_DASHBOARD_DAYS: u32 = 365;

/// Shared application state for REST handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalyticsStore>,
    pub clock: Arc<dyn Clock>,
    pub tracker: Arc<SessionTracker>,
    pub recorder: Arc<EventRecorder>,
    pub dashboard: Arc<DashboardService>,
    pub realtime: Arc<RealtimeQueries>,
    pub node_id: String,
    pub production: bool,
    pub idle_timeout_mins: u32,
    pub op_timeout_ms: u64,
    pub alerts: AlertConfig,
    pub start_time: Instant,
}

/// Client-side instrumentation event, as posted by the web SDK.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub category: Option<InteractionCategory>,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub element_text: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Client clock; accepted for wire compatibility, the server clock is
    /// authoritative for stored timestamps.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPerformanceRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub page: String,
    #[serde(default)]
    pub load_time: Option<f64>,
    #[serde(default)]
    pub dom_content_loaded: Option<f64>,
    #[serde(default)]
    pub time_to_first_byte: Option<f64>,
    #[serde(default)]
    pub first_contentful_paint: Option<f64>,
    #[serde(default)]
    pub largest_contentful_paint: Option<f64>,
    #[serde(default)]
    pub first_input_delay: Option<f64>,
    #[serde(default)]
    pub cumulative_layout_shift: Option<f64>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub device_hint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub success: bool,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub days: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node_id: String,
    pub uptime_secs: u64,
    pub records: RecordCounts,
    pub active_sessions_5m: u64,
    pub errors_last_hour: u64,
}

/// POST /v1/track — ingest one client-side event.
///
/// Always answers 200: ingestion failures degrade silently inside the
/// recorder. Event types from the business vocabulary are additionally
/// mirrored into the business-event stream.
pub async fn track_event(
    State(state): State<AppState>,
    session: Option<Extension<TrackedSession>>,
    Json(request): Json<TrackEventRequest>,
) -> Json<TrackResponse> {
    let session_id = request
        .session_id
        .filter(|id| !id.is_empty())
        .or_else(|| session.map(|Extension(s)| s.session_id))
        .unwrap_or_else(|| state.tracker.generate_session_id());

    if let Some(business) = BusinessEventType::parse(&request.event_type) {
        state.recorder.record_business_event(
            &session_id,
            None,
            business,
            request
                .metadata
                .get("entityId")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            request
                .metadata
                .get("entityType")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            request.value.unwrap_or(0.0),
            BusinessEventDetails::default(),
        );
    }

    state.recorder.record_interaction(
        &session_id,
        None,
        InteractionDraft {
            event_type: request.event_type,
            category: request.category,
            page: request.page,
            element_id: request.element_id,
            element_text: request.element_text,
            value: request.value,
            metadata: request.metadata,
        },
    );

    Json(TrackResponse {
        success: true,
        session_id,
    })
}

/// POST /v1/track/performance — ingest one timing payload. Always 200.
pub async fn track_performance(
    State(state): State<AppState>,
    session: Option<Extension<TrackedSession>>,
    Json(request): Json<TrackPerformanceRequest>,
) -> Json<TrackResponse> {
    let session_id = request
        .session_id
        .filter(|id| !id.is_empty())
        .or_else(|| session.map(|Extension(s)| s.session_id))
        .unwrap_or_else(|| state.tracker.generate_session_id());

    state.recorder.record_performance(
        &session_id,
        &request.page,
        PerfTimings {
            first_contentful_paint: request.first_contentful_paint,
            largest_contentful_paint: request.largest_contentful_paint,
            first_input_delay: request.first_input_delay,
            cumulative_layout_shift: request.cumulative_layout_shift,
            load_time: request.load_time,
            dom_content_loaded: request.dom_content_loaded,
            time_to_first_byte: request.time_to_first_byte,
        },
        request.connection,
        request.device_hint,
    );

    Json(TrackResponse {
        success: true,
        session_id,
    })
}

/// GET /v1/dashboard?days=N — aggregated metrics over the window.
pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Json<DashboardSummary> {
    let days = params
        .days
        .unwrap_or(DEFAULT_DASHBOARD_DAYS)
        .clamp(1, MAX_DASHBOARD_DAYS);
    Json(state.dashboard.query(days))
}

/// GET /v1/realtime — the four live readings.
pub async fn realtime(State(state): State<AppState>) -> Json<RealtimeSnapshot> {
    Json(state.realtime.snapshot())
}

/// GET /health — record counts, recent activity, and alert status.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = state.clock.now();

    let records = state.store.record_counts().unwrap_or_else(|e| {
        warn!(error = %e, "record-count query failed");
        RecordCounts::default()
    });
    let active_sessions_5m = state
        .store
        .count_active_sessions_since(now - Duration::minutes(5))
        .unwrap_or(0);
    let errors_last_hour = errors_in_last_hour(&*state.store, now);

    let status = if errors_last_hour >= state.alerts.error_events_per_hour {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        records,
        active_sessions_5m,
        errors_last_hour,
    })
}

fn errors_in_last_hour(store: &dyn AnalyticsStore, now: DateTime<Utc>) -> u64 {
    match store.interactions_in(now - Duration::hours(1), now) {
        Ok(interactions) => interactions
            .iter()
            .filter(|i| {
                i.category == InteractionCategory::System && i.event_type == "server_error"
            })
            .count() as u64,
        Err(e) => {
            warn!(error = %e, "error-rate query failed");
            0
        }
    }
}

/// GET /ready — readiness probe; the store must be answering.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.store.record_counts().is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
