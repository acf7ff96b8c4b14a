//! Request-tracking middleware. Every inbound request resolves a session,
//! gets the session cookie refreshed on the way out, and feeds the
//! instrumentation streams. All of that is fire-and-forget relative to the
//! request itself: tracking never delays or fails a response.

use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use lotpulse_tracker::request::{client_ip, cookie_value};
use lotpulse_tracker::RequestContext;

use crate::rest::AppState;

/// Paths that are never instrumented: probes and the metrics scrape.
const UNTRACKED_PATHS: &[&str] = &["/health", "/ready", "/live", "/metrics"];

pub async fn track_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if UNTRACKED_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let ctx = request_context(&request, &path);
    let tracked = state.tracker.track(&ctx);
    request.extensions_mut().insert(tracked.clone());

    let started = Instant::now();
    let mut response = next.run(request).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status();

    set_session_cookie(&mut response, &state, &tracked.session_id);

    // Everything below is best-effort and off the request path.
    let recorder = state.recorder.clone();
    let session_id = tracked.session_id.clone();
    let op_timeout = Duration::from_millis(state.op_timeout_ms);
    let is_page_view = ctx.is_page_view();
    tokio::spawn(async move {
        let work = async {
            if is_page_view && status.is_success() {
                recorder.record_page_view(
                    &session_id,
                    ctx.user_id.clone(),
                    &ctx.path,
                    &ctx.path,
                    ctx.referrer.clone(),
                    Some(latency_ms),
                );
            }
            recorder.record_response(&session_id, &ctx.path, status.as_u16(), latency_ms);
            if status.is_client_error() || status.is_server_error() {
                recorder.record_error(
                    &session_id,
                    &ctx.path,
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown error"),
                    None,
                );
            }
        };
        if tokio::time::timeout(op_timeout, work).await.is_err() {
            metrics::counter!("tracker.op_timeouts").increment(1);
            warn!(path = %ctx.path, "tracking write timed out, dropping");
        }
    });

    response
}

fn request_context(request: &Request, path: &str) -> RequestContext {
    let header_str = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let cookie_header = header_str("cookie");
    RequestContext {
        method: request.method().to_string(),
        path: path.to_string(),
        user_agent: header_str("user-agent").unwrap_or_default(),
        ip: client_ip(
            header_str("x-forwarded-for").as_deref(),
            header_str("x-real-ip").as_deref(),
            None,
        ),
        referrer: header_str("referer"),
        cookie_session_id: cookie_header
            .as_deref()
            .and_then(|h| cookie_value(h, "sessionId")),
        header_session_id: header_str("x-session-id"),
        user_id: header_str("x-user-id"),
    }
}

/// Refresh the session cookie so the browser keeps presenting the same id
/// for the idle-timeout window.
fn set_session_cookie(response: &mut Response, state: &AppState, session_id: &str) {
    let max_age_secs = u64::from(state.idle_timeout_mins) * 60;
    let mut cookie = format!(
        "sessionId={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        session_id, max_age_secs
    );
    if state.production {
        cookie.push_str("; Secure");
    }
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "session cookie not representable as a header"),
    }
}
