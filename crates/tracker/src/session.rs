//! Session tracker — resolves or creates a session per inbound request.
//!
//! Tracking is strictly best-effort relative to the request it rides on: any
//! store failure is logged and a throwaway in-memory session id is handed
//! back so downstream recorders still have something to attach to.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, warn};

use lotpulse_core::clock::Clock;
use lotpulse_events::{AnalyticsStore, Session, SessionInsert};

use crate::device::parse_user_agent;
use crate::request::RequestContext;

const SESSION_ID_SUFFIX_LEN: usize = 9;

/// The session handle returned to the request path.
#[derive(Debug, Clone)]
pub struct TrackedSession {
    pub session_id: String,
    /// A fresh session record was created for this request.
    pub is_new: bool,
    /// False when the store failed and the id is an unpersisted throwaway.
    pub persisted: bool,
}

/// Resolves or creates one session per inbound request.
pub struct SessionTracker {
    store: Arc<dyn AnalyticsStore>,
    clock: Arc<dyn Clock>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn AnalyticsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Generate a practically-unique session id: millisecond time prefix
    /// plus a random alphanumeric suffix. Not globally strict.
    pub fn generate_session_id(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{}-{}", self.clock.now().timestamp_millis(), suffix)
    }

    /// Resolve the request's session, guaranteeing a `Session` record exists
    /// and is current. Never fails; see module docs for the failure policy.
    pub fn track(&self, ctx: &RequestContext) -> TrackedSession {
        let supplied = ctx.session_id_signal().map(str::to_string);
        let session_id = supplied
            .clone()
            .unwrap_or_else(|| self.generate_session_id());

        match self.resolve(ctx, &session_id, supplied.is_some()) {
            Ok(tracked) => tracked,
            Err(e) => {
                error!(error = %e, "session tracking failed, fabricating throwaway session id");
                metrics::counter!("tracker.sessions_failed").increment(1);
                TrackedSession {
                    session_id: self.generate_session_id(),
                    is_new: true,
                    persisted: false,
                }
            }
        }
    }

    fn resolve(
        &self,
        ctx: &RequestContext,
        session_id: &str,
        id_was_supplied: bool,
    ) -> lotpulse_core::AnalyticsResult<TrackedSession> {
        if id_was_supplied {
            if let Some(existing) = self.store.get_session(session_id)? {
                if existing.is_active && existing.end_time.is_none() {
                    return self.touch(existing, ctx);
                }
                // Closed session presented its old id: open a fresh one.
                debug!(session_id = %session_id, "session already closed, starting a new one");
                let fresh_id = self.generate_session_id();
                return self.create(ctx, &fresh_id);
            }
        }
        self.create(ctx, session_id)
    }

    /// Update an existing active session in place.
    fn touch(
        &self,
        mut session: Session,
        ctx: &RequestContext,
    ) -> lotpulse_core::AnalyticsResult<TrackedSession> {
        session.last_activity = self.clock.now();
        session.refresh_duration();
        if session.user_id.is_none() && ctx.user_id.is_some() {
            session.user_id = ctx.user_id.clone();
        }
        self.store.save_session(&session)?;
        metrics::counter!("tracker.sessions_touched").increment(1);
        Ok(TrackedSession {
            session_id: session.session_id,
            is_new: false,
            persisted: true,
        })
    }

    /// Create a new session record under a uniqueness constraint; a conflict
    /// means a concurrent request won the insert, so re-fetch and update.
    fn create(
        &self,
        ctx: &RequestContext,
        session_id: &str,
    ) -> lotpulse_core::AnalyticsResult<TrackedSession> {
        let now = self.clock.now();
        let session = Session {
            session_id: session_id.to_string(),
            user_id: ctx.user_id.clone(),
            start_time: now,
            last_activity: now,
            end_time: None,
            is_active: true,
            duration_secs: 0,
            user_agent: ctx.user_agent.clone(),
            ip: ctx.ip.clone(),
            device: parse_user_agent(&ctx.user_agent),
            pages: Vec::new(),
            total_page_views: 0,
        };

        match self.store.create_session(session)? {
            SessionInsert::Created => {
                metrics::counter!("tracker.sessions_created").increment(1);
                debug!(session_id = %session_id, "session created");
                Ok(TrackedSession {
                    session_id: session_id.to_string(),
                    is_new: true,
                    persisted: true,
                })
            }
            SessionInsert::Conflict => {
                warn!(session_id = %session_id, "session insert conflict, re-fetching");
                match self.store.get_session(session_id)? {
                    Some(existing) => self.touch(existing, ctx),
                    // Winner vanished between insert and fetch; hand the id
                    // back unpersisted rather than looping.
                    None => Ok(TrackedSession {
                        session_id: session_id.to_string(),
                        is_new: false,
                        persisted: false,
                    }),
                }
            }
        }
    }
}
