//! Inbound tracking signal — the framework-agnostic slice of an HTTP request
//! the tracker consumes: method, path, identifying headers, and cookies.

/// Paths that never count as page views: API surfaces, probes, and static
/// assets.
const NON_PAGE_PREFIXES: &[&str] = &["/api", "/v1", "/health", "/ready", "/live", "/metrics"];

const ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".woff",
    ".woff2", ".ttf",
];

/// Tracking facts derived from one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub user_agent: String,
    pub ip: String,
    pub referrer: Option<String>,
    /// Session id from the `sessionId` cookie, if present.
    pub cookie_session_id: Option<String>,
    /// Session id from the `x-session-id` header (client instrumentation).
    pub header_session_id: Option<String>,
    /// Authenticated user, treated as an opaque foreign key.
    pub user_id: Option<String>,
}

impl RequestContext {
    /// The session-id signal, cookie taking precedence over header.
    pub fn session_id_signal(&self) -> Option<&str> {
        self.cookie_session_id
            .as_deref()
            .or(self.header_session_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Whether this request qualifies as a page view: a read-only request
    /// for a non-internal, non-asset path.
    pub fn is_page_view(&self) -> bool {
        if !self.method.eq_ignore_ascii_case("GET") {
            return false;
        }
        if NON_PAGE_PREFIXES
            .iter()
            .any(|prefix| self.path.starts_with(prefix))
        {
            return false;
        }
        !ASSET_EXTENSIONS.iter().any(|ext| self.path.ends_with(ext))
    }
}

/// Pick the client IP from forwarding headers, preferring the first
/// `x-forwarded-for` hop, then `x-real-ip`, then the peer address.
pub fn client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer_addr: Option<&str>,
) -> String {
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real) = real_ip {
        if !real.is_empty() {
            return real.to_string();
        }
    }
    peer_addr.unwrap_or("unknown").to_string()
}

/// Extract a named cookie value from a `Cookie` header.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> RequestContext {
        RequestContext {
            method: "GET".into(),
            path: path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_view_qualification() {
        assert!(get("/listings/42").is_page_view());
        assert!(get("/").is_page_view());
        assert!(!get("/api/listings").is_page_view());
        assert!(!get("/v1/track").is_page_view());
        assert!(!get("/health").is_page_view());
        assert!(!get("/static/app.js").is_page_view());

        let mut post = get("/listings/42");
        post.method = "POST".into();
        assert!(!post.is_page_view());
    }

    #[test]
    fn test_session_signal_precedence() {
        let mut ctx = RequestContext::default();
        assert!(ctx.session_id_signal().is_none());

        ctx.header_session_id = Some("hdr-1".into());
        assert_eq!(ctx.session_id_signal(), Some("hdr-1"));

        ctx.cookie_session_id = Some("ck-1".into());
        assert_eq!(ctx.session_id_signal(), Some("ck-1"));

        ctx.cookie_session_id = Some(String::new());
        assert_eq!(ctx.session_id_signal(), Some("hdr-1"));
    }

    #[test]
    fn test_client_ip_precedence() {
        assert_eq!(
            client_ip(Some("10.0.0.1, 10.0.0.2"), Some("10.0.0.9"), None),
            "10.0.0.1"
        );
        assert_eq!(client_ip(None, Some("10.0.0.9"), None), "10.0.0.9");
        assert_eq!(client_ip(None, None, Some("192.168.1.5")), "192.168.1.5");
        assert_eq!(client_ip(None, None, None), "unknown");
    }

    #[test]
    fn test_cookie_value() {
        let header = "theme=dark; sessionId=1718000000-a1b2c3d4; lang=en";
        assert_eq!(
            cookie_value(header, "sessionId"),
            Some("1718000000-a1b2c3d4".to_string())
        );
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
