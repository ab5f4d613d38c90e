//! Embedded web dashboard.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard with summary, timeline, hierarchy and heatmap
//! - JSON endpoints backed by a [`HistoryFeed`] and a [`DerivedCache`]
//!
//! Launched via `verity web` (default: `http://127.0.0.1:9747`).

mod api;
mod frontend;

use std::io::Cursor;

use anyhow::{Context, Result};
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::analytics::activity::ActivityLog;
use crate::analytics::cache::DerivedCache;
use crate::analytics::feed::{HistoryFeed, HistorySource};
use crate::error::ClientError;
use crate::session::SessionStore;
use crate::session::storage::KeyValueStore;

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// State shared by every request: the session, the history feed and the
/// memoized derived views.
pub struct Dashboard<S: KeyValueStore, H: HistorySource> {
    source: H,
    api_base_url: String,
    session: SessionStore<S>,
    feed: HistoryFeed,
    cache: DerivedCache,
    timeline_cap: usize,
    refresh_interval_secs: u64,
    activity: ActivityLog,
}

impl<S: KeyValueStore, H: HistorySource> Dashboard<S, H> {
    pub fn new(source: H, api_base_url: &str, session: SessionStore<S>, timeline_cap: usize) -> Self {
        Self {
            source,
            api_base_url: api_base_url.to_string(),
            session,
            feed: HistoryFeed::new(),
            cache: DerivedCache::new(),
            timeline_cap,
            refresh_interval_secs: 0,
            activity: ActivityLog::disabled(),
        }
    }

    /// Have the page refresh history on its own every `secs` seconds.
    /// Zero disables it.
    pub fn with_refresh_interval(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn with_activity(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    /// Route one request. Never fails; errors become JSON error replies.
    pub fn handle(&mut self, method: &Method, url: &str) -> Reply {
        // Strip query string for path matching
        let path = url.split('?').next().unwrap_or(url);

        let result = match (method, path) {
            (&Method::Get, "/") | (&Method::Get, "/index.html") => {
                return Reply::html(frontend::INDEX_HTML);
            }
            (&Method::Get, "/api/session") => api::get_session(self),
            (&Method::Get, "/api/summary") => api::get_summary(self),
            (&Method::Get, "/api/timeline") => api::get_timeline(self, url),
            (&Method::Get, "/api/hierarchy") => api::get_hierarchy(self),
            (&Method::Get, "/api/heatmap") => api::get_heatmap(self, url),
            (&Method::Post, "/api/refresh") => api::post_refresh(self),
            _ => return Reply::error(404, "not found"),
        };

        result.unwrap_or_else(|e| Reply::from_client_error(&e))
    }

    /// Load history on first use; later requests reuse the snapshot until an
    /// explicit refresh.
    fn ensure_loaded(&mut self) -> Result<(), ClientError> {
        if self.feed.last_refresh().is_some() {
            return Ok(());
        }
        self.refresh().map(|_| ())
    }

    fn refresh(&mut self) -> Result<usize, ClientError> {
        let token = self.session.require_token()?.to_string();
        let result = self.feed.refresh(&self.source, &token).map(|s| s.len());
        self.activity.record_result(
            crate::analytics::activity::Action::Refresh,
            self.session.user().map(|u| u.username.as_str()),
            &result,
        );
        result
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard).
pub fn serve<S: KeyValueStore, H: HistorySource>(
    addr: &str,
    mut dashboard: Dashboard<S, H>,
    open: bool,
) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("verity dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if open && let Err(e) = open_browser(&format!("http://{addr}")) {
        tracing::debug!(error = %e, "could not open browser");
    }

    for request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        let reply = dashboard.handle(&method, &url);
        let status = reply.status;
        if let Err(e) = request.respond(reply.into_response()) {
            tracing::debug!(error = %e, "failed to send response");
        }

        tracing::info!(%method, %url, status, "request");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// A rendered response, kept separate from `tiny_http` so handlers can be
/// exercised without a socket.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    html: bool,
}

impl Reply {
    fn json<T: Serialize>(data: &T) -> Result<Self> {
        let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
        Ok(Self {
            status: 200,
            body,
            html: false,
        })
    }

    fn html(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            html: true,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }).to_string(),
            html: false,
        }
    }

    fn from_client_error(err: &anyhow::Error) -> Self {
        let status = match err.downcast_ref::<ClientError>() {
            Some(ClientError::Authentication(_)) => 401,
            Some(ClientError::Forbidden(_)) => 403,
            Some(ClientError::Validation(_)) => 400,
            Some(ClientError::NotFound(_)) => 404,
            Some(ClientError::Network(_)) | Some(ClientError::Server { .. }) => 502,
            _ => 500,
        };
        Self::error(status, &err.to_string())
    }

    pub fn is_html(&self) -> bool {
        self.html
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let content_type = if self.html {
            "text/html; charset=utf-8"
        } else {
            "application/json; charset=utf-8"
        };
        let mut resp =
            Response::from_data(self.body.into_bytes()).with_status_code(StatusCode(self.status));
        if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
            resp = resp.with_header(header);
        }
        resp
    }
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::api::types::{HistoryRecord, Label, RiskLevel};
    use crate::error::ClientResult;
    use crate::session::storage::MemoryStore;
    use crate::session::{SCHEMA_VERSION, TOKEN_KEY, USER_KEY, VERSION_KEY};

    struct StubSource {
        records: Vec<HistoryRecord>,
        calls: Cell<usize>,
    }

    impl HistorySource for StubSource {
        fn fetch_history(&self, token: &str) -> ClientResult<Vec<HistoryRecord>> {
            self.calls.set(self.calls.get() + 1);
            if token != "tok" {
                return Err(ClientError::Authentication("bad token".into()));
            }
            Ok(self.records.clone())
        }
    }

    fn record(id: i64, label: Label, risk: RiskLevel) -> HistoryRecord {
        HistoryRecord {
            id,
            statement: format!("claim {id}"),
            full_text: String::new(),
            speaker: String::new(),
            sources: String::new(),
            prediction: label,
            confidence: 0.9,
            num_sources: 1,
            has_official_source: true,
            risk_level: risk,
            timestamp: format!("2025-04-0{id}T10:00:00Z"),
            input_completeness: 75.0,
        }
    }

    fn dashboard(logged_in: bool) -> Dashboard<MemoryStore, StubSource> {
        let storage = if logged_in {
            MemoryStore::with_entries([
                (VERSION_KEY, SCHEMA_VERSION),
                (TOKEN_KEY, "tok"),
                (USER_KEY, r#"{"username":"dana","id":2,"is_admin":false}"#),
            ])
        } else {
            MemoryStore::new()
        };
        let source = StubSource {
            records: vec![
                record(1, Label::Real, RiskLevel::Low),
                record(2, Label::Fake, RiskLevel::High),
                record(3, Label::Fake, RiskLevel::Medium),
            ],
            calls: Cell::new(0),
        };
        Dashboard::new(source, "http://api.test", SessionStore::init(storage), 1000)
    }

    fn json(reply: &Reply) -> serde_json::Value {
        serde_json::from_str(&reply.body).unwrap()
    }

    #[test]
    fn index_is_html() {
        let reply = dashboard(false).handle(&Method::Get, "/");
        assert_eq!(reply.status, 200);
        assert!(reply.is_html());
        assert!(reply.body.contains("<html"));
    }

    #[test]
    fn unknown_route_is_404() {
        let reply = dashboard(true).handle(&Method::Get, "/nope");
        assert_eq!(reply.status, 404);
    }

    #[test]
    fn data_routes_require_login() {
        let reply = dashboard(false).handle(&Method::Get, "/api/summary");
        assert_eq!(reply.status, 401);
    }

    #[test]
    fn summary_loads_once_and_is_reused() {
        let mut dash = dashboard(true);
        let first = dash.handle(&Method::Get, "/api/summary");
        assert_eq!(first.status, 200);
        assert_eq!(json(&first)["total_records"], 3);
        assert_eq!(json(&first)["fake_count"], 2);

        dash.handle(&Method::Get, "/api/hierarchy");
        assert_eq!(dash.source.calls.get(), 1);

        dash.handle(&Method::Post, "/api/refresh");
        assert_eq!(dash.source.calls.get(), 2);
    }

    #[test]
    fn timeline_applies_query_filters() {
        let mut dash = dashboard(true);
        let reply = dash.handle(&Method::Get, "/api/timeline?label=fake&risk=high&max=10");
        assert_eq!(reply.status, 200);
        let body = json(&reply);
        assert_eq!(body["filtered_len"], 1);
        assert_eq!(body["points"][0]["id"], 2);
    }

    #[test]
    fn bad_filter_is_400() {
        let reply = dashboard(true).handle(&Method::Get, "/api/timeline?label=maybe");
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn session_reports_user() {
        let reply = dashboard(true).handle(&Method::Get, "/api/session");
        let body = json(&reply);
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["username"], "dana");
        assert_eq!(body["records"], 0);
    }

    #[test]
    fn heatmap_in_utc() {
        let reply = dashboard(true).handle(&Method::Get, "/api/heatmap?utc=1");
        assert_eq!(reply.status, 200);
        let body = json(&reply);
        // 2025-04-01 is a Tuesday.
        assert_eq!(body["counts"][2][10], 1);
    }
}
