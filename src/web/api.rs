//! JSON API handlers for the web dashboard.

use anyhow::Result;
use serde::Serialize;

use super::{Dashboard, Reply};
use crate::analytics::charts::{LabelFilter, RiskFilter};
use crate::analytics::feed::HistorySource;
use crate::error::ClientError;
use crate::session::storage::KeyValueStore;

#[derive(Serialize)]
struct SessionResponse<'a> {
    authenticated: bool,
    username: Option<&'a str>,
    is_admin: bool,
    api_base_url: &'a str,
    refresh_interval_secs: u64,
    records: usize,
    generation: u64,
    last_refresh: Option<String>,
    last_error: Option<&'a str>,
}

#[derive(Serialize)]
struct RefreshResponse {
    records: usize,
    generation: u64,
}

/// Value of `key` in the URL's query string.
fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    url.split('?').nth(1)?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key { Some(v) } else { None }
    })
}

fn invalid(message: String) -> anyhow::Error {
    ClientError::Validation(message).into()
}

/// `GET /api/session`: who is logged in and how fresh the data is.
pub fn get_session<S: KeyValueStore, H: HistorySource>(dash: &mut Dashboard<S, H>) -> Result<Reply> {
    let snapshot = dash.feed.snapshot();
    let user = dash.session.user();
    Reply::json(&SessionResponse {
        authenticated: user.is_some(),
        username: user.map(|u| u.username.as_str()),
        is_admin: dash.session.is_admin(),
        api_base_url: &dash.api_base_url,
        refresh_interval_secs: dash.refresh_interval_secs,
        records: snapshot.len(),
        generation: snapshot.generation(),
        last_refresh: dash.feed.last_refresh().map(|t| t.to_rfc3339()),
        last_error: dash.feed.last_error(),
    })
}

/// `GET /api/summary`
pub fn get_summary<S: KeyValueStore, H: HistorySource>(dash: &mut Dashboard<S, H>) -> Result<Reply> {
    dash.ensure_loaded()?;
    let summary = dash.cache.summary(dash.feed.snapshot());
    Reply::json(&*summary)
}

/// `GET /api/timeline?label=&risk=&max=`
pub fn get_timeline<S: KeyValueStore, H: HistorySource>(
    dash: &mut Dashboard<S, H>,
    url: &str,
) -> Result<Reply> {
    let label: LabelFilter = query_param(url, "label")
        .unwrap_or("all")
        .parse()
        .map_err(invalid)?;
    let risk: RiskFilter = query_param(url, "risk")
        .map(|r| r.replace('+', " ").replace("%20", " "))
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(invalid)?;
    let cap = match query_param(url, "max") {
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(format!("invalid max '{raw}'")))?,
        None => dash.timeline_cap,
    };

    dash.ensure_loaded()?;
    let view = dash.cache.timeline(dash.feed.snapshot(), label, risk, cap);
    Reply::json(&*view)
}

/// `GET /api/hierarchy`
pub fn get_hierarchy<S: KeyValueStore, H: HistorySource>(
    dash: &mut Dashboard<S, H>,
) -> Result<Reply> {
    dash.ensure_loaded()?;
    let tree = dash.cache.hierarchy(dash.feed.snapshot());
    Reply::json(&*tree)
}

/// `GET /api/heatmap?utc=1`: local time unless `utc` is set.
pub fn get_heatmap<S: KeyValueStore, H: HistorySource>(
    dash: &mut Dashboard<S, H>,
    url: &str,
) -> Result<Reply> {
    let utc = query_param(url, "utc").is_some_and(|v| matches!(v, "1" | "true"));
    dash.ensure_loaded()?;
    let matrix = dash.cache.temporal_matrix(dash.feed.snapshot(), utc);
    Reply::json(&*matrix)
}

/// `POST /api/refresh`: fetch history now. Previous data survives a failure.
pub fn post_refresh<S: KeyValueStore, H: HistorySource>(
    dash: &mut Dashboard<S, H>,
) -> Result<Reply> {
    let records = dash.refresh()?;
    Reply::json(&RefreshResponse {
        records,
        generation: dash.feed.snapshot().generation(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let url = "/api/timeline?label=real&max=50";
        assert_eq!(query_param(url, "label"), Some("real"));
        assert_eq!(query_param(url, "max"), Some("50"));
        assert_eq!(query_param(url, "risk"), None);
        assert_eq!(query_param("/api/timeline", "label"), None);
    }
}
