//! HTTP client for the remote classification API.
//!
//! Uses the synchronous `ureq` client. One [`ApiClient`] wraps a configured
//! agent (base URL + timeout) and is reused for every call in a process.
//!
//! Endpoints:
//!
//! | Method | Path                       | Auth   |
//! |--------|----------------------------|--------|
//! | POST   | `/login` (form-encoded)    | none   |
//! | POST   | `/register`                | none   |
//! | POST   | `/logout`                  | bearer |
//! | GET    | `/me`                      | bearer |
//! | POST   | `/predict`                 | bearer |
//! | GET    | `/history`                 | bearer |
//! | DELETE | `/history/{id}`            | admin  |
//! | GET    | `/admin/model-performance` | admin  |
pub mod types;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::schema::ApiConfig;
use crate::error::{ClientError, ClientResult};
use types::{
    Credentials, HistoryResponse, LoginResponse, ModelPerformance, PredictionRequest,
    PredictionResponse, User,
};

/// Timeout for the reachability probe used by `verity health`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            agent,
        }
    }

    /// Build a client from the resolved `[api]` config section.
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", loopback_ipv4(&self.base_url), path)
    }

    fn authorized(&self, request: ureq::Request, token: Option<&str>) -> ureq::Request {
        match token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    // -- Auth ---------------------------------------------------------------

    /// Exchange credentials for a bearer token.
    pub fn login(&self, username: &str, password: &str) -> ClientResult<String> {
        tracing::debug!(username, "POST /login");
        let resp = self
            .agent
            .post(&self.url("/login"))
            .send_form(&[("username", username), ("password", password)]);
        let body: LoginResponse = decode(resp)?;
        if body.access_token.is_empty() {
            return Err(ClientError::Decode("login returned an empty token".into()));
        }
        Ok(body.access_token)
    }

    pub fn register(&self, username: &str, password: &str) -> ClientResult<()> {
        tracing::debug!(username, "POST /register");
        let resp = self
            .agent
            .post(&self.url("/register"))
            .send_json(Credentials { username, password });
        expect_success(resp)
    }

    /// Notify the server that `token` should be revoked.
    pub fn logout(&self, token: &str) -> ClientResult<()> {
        tracing::debug!("POST /logout");
        let req = self.authorized(self.agent.post(&self.url("/logout")), Some(token));
        expect_success(req.send_json(serde_json::json!({})))
    }

    pub fn me(&self, token: &str) -> ClientResult<User> {
        self.get_json("/me", Some(token))
    }

    // -- Predictions --------------------------------------------------------

    pub fn predict(
        &self,
        token: Option<&str>,
        request: &PredictionRequest,
    ) -> ClientResult<PredictionResponse> {
        self.post_json("/predict", token, request)
    }

    pub fn history(&self, token: &str) -> ClientResult<HistoryResponse> {
        self.get_json("/history", Some(token))
    }

    pub fn delete_history(&self, token: &str, id: i64) -> ClientResult<()> {
        let path = format!("/history/{id}");
        tracing::debug!(%path, "DELETE");
        let req = self.authorized(self.agent.delete(&self.url(&path)), Some(token));
        expect_success(req.call())
    }

    pub fn model_performance(&self, token: &str) -> ClientResult<ModelPerformance> {
        self.get_json("/admin/model-performance", Some(token))
    }

    /// Check whether the API answers at all. Never fails.
    pub fn is_reachable(&self) -> bool {
        let probe_timeout = self.timeout.min(PROBE_TIMEOUT);
        self.agent
            .get(&self.url("/"))
            .timeout(probe_timeout)
            .call()
            .is_ok()
    }

    // -- Helpers ------------------------------------------------------------

    fn get_json<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ClientResult<T> {
        tracing::debug!(path, "GET");
        let req = self.authorized(self.agent.get(&self.url(path)), token);
        decode(req.call())
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        tracing::debug!(path, "POST");
        let req = self.authorized(self.agent.post(&self.url(path)), token);
        decode(req.send_json(body))
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(result: Result<ureq::Response, ureq::Error>) -> ClientResult<T> {
    let resp = result.map_err(map_ureq_error)?;
    resp.into_json::<T>()
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// "localhost" may resolve to ::1 first while the API binds IPv4 only.
/// Only an exact `localhost` host is rewritten.
fn loopback_ipv4(base_url: &str) -> String {
    if let Some((scheme, rest)) = base_url.split_once("://")
        && let Some(tail) = rest.strip_prefix("localhost")
        && (tail.is_empty() || tail.starts_with([':', '/']))
    {
        return format!("{scheme}://127.0.0.1{tail}");
    }
    base_url.to_string()
}

fn expect_success(result: Result<ureq::Response, ureq::Error>) -> ClientResult<()> {
    result.map(|_| ()).map_err(map_ureq_error)
}

fn map_ureq_error(err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let detail = error_detail(&body).unwrap_or_else(|| default_detail(status));
            tracing::debug!(status, %detail, "API returned an error status");
            ClientError::from_status(status, detail)
        }
        ureq::Error::Transport(transport) => {
            tracing::debug!(error = %transport, "API transport failure");
            ClientError::Network(transport.to_string())
        }
    }
}

/// Extract a human-readable message from an error body.
///
/// The API reports errors as `{"detail": "..."}`; validation failures use a
/// list of `{"msg": ...}` objects under `detail` instead.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}

fn default_detail(status: u16) -> String {
    match status {
        401 => "invalid credentials or expired session".to_string(),
        403 => "admin privileges required".to_string(),
        404 => "resource not found".to_string(),
        _ => "request failed, please try again".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_strips_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn url_rewrites_localhost() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(1));
        assert_eq!(client.url("/me"), "http://127.0.0.1:8000/me");
    }

    #[test]
    fn url_leaves_localhost_prefixed_hosts_alone() {
        assert_eq!(
            loopback_ipv4("http://localhost.corp.net"),
            "http://localhost.corp.net"
        );
        assert_eq!(loopback_ipv4("https://localhostile:9000"), "https://localhostile:9000");
        assert_eq!(loopback_ipv4("http://localhost"), "http://127.0.0.1");
        assert_eq!(loopback_ipv4("http://localhost/api"), "http://127.0.0.1/api");
    }

    #[test]
    fn error_detail_reads_string_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Incorrect username or password"}"#),
            Some("Incorrect username or password".to_string())
        );
    }

    #[test]
    fn error_detail_joins_validation_messages() {
        let body = r#"{"detail": [{"msg": "too short"}, {"msg": "missing"}]}"#;
        assert_eq!(error_detail(body), Some("too short; missing".to_string()));
    }

    #[test]
    fn error_detail_none_for_non_json() {
        assert_eq!(error_detail("<html>502</html>"), None);
        assert_eq!(error_detail(r#"{"error": "x"}"#), None);
    }
}
