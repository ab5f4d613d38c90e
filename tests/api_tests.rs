//! API client and session tests against a stub HTTP server.
//!
//! Each test starts a `tiny_http` server on an ephemeral port that answers a
//! scripted sequence of responses and records what the client sent.
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Response, Server};
use verity::analytics::feed::HistoryFeed;
use verity::api::ApiClient;
use verity::api::types::{Label, PredictionRequest, RiskLevel};
use verity::error::ClientError;
use verity::session::storage::{FileStore, KeyValueStore};
use verity::session::{SCHEMA_VERSION, SessionState, SessionStore, TOKEN_KEY, VERSION_KEY};

// ---------------------------------------------------------------------------
// Stub server
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Recorded {
    method: String,
    url: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

fn header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

/// Serve `script` in order, then return everything that was received.
fn stub(script: Vec<(u16, &'static str)>) -> (ApiClient, JoinHandle<Vec<Recorded>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in script {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            seen.push(Recorded {
                method: request.method().to_string(),
                url: request.url().to_string(),
                authorization: header(&request, "Authorization"),
                content_type: header(&request, "Content-Type"),
                body: received,
            });
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").unwrap(),
                );
            request.respond(response).unwrap();
        }
        seen
    });

    let client = ApiClient::new(&format!("http://{addr}/"), Duration::from_secs(5));
    (client, handle)
}

const USER_JSON: &str = r#"{"username":"erin","id":7,"is_admin":true}"#;
const TOKEN_JSON: &str = r#"{"access_token":"abc123","token_type":"bearer"}"#;

const PREDICTION_JSON: &str = r#"{
    "prediction": "Fake",
    "confidence": 0.91,
    "probabilities": {"fake": 0.91, "real": 0.09},
    "details": {"num_sources": 2, "has_official_source": false},
    "trust_indicators": {"risk_level": "High Risk", "confidence_category": "Very Confident"},
    "explainability": {
        "key_factors": ["No official sources"],
        "warnings": [],
        "input_completeness": 75.0,
        "speaker_recognized": false
    },
    "metadata": {"timestamp": "2025-05-01T09:30:00"}
}"#;

const HISTORY_JSON: &str = r#"{
    "total_records": 2,
    "data": [
        {
            "id": 1, "statement": "a", "fullText_based_content": "", "speaker": "",
            "sources": "", "prediction": "Real", "confidence": 0.88, "num_sources": 1,
            "has_official_source": true, "risk_level": "Low Risk",
            "timestamp": "2025-05-01T09:30:00", "input_completeness": 50.0
        },
        {
            "id": 2, "statement": "b", "fullText_based_content": "", "speaker": "",
            "sources": "", "prediction": "Fake", "confidence": 0.61, "num_sources": 0,
            "has_official_source": false, "risk_level": "Unheard Of",
            "timestamp": "2025-05-02T10:00:00", "input_completeness": 25.0
        }
    ]
}"#;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[test]
fn login_posts_form_and_returns_token() {
    let (client, server) = stub(vec![(200, TOKEN_JSON)]);
    let token = client.login("erin", "hunter22").unwrap();
    assert_eq!(token, "abc123");

    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/login");
    assert!(
        seen[0]
            .content_type
            .as_deref()
            .unwrap_or("")
            .starts_with("application/x-www-form-urlencoded")
    );
    assert!(seen[0].body.contains("username=erin"));
    assert!(seen[0].body.contains("password=hunter22"));
}

#[test]
fn authenticated_calls_send_bearer_token() {
    let (client, server) = stub(vec![(200, USER_JSON)]);
    let user = client.me("abc123").unwrap();
    assert_eq!(user.username, "erin");
    assert!(user.is_admin);

    let seen = server.join().unwrap();
    assert_eq!(seen[0].url, "/me");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer abc123"));
}

#[test]
fn status_codes_map_to_error_kinds() {
    let (client, server) = stub(vec![
        (401, r#"{"detail":"Could not validate credentials"}"#),
        (403, r#"{"detail":"Admin access required"}"#),
        (404, r#"{"detail":"Prediction not found"}"#),
        (500, "oops"),
    ]);

    match client.history("bad").unwrap_err() {
        ClientError::Authentication(msg) => assert_eq!(msg, "Could not validate credentials"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        client.model_performance("tok").unwrap_err(),
        ClientError::Forbidden(_)
    ));
    assert!(matches!(
        client.delete_history("tok", 99).unwrap_err(),
        ClientError::NotFound(_)
    ));
    assert!(matches!(
        client.history("tok").unwrap_err(),
        ClientError::Server { status: 500, .. }
    ));

    server.join().unwrap();
}

#[test]
fn validation_detail_list_is_joined() {
    let (client, server) = stub(vec![(
        422,
        r#"{"detail":[{"loc":["body","statement"],"msg":"field required","type":"missing"}]}"#,
    )]);
    let err = client
        .predict(Some("tok"), &PredictionRequest::default())
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(err.to_string().contains("field required"));
    server.join().unwrap();
}

#[test]
fn predict_sends_statement_and_parses_result() {
    let (client, server) = stub(vec![(200, PREDICTION_JSON)]);
    let request = PredictionRequest {
        statement: "The moon is made of cheese".into(),
        speaker: "someone".into(),
        ..Default::default()
    };
    let result = client.predict(Some("tok"), &request).unwrap();
    assert_eq!(result.prediction, Label::Fake);
    assert_eq!(result.trust_indicators.risk_level, RiskLevel::High);
    assert!(result.probabilities.is_normalized(1e-9));

    let seen = server.join().unwrap();
    assert_eq!(seen[0].url, "/predict");
    let sent: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(sent["statement"], "The moon is made of cheese");
    assert_eq!(sent["fullText_based_content"], "");
}

#[test]
fn delete_uses_record_path() {
    let (client, server) = stub(vec![(200, r#"{"message":"deleted"}"#)]);
    client.delete_history("tok", 42).unwrap();
    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "DELETE");
    assert_eq!(seen[0].url, "/history/42");
}

#[test]
fn unreachable_server_is_network_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let server = Server::http("127.0.0.1:0").unwrap();
        server.server_addr().to_ip().unwrap()
    };
    let client = ApiClient::new(&format!("http://{addr}"), Duration::from_millis(500));
    assert!(matches!(
        client.history("tok").unwrap_err(),
        ClientError::Network(_)
    ));
    assert!(!client.is_reachable());
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[test]
fn feed_refresh_parses_history_and_keeps_data_on_failure() {
    let (client, server) = stub(vec![(200, HISTORY_JSON), (500, "{}")]);
    let mut feed = HistoryFeed::new();

    let snapshot = feed.refresh(&client, "tok").unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.records()[1].risk_level, RiskLevel::Unknown);

    assert!(feed.refresh(&client, "tok").is_err());
    assert_eq!(feed.snapshot().len(), 2);
    server.join().unwrap();
}

// ---------------------------------------------------------------------------
// Session with file storage
// ---------------------------------------------------------------------------

#[test]
fn login_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (client, server) = stub(vec![(200, TOKEN_JSON), (200, USER_JSON)]);

    let mut store = SessionStore::init(FileStore::open(&path));
    store.login(&client, "erin", "hunter22").unwrap();
    assert!(store.is_admin());
    server.join().unwrap();

    let restored = SessionStore::init(FileStore::open(&path));
    assert_eq!(restored.token(), Some("abc123"));
    assert_eq!(restored.user().map(|u| u.id), Some(7));
}

#[test]
fn outdated_session_file_is_wiped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    {
        let mut old = FileStore::open(&path);
        old.set(VERSION_KEY, "v1.0").unwrap();
        old.set(TOKEN_KEY, "stale").unwrap();
        old.set("user", r#"{"username":"erin","id":7}"#).unwrap();
    }

    let store = SessionStore::init(FileStore::open(&path));
    assert_eq!(store.state(), &SessionState::Unauthenticated);

    let on_disk = FileStore::open(&path);
    assert!(on_disk.get(TOKEN_KEY).is_none());
    assert_eq!(on_disk.get(VERSION_KEY).as_deref(), Some(SCHEMA_VERSION));
}

#[test]
fn rejected_login_keeps_session_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (client, server) = stub(vec![(401, r#"{"detail":"Incorrect username or password"}"#)]);

    let mut store = SessionStore::init(FileStore::open(&path));
    let err = store.login(&client, "erin", "wrong").unwrap_err();
    assert!(err.is_auth());
    assert!(!store.is_authenticated());
    assert!(FileStore::open(&path).get(TOKEN_KEY).is_none());
    server.join().unwrap();
}

#[test]
fn logout_clears_locally_when_server_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let (client, server) = stub(vec![(200, TOKEN_JSON), (200, USER_JSON)]);

    let mut store = SessionStore::init(FileStore::open(&path));
    store.login(&client, "erin", "hunter22").unwrap();
    server.join().unwrap();

    // The stub has exited; the logout notification cannot be delivered.
    store.logout(&client);
    assert!(!store.is_authenticated());
    assert!(FileStore::open(&path).get(TOKEN_KEY).is_none());
}
