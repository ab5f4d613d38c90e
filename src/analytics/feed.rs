//! History refresh.
//!
//! A [`HistoryFeed`] owns the current [`HistorySnapshot`]. Each successful
//! refresh replaces it wholesale with a new generation; a failed refresh
//! keeps whatever was there before.

use chrono::{DateTime, Utc};

use super::cache::HistorySnapshot;
use crate::api::ApiClient;
use crate::api::types::HistoryRecord;
use crate::error::ClientResult;

/// Where history comes from. Implemented by [`ApiClient`]; tests substitute
/// their own.
pub trait HistorySource {
    fn fetch_history(&self, token: &str) -> ClientResult<Vec<HistoryRecord>>;
}

impl HistorySource for ApiClient {
    fn fetch_history(&self, token: &str) -> ClientResult<Vec<HistoryRecord>> {
        self.history(token).map(|response| response.data)
    }
}

#[derive(Debug, Default)]
pub struct HistoryFeed {
    snapshot: HistorySnapshot,
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl HistoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &HistorySnapshot {
        &self.snapshot
    }

    /// Time of the last successful refresh.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Message of the most recent failed refresh, cleared on success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch history and replace the snapshot.
    ///
    /// On error the previous snapshot stays in place and the error is returned.
    pub fn refresh(
        &mut self,
        source: &impl HistorySource,
        token: &str,
    ) -> ClientResult<&HistorySnapshot> {
        match source.fetch_history(token) {
            Ok(records) => {
                self.replace(records);
                self.last_refresh = Some(Utc::now());
                self.last_error = None;
                tracing::info!(
                    records = self.snapshot.len(),
                    generation = self.snapshot.generation(),
                    "history refreshed"
                );
                Ok(&self.snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "history refresh failed, keeping previous data");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drop a record locally, e.g. after the server confirmed its deletion.
    /// Returns whether a record was removed.
    pub fn remove(&mut self, id: i64) -> bool {
        if !self.snapshot.records().iter().any(|r| r.id == id) {
            return false;
        }
        let remaining = self
            .snapshot
            .records()
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        self.replace(remaining);
        true
    }

    fn replace(&mut self, records: Vec<HistoryRecord>) {
        let generation = self.snapshot.generation() + 1;
        self.snapshot = HistorySnapshot::new(records, generation);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::api::types::{Label, RiskLevel};
    use crate::error::ClientError;

    /// Replays queued responses in order.
    struct Scripted(RefCell<Vec<ClientResult<Vec<HistoryRecord>>>>);

    impl Scripted {
        fn new(mut responses: Vec<ClientResult<Vec<HistoryRecord>>>) -> Self {
            responses.reverse();
            Self(RefCell::new(responses))
        }
    }

    impl HistorySource for Scripted {
        fn fetch_history(&self, _token: &str) -> ClientResult<Vec<HistoryRecord>> {
            self.0
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(ClientError::Network("script exhausted".into())))
        }
    }

    fn record(id: i64) -> HistoryRecord {
        HistoryRecord {
            id,
            statement: format!("s{id}"),
            full_text: String::new(),
            speaker: String::new(),
            sources: String::new(),
            prediction: Label::Real,
            confidence: 0.9,
            num_sources: 1,
            has_official_source: false,
            risk_level: RiskLevel::Low,
            timestamp: "2025-02-01T00:00:00".into(),
            input_completeness: 100.0,
        }
    }

    #[test]
    fn refresh_replaces_snapshot_with_new_generation() {
        let source = Scripted::new(vec![Ok(vec![record(1)]), Ok(vec![record(1), record(2)])]);
        let mut feed = HistoryFeed::new();

        assert_eq!(feed.refresh(&source, "t").unwrap().len(), 1);
        let first_gen = feed.snapshot().generation();
        assert_eq!(feed.refresh(&source, "t").unwrap().len(), 2);
        assert!(feed.snapshot().generation() > first_gen);
        assert!(feed.last_refresh().is_some());
    }

    #[test]
    fn failed_refresh_keeps_previous_data() {
        let source = Scripted::new(vec![
            Ok(vec![record(1), record(2)]),
            Err(ClientError::Network("down".into())),
        ]);
        let mut feed = HistoryFeed::new();
        feed.refresh(&source, "t").unwrap();
        let generation = feed.snapshot().generation();

        assert!(feed.refresh(&source, "t").is_err());
        assert_eq!(feed.snapshot().len(), 2);
        assert_eq!(feed.snapshot().generation(), generation);
        assert!(feed.last_error().unwrap().contains("down"));
    }

    #[test]
    fn remove_drops_one_record() {
        let source = Scripted::new(vec![Ok(vec![record(1), record(2), record(3)])]);
        let mut feed = HistoryFeed::new();
        feed.refresh(&source, "t").unwrap();

        assert!(feed.remove(2));
        assert!(!feed.remove(2));
        let ids: Vec<i64> = feed.snapshot().records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
