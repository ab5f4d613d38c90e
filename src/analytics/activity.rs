//! Local activity log: one JSON line per client action.
//!
//! Log file: `~/.verity/activity.jsonl` (under the configured storage dir).
//! Writes are best-effort; a failure never interrupts the action being logged.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::VerityConfig;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Login,
    Register,
    Logout,
    Predict,
    Delete,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
    pub success: bool,
    /// Error message on failure, or a short result summary on success
    /// (e.g. `"Fake 91.2%"`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn from_config(config: &VerityConfig) -> Self {
        if !config.logging.activity_log {
            return Self::disabled();
        }
        match config.storage.activity_file() {
            Some(path) => Self::at(path),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn record(&self, action: Action, user: Option<&str>, success: bool, detail: Option<String>) {
        let entry = ActivityEntry {
            timestamp: Utc::now().to_rfc3339(),
            action,
            user: user.map(str::to_string),
            success,
            detail,
        };
        if let Err(e) = self.append(&entry) {
            tracing::debug!(error = %e, "failed to write activity log");
        }
    }

    /// Record the outcome of a fallible action.
    pub fn record_result<T, E: std::fmt::Display>(
        &self,
        action: Action,
        user: Option<&str>,
        result: &Result<T, E>,
    ) {
        match result {
            Ok(_) => self.record(action, user, true, None),
            Err(e) => self.record(action, user, false, Some(e.to_string())),
        }
    }

    /// The last `limit` entries, oldest first. Malformed lines are skipped.
    pub fn read_recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        let entries: Vec<ActivityEntry> = BufReader::new(file)
            .lines()
            .map_while(std::result::Result::ok)
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();
        let skip = entries.len().saturating_sub(limit);
        entries.into_iter().skip(skip).collect()
    }

    fn append(&self, entry: &ActivityEntry) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::at(dir.path().join("activity.jsonl"));

        log.record(Action::Login, Some("ann"), true, None);
        log.record(Action::Predict, Some("ann"), true, Some("Real 88.0%".into()));
        log.record(Action::Delete, Some("ann"), false, Some("Forbidden".into()));

        let all = log.read_recent(10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, Action::Login);
        assert!(!all[2].success);

        let last = log.read_recent(1);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].action, Action::Delete);
    }

    #[test]
    fn skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let log = ActivityLog::at(&path);
        log.record(Action::Refresh, None, true, None);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "garbage").unwrap();
        log.record(Action::Logout, Some("ann"), true, None);

        let entries = log.read_recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, Action::Logout);
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = ActivityLog::disabled();
        log.record(Action::Login, Some("ann"), true, None);
        assert!(log.read_recent(5).is_empty());
        assert!(!log.is_enabled());
    }

    #[test]
    fn record_result_captures_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::at(dir.path().join("a.jsonl"));
        let failed: std::result::Result<(), String> = Err("timed out".into());
        log.record_result(Action::Refresh, None, &failed);
        let entry = &log.read_recent(1)[0];
        assert_eq!(entry.detail.as_deref(), Some("timed out"));
    }
}
