//! Configuration schema and defaults for verity.
//!
//! Defines the TOML-serializable configuration structure with the sections
//! `[api]`, `[dashboard]`, `[storage]`, and `[logging]`.
//!
//! Every field has a built-in default. Users only need to set the values
//! they want to override.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analytics::charts::DEFAULT_TIMELINE_CAP;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level verity configuration.
///
/// Maps directly to `~/.verity/config.toml` and `.verity.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerityConfig {
    pub api: ApiConfig,
    pub dashboard: DashboardConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [api]
// ---------------------------------------------------------------------------

/// Remote classification API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API (no trailing slash needed).
    pub base_url: String,
    /// Per-request timeout (milliseconds).
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Settings for the derived history views and refresh loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Maximum points kept by the timeline before it is subsampled.
    pub timeline_max_points: usize,
    /// Seconds between automatic history refreshes in `verity watch`.
    pub refresh_interval_secs: u64,
    /// Address the local web dashboard binds to.
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            timeline_max_points: DEFAULT_TIMELINE_CAP,
            refresh_interval_secs: 5,
            bind: "127.0.0.1:9747".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [storage]
// ---------------------------------------------------------------------------

/// Where the session file and activity log live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory. `~` is expanded to the home directory.
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "~/.verity".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve `dir` to an absolute path, expanding a leading `~`.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        expand_home(&self.dir)
    }

    pub fn session_file(&self) -> Option<PathBuf> {
        self.resolved_dir().map(|d| d.join("session.json"))
    }

    pub fn activity_file(&self) -> Option<PathBuf> {
        self.resolved_dir().map(|d| d.join("activity.jsonl"))
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Diagnostic level when `RUST_LOG` is unset: `error`, `warn`, `info`,
    /// `debug`, `trace`.
    pub level: String,
    /// Whether client actions are appended to the activity log.
    pub activity_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            activity_log: true,
        }
    }
}

/// Expand a leading `~` or `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl VerityConfig {
    /// Annotated default config file written by `verity config init`.
    pub fn default_toml() -> String {
        r#"# verity configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (VERITY_*)
#   2. Project config (.verity.toml in current directory)
#   3. User global config (~/.verity/config.toml)
#   4. Built-in defaults

[api]
base_url = "http://localhost:8000"
timeout_ms = 30000

[dashboard]
timeline_max_points = 1000      # timeline is subsampled above this many points
refresh_interval_secs = 5       # `verity watch` refresh period
bind = "127.0.0.1:9747"         # `verity web` listen address

[storage]
dir = "~/.verity"               # session.json and activity.jsonl live here

[logging]
level = "warn"                  # overridden by RUST_LOG when set
activity_log = true
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behavior() {
        let config = VerityConfig::default();
        assert_eq!(config.dashboard.timeline_max_points, 1000);
        assert_eq!(config.dashboard.refresh_interval_secs, 5);
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert!(config.logging.activity_log);
    }

    #[test]
    fn default_toml_parses_back() {
        let config: VerityConfig = toml::from_str(&VerityConfig::default_toml()).unwrap();
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.dashboard.bind, "127.0.0.1:9747");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: VerityConfig = toml::from_str("[api]\nbase_url = \"http://api:9000\"\n").unwrap();
        assert_eq!(config.api.base_url, "http://api:9000");
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.dashboard.timeline_max_points, 1000);
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/verity"), Some(PathBuf::from("/tmp/verity")));
    }

    #[test]
    fn storage_files_live_under_dir() {
        let storage = StorageConfig {
            dir: "/data/verity".to_string(),
        };
        assert_eq!(
            storage.session_file(),
            Some(PathBuf::from("/data/verity/session.json"))
        );
        assert_eq!(
            storage.activity_file(),
            Some(PathBuf::from("/data/verity/activity.jsonl"))
        );
    }
}
