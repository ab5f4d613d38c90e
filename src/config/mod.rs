//! Configuration system for verity.
//!
//! Provides a layered configuration hierarchy:
//!
//! 1. **Built-in defaults**: [`schema::VerityConfig::default()`]
//! 2. **User global config**: `~/.verity/config.toml`
//! 3. **Project local config**: `.verity.toml` in the current working directory
//! 4. **Environment variables**: `VERITY_*` overrides (highest precedence)
//!
//! Layers are merged key by key: a file that only sets `api.base_url` leaves
//! every other value from the previous layer intact.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::VerityConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Malformed files are skipped with a warning rather than aborting the
/// command; the remaining layers still apply.
pub fn load() -> VerityConfig {
    let mut merged = defaults_value();

    for path in [global_config_path(), project_config_path()]
        .into_iter()
        .flatten()
    {
        if let Some(layer) = load_toml_file(&path) {
            merge_values(&mut merged, layer);
        }
    }

    let mut config: VerityConfig = merged.try_into().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config layers did not resolve, using defaults");
        VerityConfig::default()
    });

    apply_env_overrides(&mut config);
    config
}

fn defaults_value() -> toml::Value {
    toml::Value::try_from(VerityConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

fn load_toml_file(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Tables merge per key; any other
/// value in the overlay replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".verity").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".verity.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `VERITY_API_URL`: API base URL
/// - `VERITY_API_TIMEOUT_MS`: request timeout
/// - `VERITY_TIMELINE_MAX_POINTS`: timeline subsampling cap
/// - `VERITY_REFRESH_SECS`: `watch` refresh interval
/// - `VERITY_STORAGE_DIR`: data directory
/// - `VERITY_LOG`: diagnostic level
/// - `VERITY_ACTIVITY_LOG`: activity log toggle (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut VerityConfig) {
    if let Ok(val) = std::env::var("VERITY_API_URL")
        && !val.is_empty()
    {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("VERITY_API_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.api.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("VERITY_TIMELINE_MAX_POINTS")
        && let Ok(n) = val.parse::<usize>()
    {
        config.dashboard.timeline_max_points = n;
    }
    if let Ok(val) = std::env::var("VERITY_REFRESH_SECS")
        && let Ok(secs) = val.parse::<u64>()
    {
        config.dashboard.refresh_interval_secs = secs;
    }
    if let Ok(val) = std::env::var("VERITY_STORAGE_DIR")
        && !val.is_empty()
    {
        config.storage.dir = val;
    }
    if let Ok(val) = std::env::var("VERITY_LOG")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var("VERITY_ACTIVITY_LOG") {
        config.logging.activity_log = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.verity/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.verity/ directory")?;
    }

    fs::write(&path, VerityConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single dotted key (e.g. `api.base_url`) in the global config file.
///
/// Starts from the existing file, or from serialized defaults when no file
/// exists yet.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    let updated = set_value_in_document(
        path.exists()
            .then(|| fs::read_to_string(&path))
            .transpose()
            .context("failed to read config file")?
            .as_deref(),
        key,
        value,
    )?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;
    Ok(())
}

/// Apply a dotted-key update to a TOML document and return the new text.
///
/// Keys are validated against the full schema, so a key that does not exist
/// in the defaults is rejected even if the document omits its section.
fn set_value_in_document(existing: Option<&str>, key: &str, raw_value: &str) -> Result<String> {
    let mut document = defaults_value();
    if let Some(content) = existing {
        let parsed: toml::Value =
            toml::from_str(content).context("failed to parse config as TOML value")?;
        merge_values(&mut document, parsed);
    }

    set_toml_value(&mut document, key, raw_value)?;

    // Round-trip through the schema so type errors surface here, not on load.
    let _: VerityConfig = document
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}': {raw_value}"))?;

    toml::to_string_pretty(&document).context("failed to serialize updated config")
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected a section before '{leaf}' in '{key}'"))?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::String(_)) => toml::Value::String(raw_value.to_string()),
        Some(_) => anyhow::bail!("'{key}' is a section, not a value"),
        None => anyhow::bail!("unknown config key: '{key}'"),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_truthy_accepts_variants() {
        for yes in ["1", "true", "TRUE", "yes", "on", "ON"] {
            assert!(is_truthy(yes), "{yes}");
        }
        for no in ["0", "false", "no", "off", ""] {
            assert!(!is_truthy(no), "{no}");
        }
    }

    #[test]
    fn merge_values_keeps_unset_keys() {
        let mut base = defaults_value();
        let overlay: toml::Value = toml::from_str("[api]\ntimeout_ms = 500\n").unwrap();
        merge_values(&mut base, overlay);

        let config: VerityConfig = base.try_into().unwrap();
        assert_eq!(config.api.timeout_ms, 500);
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn set_value_updates_string() {
        let out = set_value_in_document(None, "api.base_url", "https://verity.example").unwrap();
        let config: VerityConfig = toml::from_str(&out).unwrap();
        assert_eq!(config.api.base_url, "https://verity.example");
    }

    #[test]
    fn set_value_updates_integer_in_existing_document() {
        let existing = "[dashboard]\nrefresh_interval_secs = 10\n";
        let out =
            set_value_in_document(Some(existing), "dashboard.timeline_max_points", "250").unwrap();
        let config: VerityConfig = toml::from_str(&out).unwrap();
        assert_eq!(config.dashboard.timeline_max_points, 250);
        assert_eq!(config.dashboard.refresh_interval_secs, 10);
    }

    #[test]
    fn set_value_updates_bool() {
        let out = set_value_in_document(None, "logging.activity_log", "off").unwrap();
        let config: VerityConfig = toml::from_str(&out).unwrap();
        assert!(!config.logging.activity_log);
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        assert!(set_value_in_document(None, "api.nonexistent", "x").is_err());
        assert!(set_value_in_document(None, "nosection.key", "x").is_err());
        assert!(set_value_in_document(None, "", "x").is_err());
    }

    #[test]
    fn set_value_rejects_bad_integer() {
        assert!(set_value_in_document(None, "api.timeout_ms", "soon").is_err());
    }

    #[test]
    fn set_value_rejects_section_target() {
        assert!(set_value_in_document(None, "api", "x").is_err());
    }

    #[test]
    fn show_effective_config_returns_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: VerityConfig = toml::from_str(&toml_str).unwrap();
    }
}
