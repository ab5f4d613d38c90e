//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr so that `--format json` output on stdout stays
//! machine-readable. `RUST_LOG` wins over the configured level.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Scope the configured level to this crate so dependencies stay quiet.
fn default_directive(level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        l @ ("error" | "warn" | "info" | "debug" | "trace" | "off") => l.to_string(),
        _ => "warn".to_string(),
    };
    format!("verity={level}")
}
