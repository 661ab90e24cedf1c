//! Telemetry initialization.
//!
//! Controlled by `REDLINE_LOG_FORMAT`:
//! - unset or `"text"` → human-readable events to stderr
//! - `"json"` → JSON events to stderr
//!
//! Filtering uses the standard `RUST_LOG` env var (default `info`).
//! Embedders that install their own subscriber can skip this entirely;
//! the engine only emits `tracing` events and never requires a subscriber.

use tracing_subscriber::EnvFilter;

/// Initialize a process-global tracing subscriber.
///
/// Safe to call more than once: if a global subscriber is already
/// installed (by a test harness or an embedder), this is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("REDLINE_LOG_FORMAT").is_ok_and(|v| v == "json");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // Already-installed subscriber is expected in tests; ignore.
    drop(result);
}
