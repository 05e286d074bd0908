//! # Observability
//!
//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout (`export` without `-o`,
//! `generate-template`) stays machine-readable. `RUST_LOG` overrides the
//! default `param_sync=info` filter.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "param_sync=info";

/// Install the global tracing subscriber
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // try_init: a subscriber may already be installed (tests, embedding)
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
