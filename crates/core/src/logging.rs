//! Tracing initialization for the XMM engine.
//!
//! Two output modes:
//! - **JSON** (`LogFormat::Json`): machine-readable lines with nanosecond
//!   timestamps for production log aggregation.
//! - **Pretty** (`LogFormat::Pretty`): colored human-readable output for
//!   development.
//!
//! Filtering respects `RUST_LOG` (e.g. `RUST_LOG=xmm_book=trace,info`);
//! `default_level` applies when the variable is unset. Only the binary calls
//! [`init_tracing`]; library crates emit events and never install global
//! subscribers.

use std::fmt;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON with nanosecond timestamps.
    Json,
    /// Human-readable colored output.
    Pretty,
}

/// Install the global tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(format: LogFormat, default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(NanosecondTimer)
                .with_target(true)
                .with_thread_ids(true)
                .with_span_events(FmtSpan::CLOSE);
            registry.with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_span_events(FmtSpan::CLOSE);
            registry.with(layer).init();
        }
    }
}

/// Wall-clock timer with nanosecond precision for JSON output.
#[derive(Debug, Clone)]
struct NanosecondTimer;

impl tracing_subscriber::fmt::time::FormatTime for NanosecondTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.9fZ"))
    }
}
