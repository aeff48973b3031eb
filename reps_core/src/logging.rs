//! Tracing setup for the `reps` binary.
//!
//! Diagnostics go to stderr so the interactive timer can redraw its line on
//! stdout without interleaving.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at WARN unless `RUST_LOG` says otherwise
pub fn init() {
    init_with_level("warn")
}

/// Install the global subscriber with `default_level` as the fallback filter
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route debug output through the test harness; repeat calls are ignored
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
