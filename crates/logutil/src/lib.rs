//! Utilities for logging.
//!
//! Verbosity is controlled with `RUST_LOG` (e.g. `RUST_LOG=relseq=trace`).

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// Defaults to INFO when `RUST_LOG` is unset. Subsequent calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(LevelFilter::INFO))
        .try_init();
}

/// Install a subscriber that writes through the test harness' captured
/// output.
///
/// Defaults to TRACE so failing tests show the full combinator activity.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(LevelFilter::TRACE))
        .with_test_writer()
        .try_init();
}

fn env_filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice() {
        init_test();
        init_test();
        tracing::trace!("still alive");
    }
}
