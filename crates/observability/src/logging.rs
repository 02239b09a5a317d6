//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LEVEL: &str = "info";

/// Filter from `RUST_LOG`, falling back to `level` (then [`DEFAULT_LEVEL`]) when unset or
/// unparsable.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install the global subscriber: JSON lines when `json`, human-readable otherwise.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with(level: &str, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init_with("debug", false);
        init_with("info", true);
        tracing::info!("still logging");
    }
}
