//! Tracing subscriber bootstrap
//!
//! Components log through `tracing` with a `source` field (`transport`,
//! `service:<name>`, `resource`, `session`); this module only decides where
//! those events go.

use tracing_subscriber::EnvFilter;
use tripdesk_domain::LogConfig;

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Returns `false` if a
/// global subscriber was already installed, which leaves the existing one in
/// place.
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = build_filter(config);

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "tracing initialized");
    }
    installed
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
