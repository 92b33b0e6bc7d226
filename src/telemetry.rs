//! Structured logging setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Initializes a JSON-formatted global subscriber, honoring `RUST_LOG` with
/// `info` as the default level.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .expect("telemetry subscriber installs exactly once at startup");
}
