//! Tracing subscriber setup for the server binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events the default filter lets through.
const CRATES: [&str; 5] = ["slip", "slip_server", "slip_room", "slip_protocol", "slip_transport"];

/// Builds the default filter directive, e.g. `slip=info,slip_room=info,...`.
fn default_directive(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs a `fmt` subscriber for the workspace crates.
///
/// `RUST_LOG`, when set, replaces the default filter entirely.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
