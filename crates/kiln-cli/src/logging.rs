//! Diagnostics for the CLI host.
//!
//! Tracing output goes to stderr so stdout carries only tool results. The
//! filter comes from `RUST_LOG` (a `.env` file is honored) and defaults to
//! `warn`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
