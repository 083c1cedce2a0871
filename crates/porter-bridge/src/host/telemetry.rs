//! Log output for the bridge.
//!
//! Stdout carries the controller protocol, so every log line goes to stderr.
//! The filter is read from `RUST_LOG` and defaults to `info`.
//!
//! Events are only emitted when the `tracing` feature is enabled:
//!
//! ```bash
//! RUST_LOG=porter=debug cargo run --features tracing -- --policy eager
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
