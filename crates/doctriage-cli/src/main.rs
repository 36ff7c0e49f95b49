//! doctriage - document classification benchmarking.
//!
//! Sends PDF pages (or their text) to hosted vision models, scores the
//! predicted document types against a validation dataset and writes reports.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // The `doctriage` target prefix also covers the other workspace crates.
    let default_filter = if cli::is_verbose() {
        "doctriage=info"
    } else {
        "doctriage=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
