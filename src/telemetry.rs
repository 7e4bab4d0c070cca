use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: `RUST_LOG`-style filter, JSON lines on stdout.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flex_aggregator::optimizer=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
