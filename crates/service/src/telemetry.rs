//! Tracing initialization for embedding binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
///
/// Called once at startup by whatever binary embeds the service. Respects
/// `RUST_LOG`, defaulting to `paceline=info`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paceline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
