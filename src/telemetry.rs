use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to `primary_route_sync=info`.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "primary_route_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
