use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layered, SubscriberExt},
    registry::Registry,
};

/// Formatted output filtered by `RUST_LOG`, defaulting to `info`.
pub fn subscriber() -> Layered<EnvFilter, Layered<fmt::Layer<Registry>, Registry>> {
    tracing_subscriber::registry().with(fmt::layer()).with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
}
