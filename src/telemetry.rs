use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

pub const DEFAULT_FILTER: &str = "wc26_predictor=info,warn";

/// Log to stderr so stdout carries only prediction output. `RUST_LOG`
/// overrides the default filter. Calling this twice is harmless.
pub fn init() {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
