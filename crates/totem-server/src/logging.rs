use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. Honors `RUST_LOG`; defaults
/// to `info` when unset.
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
}
