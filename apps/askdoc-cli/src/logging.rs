use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,lance=warn,lancedb=warn";

/// Human-readable logs on stderr, filtered by `RUST_LOG`.
///
/// Stdout stays reserved for answers and reports.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
