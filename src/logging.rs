//! Log output setup for the command-line tool.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "toy_gpt_rs=info,toy_gpt=info";

/// Install a `fmt` subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Log a section banner.
pub fn log_header(title: &str) {
    let rule = "=".repeat(title.chars().count().max(20));
    tracing::info!("{rule}");
    tracing::info!("{title}");
    tracing::info!("{rule}");
}
