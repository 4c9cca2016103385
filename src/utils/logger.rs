use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// Streamed answers go to stdout, so every log line is written to stderr.
pub fn init_logger(verbose: bool) {
    // RUST_LOG wins; otherwise stay quiet unless asked to be verbose
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A second call keeps the subscriber installed first
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .try_init()
        .ok();
}

/// Status line for the CLI, kept out of stdout
pub fn log_status(message: impl std::fmt::Display) {
    eprintln!("{}", message);
}
