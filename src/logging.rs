//! Logging setup for the `shapegen` binary. The library only emits events.

use tracing::Level;

/// Map `-v` count and `-q` to a level (0 = INFO, 1 = DEBUG, 2+ = TRACE, quiet = ERROR).
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Install a stderr fmt subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let default = level_for(verbose, quiet).to_string().to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
