//! Diagnostics go to stderr so they never mix with command output on stdout.
//!
//! `RUST_LOG` wins when set; otherwise `--verbose` selects `debug` and the
//! default is `warn`.

use tracing_subscriber::{EnvFilter, fmt};

pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "qpq=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .without_time()
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }
}
