use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::{BenchError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug` for this
/// crate and `info` is the default. Console output goes to stderr so it does
/// not interleave with progress bars on stdout. When `log_file` is given the
/// same events are appended to it without ANSI colouring.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_directive = if verbose {
        "weather_load_bench=debug,info"
    } else {
        "info"
    };
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console = fmt::layer()
        .compact()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| BenchError::Config(format!("Failed to initialize logging: {}", e)))
}
