//! Logging configuration for pg-explain-capture.
//!
//! Standard output carries the result batch, so logs go to stderr or, when
//! requested, to a log file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` wins, otherwise `info` or `debug` when verbose.
fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to stderr.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to a file, falling back to stderr if it cannot be created.
pub fn init_file_logging(path: &Path, verbose: bool) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging(verbose);
            return;
        }
    }

    let log_file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            init_stderr_logging(verbose);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(log_file)
        .with_ansi(false) // No ANSI colors in file output
        .init();
}

/// Returns the default path for the log file.
///
/// Uses the XDG state directory on Linux (`~/.local/state/pg-explain-capture/capture.log`),
/// or falls back to the config directory on other platforms.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("pg-explain-capture").join("capture.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("pg-explain-capture").join("capture.log");
    }

    std::env::temp_dir().join("pg-explain-capture.log")
}
