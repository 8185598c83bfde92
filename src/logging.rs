//! Structured logging setup.
//!
//! Terminal output always goes through a `fmt` layer; prepared experiments
//! additionally mirror every event into a plain-text log file.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub verbose: bool,
    pub ansi_colors: bool,
    /// Optional file receiving a copy of every event
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            ansi_colors: true,
            file: None,
        }
    }
}

impl LogConfig {
    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    /// `RUST_LOG` wins over the verbosity flag when it is set.
    fn filter(&self) -> EnvFilter {
        let fallback = if self.verbose { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }
}

/// Builds the subscriber described by `config`, creating the log file if any.
pub fn build_subscriber(config: &LogConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt::layer().with_ansi(config.ansi_colors).with_target(false))
        .with(file_layer))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    build_subscriber(config)?
        .try_init()
        .map_err(|e| Error::Logging(format!("failed to initialize logger: {e}")))
}
