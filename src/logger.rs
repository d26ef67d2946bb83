//! Process-wide logging.
//!
//! Call sites use the `log` macros. [`Logger::install`] routes them through a
//! `fern` dispatch to an optional log file and to an in-memory ring of recent
//! lines that a frontend can display.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Local;
use log::LevelFilter;

use crate::config::{Config, LoggingConfig};
use crate::constants::{LOG_BUFFER_CAPACITY, LOG_FILE_NAME};

/// Shared logger that can be used across the application
#[derive(Clone)]
pub struct Logger {
    logs: Arc<Mutex<VecDeque<String>>>,
    level: LevelFilter,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// In-memory only, `info` and above.
    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(VecDeque::with_capacity(LOG_BUFFER_CAPACITY))),
            level: LevelFilter::Info,
            log_file: None,
        }
    }

    /// Builds a logger from the `[logging]` section. File logging goes to
    /// [`Logger::get_log_file_path`].
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        let mut logger = Self::new();
        logger.level = config.level_filter();
        if config.enabled && config.file {
            logger.log_file = Some(Self::get_log_file_path()?);
        }
        Ok(logger)
    }

    /// Redirects file output to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.level != LevelFilter::Off
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Fern dispatch feeding the log file and the in-memory ring.
    ///
    /// Levels are filtered once at the top. File lines carry a timestamp,
    /// level and target; the ring keeps the bare message.
    pub fn dispatch(&self) -> Result<fern::Dispatch> {
        let mut dispatch = fern::Dispatch::new()
            .level(self.level)
            // sqlx and sea-orm are chatty at info
            .level_for("sqlx", LevelFilter::Warn)
            .level_for("sea_orm", LevelFilter::Warn);

        if let Some(path) = &self.log_file {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
            let file = fern::log_file(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            dispatch = dispatch.chain(
                fern::Dispatch::new()
                    .format(|out, message, record| {
                        out.finish(format_args!(
                            "[{} {:<5} {}] {}",
                            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                            record.level(),
                            record.target(),
                            message
                        ))
                    })
                    .chain(file),
            );
        }

        let logs = Arc::clone(&self.logs);
        dispatch = dispatch.chain(fern::Dispatch::new().chain(fern::Output::call(move |record| {
            push_line(&logs, record.args().to_string());
        })));

        Ok(dispatch)
    }

    /// Installs this logger as the global `log` backend. Only the first call
    /// in a process succeeds.
    pub fn install(&self) -> Result<()> {
        self.dispatch()?
            .apply()
            .context("A global logger is already installed")
    }

    /// Add a log entry directly to the in-memory ring
    pub fn log(&self, message: String) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), message);
        push_line(&self.logs, line);
    }

    /// Recent lines, newest first
    pub fn recent_logs(&self) -> Vec<String> {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.iter().rev().cloned().collect()
    }

    /// Clear all logs
    pub fn clear(&self) {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Default log file location under the data directory
    pub fn get_log_file_path() -> Result<PathBuf> {
        Ok(Config::get_data_dir()?.join(LOG_FILE_NAME))
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

fn push_line(logs: &Mutex<VecDeque<String>>, line: String) {
    let mut logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
    if logs.len() == LOG_BUFFER_CAPACITY {
        logs.pop_front();
    }
    logs.push_back(line);
}
