//! Constants used throughout the application
//!
//! This module centralizes file names, defaults and user-facing messages.

pub const APP_NAME: &str = "fieldnote";

// Configuration
pub const LOCAL_CONFIG_FILE_NAME: &str = "fieldnote.toml";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const CONFIG_GENERATED: &str = "✅ Generated default configuration";

// Sync defaults
pub const DEFAULT_PULL_INTERVAL_SECS: u64 = 30;
pub const MAX_PULL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

// Logging
pub const LOG_FILE_NAME: &str = "fieldnote.log";
/// Lines kept in memory for `Logger::recent_logs`
pub const LOG_BUFFER_CAPACITY: usize = 500;
