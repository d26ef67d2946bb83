use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use super::migrations;

/// Idle and lifetime limit for the pooled connection. Reaping it would drop
/// an in-memory database.
const CONNECTION_KEEPALIVE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Local SQLite database holding the replica tables and the mutation queue.
pub struct LocalStorage {
    pub conn: DatabaseConnection,
}

impl LocalStorage {
    /// Opens (or creates) the database file and brings its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Self::connect(&url).await
    }

    /// Private in-memory database, used by tests and `storage.in_memory = true`.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn connect(url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(url.to_owned());
        // One connection: SQLite serializes writers anyway and an in-memory
        // database only exists on the connection that created it.
        options
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(CONNECTION_KEEPALIVE)
            .max_lifetime(CONNECTION_KEEPALIVE)
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .with_context(|| format!("Failed to open local database at {url}"))?;

        let version = migrations::run(&conn).await?;
        info!("Local replica ready (schema v{version})");

        Ok(Self { conn })
    }

    /// Clears every replica table and the mutation queue.
    pub async fn clear_all_data(&self) -> Result<()> {
        migrations::truncate_all(&self.conn).await
    }
}
