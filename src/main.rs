use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use fieldnote::config::Config;
use fieldnote::logger::Logger;
use fieldnote::remote::HttpRemote;
use fieldnote::session::Session;
use fieldnote::storage::LocalStorage;
use fieldnote::sync::scheduler::{Scheduler, SchedulerOptions};
use fieldnote::sync::SyncService;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "--init-config") {
        let path = Config::get_default_config_path()?;
        Config::generate_default_config(&path)?;
        return Ok(());
    }

    let config = Config::load()?;

    let logger = Logger::from_config(&config.logging)?;
    logger.install()?;

    let storage = match config.storage.resolved_database_path()? {
        Some(path) => LocalStorage::open(&path).await?,
        None => LocalStorage::in_memory().await?,
    };

    let session = Session::new();
    match (
        std::env::var(&config.remote.user_id_env),
        std::env::var(&config.remote.api_token_env),
    ) {
        (Ok(user_id), Ok(token)) if !user_id.is_empty() && !token.is_empty() => {
            session.login(user_id, token);
        }
        _ => {
            eprintln!(
                "❌ Error: {} and {} must be set to sync",
                config.remote.user_id_env, config.remote.api_token_env
            );
            eprintln!("\n💡 Local data stays available; sync resumes once both are set.");
            warn!("Starting without a session");
        }
    }

    let remote = HttpRemote::new(&config.remote.base_url, config.remote.timeout(), session.clone())
        .context("Failed to build the remote client")?;
    info!("fieldnote {} syncing against {}", env!("CARGO_PKG_VERSION"), remote.base_url());
    let service = SyncService::new(&storage, Arc::new(remote), session).await?;
    let scheduler = Scheduler::start(service, SchedulerOptions::from(&config.sync));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
    }
    info!("Shutting down");
    scheduler.shutdown().await;

    Ok(())
}
