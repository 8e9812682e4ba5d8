mod client;
mod config;
mod error;
mod fanout;
mod identd;
mod irc;
mod logging;
mod manager;

use anyhow::Context;
use manager::ClientManager;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let relay = Arc::new(config::load_config().context("loading configuration")?);
    let store = config::ConfigStore::new(relay.users_dir.clone());

    let mut sessions = ClientManager::new(relay.clone(), store);
    let started = sessions.load_users();
    tracing::info!(users = started, "relay up");

    if relay.identd.enabled {
        let bind = relay.identd.bind.clone();
        let registry = sessions.ident_registry();
        tokio::spawn(async move {
            if let Err(e) = identd::run(bind, registry).await {
                tracing::error!(error = %e, "identd failed");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    sessions.quit_all();
    Ok(())
}
