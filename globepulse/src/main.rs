mod server;
mod ws;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use globepulse_core::{
    load_config, logging,
    service::{PresenceHub, RegionStatsStore},
};

use server::AppState;

#[derive(Parser, Debug)]
#[command(name = "globepulse", about = "Live visitor presence server")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "GLOBEPULSE_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = load_config(cli.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("GlobePulse server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Open the durable region counter store
    let store = RegionStatsStore::open(&config.storage.stats_path).await;

    // 4. Spawn the presence hub actor
    let (hub, hub_task) = PresenceHub::spawn(store);
    info!("Presence hub started");

    // 5. Serve until shutdown
    let state = AppState {
        hub: hub.clone(),
        presence: config.presence.clone(),
    };
    server::serve(&config, state).await?;

    // 6. Drain: the listener is gone, so no new sessions arrive; dropping
    // the last handle lets the hub finish queued fan-outs and exit.
    drop(hub);
    hub_task.await?;
    info!("GlobePulse server stopped");

    Ok(())
}
