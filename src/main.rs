//! atc24-relay: live traffic relay for the ATC24 feed
//!
//!  Ingests the upstream WebSocket feed, tracks the aircraft roster,
//!  and fans updates out to subscribers over WebSocket and HTTP.

mod config;
mod errors;
mod network;
mod phase;
mod protocol;
mod roster;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::phase::Ruleset;
use crate::roster::Store;
use crate::upstream::FeedClient;

const UPDATE_CAPACITY: usize = 1024;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    info!("atc24-relay starting...");
    info!("Configuration: {:?}", config);

    let ruleset = if config.corrected_phases {
        Ruleset::Corrected
    } else {
        Ruleset::Coarse
    };
    let store = Arc::new(RwLock::new(Store::new(
        ruleset,
        Duration::from_secs(config.stale_grace_secs),
    )));

    // fanout channel; subscriber tasks hold the receivers
    let (updates_tx, _) = broadcast::channel(UPDATE_CAPACITY);

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let (client, feed) = FeedClient::new(
            config.feed_url.clone(),
            Duration::from_secs(config.reconnect_secs),
            Duration::from_secs(config.connect_fail_secs),
            Arc::clone(&store),
            updates_tx.clone(),
        );

        let feed_task = tokio::spawn(client.run());

        let net_task = {
            let cfg = config.clone();
            let store = Arc::clone(&store);
            let feed = feed.clone();
            let tx = updates_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = network::run_servers(cfg, store, feed, tx).await {
                    error!("Network error: {}", e);
                }
            })
        };

        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down");

        feed.disconnect();
        net_task.abort();
        feed_task.abort();
    });

    Ok(())
}
