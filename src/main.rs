use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod commands;
mod config;
mod generals;
mod notify;
mod state;
mod transport;
mod watch;

use commands::CommandRouter;
use config::Config;
use generals::{GeneralsClient, MatchProvider};
use state::{persist, StateStore};
use transport::{onebot, Broadcaster, OneBotClient};
use watch::dedup::DedupCache;
use watch::{PollSupervisor, WatchContext};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Restore durable state; the process starts cleanly even with no file.
    let primary = PathBuf::from(&config.state_path);
    let backup = PathBuf::from(&config.backup_state_path);
    let snapshot = persist::load_snapshot(&primary, &backup);
    info!(
        "State restored: {} followed player(s), {} channel(s), {} operator(s)",
        snapshot.followed_players.len(),
        snapshot.channels.len(),
        snapshot.operators.len()
    );
    let store = StateStore::from_snapshot(snapshot);

    let provider: Arc<dyn MatchProvider> = Arc::new(GeneralsClient::new(&config.api_url)?);
    let broadcaster: Arc<dyn Broadcaster> = Arc::new(OneBotClient::new(&config.gateway_url)?);
    let dedup = Arc::new(DedupCache::new(Duration::from_secs(config.dedup_ttl_secs)));

    let ctx = WatchContext {
        store: store.clone(),
        provider: Arc::clone(&provider),
        broadcaster: Arc::clone(&broadcaster),
        dedup,
        poll_interval: Duration::from_secs(config.poll_interval_secs),
        max_backoff: Duration::from_secs(config.max_backoff_secs),
    };
    let supervisor = PollSupervisor::new(ctx);

    // Re-arm polling for every player that was enabled before the restart.
    for player in store.list_enabled_players() {
        supervisor.start(&player);
    }
    info!(
        "Resumed {} poll task(s) via {}",
        supervisor.running_count(),
        provider.name()
    );

    persist::spawn_snapshot_loop(
        store.clone(),
        primary.clone(),
        backup.clone(),
        Duration::from_secs(config.persist_interval_secs),
    );

    let router = Arc::new(CommandRouter::new(
        store.clone(),
        Arc::clone(&supervisor),
        Arc::clone(&provider),
    ));
    let app = onebot::router(onebot::TransportState {
        router,
        broadcaster: Arc::clone(&broadcaster),
    });

    let addr: SocketAddr = config.bind_addr.parse()?;
    info!("Listening for gateway events on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // One last flush so follows issued moments before shutdown survive.
    persist::write_snapshot(&store.snapshot(), &primary, &backup).await;

    Ok(())
}
