//! Salem multiplayer room server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod protocol;
mod room;
mod server;

use config::ServerConfig;
use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        addr = %config.addr,
        night_delay_ms = config.night_delay.as_millis() as u64,
        character_select_ms = config.character_select.as_millis() as u64,
        "Starting Salem server..."
    );

    let state = Arc::new(ServerState::new(config));

    server::run_server(state).await
}
