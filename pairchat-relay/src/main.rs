//! `PairChat` relay server: anonymous two-party matchmaking and chat relay.
//!
//! An axum WebSocket server that pairs connecting clients through a shared
//! waiting queue and relays their chat messages over a shared pub/sub
//! channel. With `--store-url` the queue and channel live in Redis and any
//! number of server processes can share them; without it they live in
//! memory and serve a single process.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000
//! cargo run --bin pairchat-relay
//!
//! # Run on custom address
//! cargo run --bin pairchat-relay -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! PAIRCHAT_ADDR=127.0.0.1:8080 cargo run --bin pairchat-relay
//!
//! # Share pairing and chat with other processes through Redis
//! cargo run --bin pairchat-relay -- --store-url redis://127.0.0.1:6379
//! ```

use std::sync::Arc;

use clap::Parser;
use pairchat_relay::config::{RelayCliArgs, RelayConfig};
use pairchat_relay::server::{self, ServerState};
use pairchat_relay::redis_store::RedisStore;
use pairchat_relay::store::{MemoryStore, SharedStore};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        queue_key = %config.queue_key,
        channel = %config.channel,
        "starting pairchat relay server"
    );

    match config.store_url.as_deref() {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => serve(Arc::new(store), &config).await,
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to shared store");
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("no store URL configured, using in-memory store");
            serve(Arc::new(MemoryStore::new()), &config).await;
        }
    }
}

/// Runs the server over `store` until it stops.
async fn serve<S: SharedStore>(store: Arc<S>, config: &RelayConfig) {
    let state = Arc::new(ServerState::with_config(store, config));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
