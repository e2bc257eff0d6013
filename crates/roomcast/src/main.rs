//! Roomcast server entry point.
//!
//! Configuration comes from `ROOMCAST_ADDR`, `ROOMCAST_PATH`, and
//! `ROOMCAST_KEEPALIVE_SECS`; a first command-line argument overrides the
//! listen address. Log levels follow `RUST_LOG` (default `roomcast=info`).
//! Ctrl-C stops accepting new connections and exits.

use std::env;

use tracing_subscriber::EnvFilter;

use roomcast::{ChatServer, RoomcastError, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), RoomcastError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomcast=info")),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = ChatServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr(), path = %server.config().path, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c, running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await
}
