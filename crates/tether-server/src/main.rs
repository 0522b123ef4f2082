//! Tether server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:3000
//! ROOM_SECRET=hunter2 tether-server
//!
//! # Explicit address and verbose logging
//! tether-server --host 127.0.0.1 --port 8080 --room-secret hunter2 --log-level debug
//! ```

use clap::Parser;
use tether_core::RoomSecret;
use tether_server::{RelayConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tether relay server
#[derive(Parser, Debug)]
#[command(name = "tether-server")]
#[command(about = "Room-based controller/target WebSocket relay")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "TETHER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Shared secret every join's room code must match
    #[arg(long, env = "ROOM_SECRET", hide_env_values = true)]
    room_secret: String,

    /// Maximum concurrent connections
    #[arg(long, env = "TETHER_MAX_CONNECTIONS", default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Tether server starting");

    let config = ServerRuntimeConfig {
        bind_address: format_bind_address(&args.host, args.port),
        driver: RelayConfig {
            room_secret: RoomSecret::new(args.room_secret),
            max_connections: args.max_connections,
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

/// Join host and port, bracketing bare IPv6 hosts.
fn format_bind_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
