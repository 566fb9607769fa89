//! Slip room server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin slip-server
//! cargo run --bin slip-server -- --port 8080 --max-players 8
//! PORT=8080 SLIP_ROOM_TTL_SECS=600 cargo run --bin slip-server
//! ```

use std::time::Duration;

use clap::Parser;
use slip::logging::init_tracing;
use slip::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "slip-server")]
#[command(about = "Real-time party-room server over WebSocket", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "SLIP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value_t = 5001)]
    port: u16,

    /// Seconds a room may sit idle before it is deleted
    #[arg(long, env = "SLIP_ROOM_TTL_SECS", default_value_t = 3600)]
    room_ttl_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(
        long,
        env = "SLIP_SWEEP_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sweep_interval_secs: u64,

    /// Maximum players per room
    #[arg(
        long,
        env = "SLIP_MAX_PLAYERS",
        default_value_t = 6,
        value_parser = clap::value_parser!(u16).range(2..)
    )]
    max_players: u16,

    /// Seconds a connection may send nothing, pongs included, before it is closed (0 disables)
    #[arg(long, env = "SLIP_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    idle_timeout_secs: u64,

    /// Seconds between server pings to each client (0 disables)
    #[arg(long, env = "SLIP_KEEPALIVE_SECS", default_value_t = 30)]
    keepalive_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_players: usize::from(self.max_players),
            ttl: Duration::from_secs(self.room_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            ..RoomConfig::default()
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let addr = format!("{}:{}", args.host, args.port);
    let server = match SlipServer::builder()
        .bind(&addr)
        .room_config(args.room_config())
        .idle_timeout(args.idle_timeout())
        .keepalive_interval(args.keepalive())
        .build()
        .await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
