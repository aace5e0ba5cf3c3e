//! Go-Duel command line.
//!
//! ## Usage
//!
//! - `go-duel serve` - Host a game and wait for two players
//! - `go-duel play` - Join a game from the console
//! - `go-duel bot` - Join a game with the random-move bot
//! - `go-duel replay <record>` - Step through a recorded game

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use go_duel::bot::run_bot;
use go_duel::client::run_client;
use go_duel::config::{ClientConfig, ServerConfig};
use go_duel::constants::BOT_MOVE_DELAY_MS;
use go_duel::replay::run_replay;
use go_duel::server::run_server;

/// Go-Duel: two-player Go over TCP
#[derive(Parser)]
#[command(name = "go-duel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the game server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Board side length (2..=25)
        #[arg(short, long)]
        board_size: Option<usize>,
        /// Append game records to this JSON-lines file
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Play from the console
    Play {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Let the random bot play
    Bot {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Pause before each move, in milliseconds
        #[arg(long, default_value_t = BOT_MOVE_DELAY_MS)]
        delay_ms: u64,
        /// Seed for reproducible games
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Replay a game from a record file written by `serve --record`
    Replay {
        record: PathBuf,
        /// Game id; defaults to the last game in the file
        #[arg(long)]
        game: Option<u64>,
    },
}

fn client_config(host: Option<String>, port: Option<u16>) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with the console game.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            board_size,
            record,
        } => {
            let mut config = ServerConfig::from_env();
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(size) = board_size {
                config.board_size = size;
            }
            if record.is_some() {
                config.record_path = record;
            }
            run_server(config, None).await
        }
        Commands::Play { host, port } => run_client(client_config(host, port)).await,
        Commands::Bot {
            host,
            port,
            delay_ms,
            seed,
        } => run_bot(client_config(host, port), Duration::from_millis(delay_ms), seed).await,
        Commands::Replay { record, game } => run_replay(record, game).await,
    }
}
