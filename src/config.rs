//! Server and client configuration.
//!
//! Values come from defaults, then environment variables, then command-line
//! flags (applied by `main`).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tokio::net::lookup_host;

use crate::constants::{DEFAULT_BOARD_SIZE, DEFAULT_HOST, DEFAULT_PORT, MAX_BOARD_SIZE, MIN_BOARD_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub board_size: usize,
    /// JSON-lines game record; none disables recording
    pub record_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            board_size: DEFAULT_BOARD_SIZE,
            record_path: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ServerConfig {
    /// Read `GO_DUEL_HOST`, `GO_DUEL_PORT`, `GO_DUEL_BOARD_SIZE` and
    /// `GO_DUEL_RECORD_PATH`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let record_path = env::var("GO_DUEL_RECORD_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            host: env::var("GO_DUEL_HOST").unwrap_or(defaults.host),
            port: env_parse("GO_DUEL_PORT").unwrap_or(defaults.port),
            board_size: env_parse("GO_DUEL_BOARD_SIZE").unwrap_or(defaults.board_size),
            record_path,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&self.board_size) {
            bail!(
                "board size {} out of range ({MIN_BOARD_SIZE}..={MAX_BOARD_SIZE})",
                self.board_size
            );
        }
        Ok(())
    }

    pub async fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        resolve(&self.host, self.port).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("GO_DUEL_HOST").unwrap_or(defaults.host),
            port: env_parse("GO_DUEL_PORT").unwrap_or(defaults.port),
        }
    }

    pub async fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        resolve(&self.host, self.port).await
    }
}

async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("no address for {host}:{port}"))
}
