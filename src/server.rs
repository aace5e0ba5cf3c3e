//! TCP server: one task per connection, all of them funnelling into the registry.
//!
//! Each connection task owns the read half of its socket and blocks only on
//! the next line. Outbound events for a participant travel through an
//! unbounded channel to a writer task that writes and flushes one line per
//! event.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::constants::MAX_LINE_BYTES;
use crate::error::GameError;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::recorder::{JsonlRecorder, NullRecorder, Recorder};
use crate::registry::Registry;
use crate::session::Session;

/// Build the session described by `config` and serve it until the listener fails.
///
/// `ready_tx` receives the bound address once the socket is listening, which
/// is how callers using port 0 learn the real port.
pub async fn run_server(
    config: ServerConfig,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    config.validate()?;

    let recorder: Box<dyn Recorder> = match &config.record_path {
        Some(path) => {
            info!(path = %path.display(), "recording games");
            Box::new(JsonlRecorder::open(path).await?)
        }
        None => Box::new(NullRecorder),
    };
    let registry = Registry::new(Session::with_recorder(config.board_size, recorder));

    let addr = config.socket_addr().await?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let bound = listener.local_addr()?;
    info!(addr = %bound, board_size = config.board_size, "server listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    loop {
        let (socket, peer) = listener.accept().await?;
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, peer, registry).await {
                warn!(addr = %peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    registry: Registry,
) -> anyhow::Result<()> {
    socket.set_nodelay(true)?;
    let (reader, mut writer) = socket.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let player = match registry.register(tx.clone()).await {
        Ok(player) => player,
        Err(e) => {
            info!(addr = %addr, reason = %e, "connection refused");
            let line = format!("{}\n", ServerEvent::Error(e.to_string()));
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            writer.shutdown().await?;
            return Ok(());
        }
    };
    info!(addr = %addr, player = %player, "client connected");

    let write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let line = format!("{event}\n");
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let result = loop {
        let line = match read_client_line(&mut reader, &mut buf).await {
            Ok(ClientLine::Text(line)) => line,
            Ok(ClientLine::TooLong) => {
                debug!(player = %player, "oversized line dropped");
                let err = GameError::LineTooLong {
                    limit: MAX_LINE_BYTES,
                };
                let _ = tx.send(ServerEvent::Error(err.to_string()));
                continue;
            }
            Ok(ClientLine::Eof) => break Ok(()),
            Err(e) => break Err(anyhow::Error::from(e).context("reading from client")),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match ClientCommand::parse(trimmed) {
            Ok(mut cmd) => {
                // Clients cannot act under another identity.
                if let ClientCommand::Move(m) = &mut cmd {
                    m.player = player.id();
                }
                // Rejections were already reported to this client by the session.
                let _ = registry.dispatch(player, cmd).await;
            }
            Err(e) => {
                debug!(player = %player, error = %e, "unparsable line");
                let _ = tx.send(ServerEvent::Error(e.to_string()));
            }
        }
    };

    registry.disconnect(player).await;
    drop(tx);
    let _ = write_task.await;
    info!(addr = %addr, player = %player, "client disconnected");
    result
}

enum ClientLine {
    Text(String),
    TooLong,
    Eof,
}

/// Read one newline-terminated line of at most [`MAX_LINE_BYTES`].
///
/// Invalid UTF-8 is replaced rather than treated as a read failure, so a
/// garbled line reaches the parser and is answered like any unknown command.
/// An oversized line is consumed up to its newline and reported as `TooLong`.
async fn read_client_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<ClientLine>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_BYTES as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(ClientLine::Eof);
    }
    if buf.len() as u64 == limit && !buf.ends_with(b"\n") {
        loop {
            buf.clear();
            let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            if n == 0 || buf.ends_with(b"\n") {
                break;
            }
        }
        return Ok(ClientLine::TooLong);
    }
    Ok(ClientLine::Text(String::from_utf8_lossy(buf).into_owned()))
}
