//! Game records.
//!
//! The session reports every game it starts, every accepted move, and the
//! final result to a [`Recorder`]. Recording never affects legality: a
//! failing recorder is logged and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::protocol::MoveMsg;

/// One line of a game record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordEntry {
    Created { game: u64, board_size: usize },
    Move { game: u64, number: u32, row: i64, col: i64, player: u8 },
    Finished { game: u64, result: String },
}

pub trait Recorder: Send {
    fn create_game(&mut self, board_size: usize) -> anyhow::Result<()>;
    fn append_move(&mut self, number: u32, mv: &MoveMsg) -> anyhow::Result<()>;
    fn finalize(&mut self, result: &str) -> anyhow::Result<()>;
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn create_game(&mut self, _board_size: usize) -> anyhow::Result<()> {
        Ok(())
    }

    fn append_move(&mut self, _number: u32, _mv: &MoveMsg) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize(&mut self, _result: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Tracks the game id shared by all entries of the current game.
#[derive(Debug, Default)]
struct GameIds {
    next: u64,
    current: Option<u64>,
}

impl GameIds {
    fn start(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        self.current = Some(id);
        id
    }

    fn current(&self) -> anyhow::Result<u64> {
        self.current.context("no game has been created")
    }
}

/// Keeps entries in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    entries: Arc<Mutex<Vec<RecordEntry>>>,
    ids: Arc<Mutex<GameIds>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RecordEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn push(&self, entry: RecordEntry) -> anyhow::Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("record log poisoned"))?
            .push(entry);
        Ok(())
    }

    fn ids(&self) -> anyhow::Result<std::sync::MutexGuard<'_, GameIds>> {
        self.ids
            .lock()
            .map_err(|_| anyhow::anyhow!("record ids poisoned"))
    }
}

impl Recorder for MemoryRecorder {
    fn create_game(&mut self, board_size: usize) -> anyhow::Result<()> {
        let game = self.ids()?.start();
        self.push(RecordEntry::Created { game, board_size })
    }

    fn append_move(&mut self, number: u32, mv: &MoveMsg) -> anyhow::Result<()> {
        let game = self.ids()?.current()?;
        self.push(RecordEntry::Move {
            game,
            number,
            row: mv.row,
            col: mv.col,
            player: mv.player,
        })
    }

    fn finalize(&mut self, result: &str) -> anyhow::Result<()> {
        let game = self.ids()?.current()?;
        self.push(RecordEntry::Finished {
            game,
            result: result.to_string(),
        })
    }
}

/// Appends one JSON object per entry to a file.
///
/// Entries are handed to a writer task, so the session never waits on disk
/// I/O. Game ids start from the wall clock in milliseconds so that several
/// server runs can share one file.
pub struct JsonlRecorder {
    tx: mpsc::UnboundedSender<RecordEntry>,
    writer: JoinHandle<()>,
    ids: GameIds,
}

impl JsonlRecorder {
    /// Open `path` for appending and start the writer task on the current runtime.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening game record {}", path.display()))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_entries(path, file, rx));
        Ok(Self {
            tx,
            writer,
            ids: GameIds {
                next: now,
                current: None,
            },
        })
    }

    /// Stop taking entries and wait until every queued one is written.
    pub async fn close(self) -> anyhow::Result<()> {
        let Self { tx, writer, .. } = self;
        drop(tx);
        writer.await.context("game record writer failed")
    }

    fn send(&self, entry: RecordEntry) -> anyhow::Result<()> {
        self.tx
            .send(entry)
            .map_err(|_| anyhow::anyhow!("game record writer has stopped"))
    }
}

async fn write_entries(path: PathBuf, file: File, mut rx: mpsc::UnboundedReceiver<RecordEntry>) {
    let mut out = BufWriter::new(file);
    while let Some(entry) = rx.recv().await {
        if let Err(e) = write_entry(&mut out, &entry).await {
            warn!(path = %path.display(), error = %e, "game record write failed");
        }
    }
}

async fn write_entry(out: &mut BufWriter<File>, entry: &RecordEntry) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

impl Recorder for JsonlRecorder {
    fn create_game(&mut self, board_size: usize) -> anyhow::Result<()> {
        let game = self.ids.start();
        self.send(RecordEntry::Created { game, board_size })
    }

    fn append_move(&mut self, number: u32, mv: &MoveMsg) -> anyhow::Result<()> {
        let game = self.ids.current()?;
        self.send(RecordEntry::Move {
            game,
            number,
            row: mv.row,
            col: mv.col,
            player: mv.player,
        })
    }

    fn finalize(&mut self, result: &str) -> anyhow::Result<()> {
        let game = self.ids.current()?;
        self.send(RecordEntry::Finished {
            game,
            result: result.to_string(),
        })
    }
}

/// Read back every entry of a JSON-lines record file.
pub async fn read_records(path: impl AsRef<Path>) -> anyhow::Result<Vec<RecordEntry>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading game record {}", path.display()))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("bad record line: {l}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MV: MoveMsg = MoveMsg {
        row: 3,
        col: 4,
        player: 1,
    };

    #[test]
    fn test_memory_recorder_shares_log() {
        let log = MemoryRecorder::new();
        let mut rec = log.clone();
        rec.create_game(9).unwrap();
        rec.append_move(1, &MV).unwrap();
        rec.finalize("Player 2 resigned").unwrap();

        assert_eq!(
            log.entries(),
            vec![
                RecordEntry::Created {
                    game: 0,
                    board_size: 9
                },
                RecordEntry::Move {
                    game: 0,
                    number: 1,
                    row: 3,
                    col: 4,
                    player: 1
                },
                RecordEntry::Finished {
                    game: 0,
                    result: "Player 2 resigned".into()
                },
            ]
        );
    }

    #[test]
    fn test_move_before_create_fails() {
        let mut rec = MemoryRecorder::new();
        assert!(rec.append_move(1, &MV).is_err());
    }

    #[test]
    fn test_entry_json_shape() {
        let line = serde_json::to_string(&RecordEntry::Finished {
            game: 7,
            result: "Finished by agreement".into(),
        })
        .unwrap();
        assert_eq!(
            line,
            r#"{"kind":"finished","game":7,"result":"Finished by agreement"}"#
        );
    }

    #[tokio::test]
    async fn test_jsonl_recorder_appends() {
        let path = std::env::temp_dir().join(format!(
            "go-duel-record-{}-{}.jsonl",
            std::process::id(),
            fastrand::u64(..)
        ));
        {
            let mut rec = JsonlRecorder::open(&path).await.unwrap();
            rec.create_game(5).unwrap();
            rec.append_move(1, &MV).unwrap();
            rec.finalize("Aborted (Disconnect)").unwrap();
            rec.close().await.unwrap();
        }
        let entries = read_records(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(entries.len(), 3);
        let RecordEntry::Created { game, board_size } = entries[0] else {
            panic!("expected created entry, got {:?}", entries[0]);
        };
        assert_eq!(board_size, 5);
        assert_eq!(
            entries[2],
            RecordEntry::Finished {
                game,
                result: "Aborted (Disconnect)".into()
            }
        );
    }
}
