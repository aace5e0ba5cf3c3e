//! Replaying recorded games.
//!
//! A record holds only the moves; replay rebuilds every intermediate board by
//! playing them again on a fresh [`Board`].

use std::path::Path;

use anyhow::{Context, bail};

use crate::board::{Board, Player};
use crate::protocol::MoveMsg;
use crate::recorder::{RecordEntry, read_records};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    pub number: u32,
    pub mv: MoveMsg,
    pub captured: usize,
    /// Board after the move
    pub board: Board,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub game: u64,
    pub board_size: usize,
    pub steps: Vec<ReplayStep>,
    /// Final result; none when the game was never finalized
    pub result: Option<String>,
}

/// Id of the most recently created game in `entries`.
pub fn last_game(entries: &[RecordEntry]) -> Option<u64> {
    entries.iter().rev().find_map(|e| match e {
        RecordEntry::Created { game, .. } => Some(*game),
        _ => None,
    })
}

/// Rebuild `game` move by move. A move that does not replay cleanly means the
/// record is corrupt and is reported as an error.
pub fn replay_game(entries: &[RecordEntry], game: u64) -> anyhow::Result<Replay> {
    let board_size = entries
        .iter()
        .find_map(|e| match e {
            RecordEntry::Created {
                game: g,
                board_size,
            } if *g == game => Some(*board_size),
            _ => None,
        })
        .with_context(|| format!("no game {game} in record"))?;

    let mut board = Board::new(board_size);
    let mut steps = Vec::new();
    let mut result = None;
    for entry in entries {
        match entry {
            RecordEntry::Move {
                game: g,
                number,
                row,
                col,
                player,
            } if *g == game => {
                let Some(p) = Player::from_id(*player) else {
                    bail!("move {number}: bad player {player}");
                };
                let captured = board
                    .play(*row, *col, p)
                    .with_context(|| format!("move {number}: ({row},{col}) does not replay"))?;
                steps.push(ReplayStep {
                    number: *number,
                    mv: MoveMsg {
                        row: *row,
                        col: *col,
                        player: *player,
                    },
                    captured,
                    board: board.clone(),
                });
            }
            RecordEntry::Finished { game: g, result: r } if *g == game => {
                result = Some(r.clone());
            }
            _ => {}
        }
    }

    Ok(Replay {
        game,
        board_size,
        steps,
        result,
    })
}

/// Print a recorded game to stdout. Without `game` the last one in the file is shown.
pub async fn run_replay(path: impl AsRef<Path>, game: Option<u64>) -> anyhow::Result<()> {
    let entries = read_records(path).await?;
    let Some(game) = game.or_else(|| last_game(&entries)) else {
        bail!("record contains no games");
    };
    let replay = replay_game(&entries, game)?;

    println!(
        "Game {} ({}x{}), {} moves",
        replay.game,
        replay.board_size,
        replay.board_size,
        replay.steps.len()
    );
    for step in &replay.steps {
        println!(
            "Replay move {}: player {} at ({},{})",
            step.number, step.mv.player, step.mv.row, step.mv.col
        );
        if step.captured > 0 {
            println!("Player {} captured {} stone(s).", step.mv.player, step.captured);
        }
        println!("{}", step.board);
    }
    match &replay.result {
        Some(result) => println!("Result: {result}"),
        None => println!("Result: unfinished"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(game: u64, number: u32, row: i64, col: i64, player: u8) -> RecordEntry {
        RecordEntry::Move {
            game,
            number,
            row,
            col,
            player,
        }
    }

    fn corner_capture(game: u64) -> Vec<RecordEntry> {
        vec![
            RecordEntry::Created {
                game,
                board_size: 5,
            },
            mv(game, 1, 0, 1, 1),
            mv(game, 2, 0, 0, 2),
            mv(game, 3, 1, 0, 1),
            RecordEntry::Finished {
                game,
                result: "Player 2 resigned".into(),
            },
        ]
    }

    #[test]
    fn test_replay_rebuilds_each_board() {
        let replay = replay_game(&corner_capture(4), 4).unwrap();
        assert_eq!(replay.board_size, 5);
        assert_eq!(replay.steps.len(), 3);
        assert_eq!(replay.steps[1].board.get(0, 0), Some(Player::Two));
        assert_eq!(replay.steps[2].captured, 1);
        assert_eq!(replay.steps[2].board.get(0, 0), None);
        assert_eq!(replay.result.as_deref(), Some("Player 2 resigned"));
    }

    #[test]
    fn test_replay_picks_one_game_from_shared_file() {
        let mut entries = corner_capture(1);
        entries.extend([
            RecordEntry::Created {
                game: 2,
                board_size: 3,
            },
            mv(2, 1, 1, 1, 1),
        ]);
        assert_eq!(last_game(&entries), Some(2));

        let replay = replay_game(&entries, 2).unwrap();
        assert_eq!(replay.board_size, 3);
        assert_eq!(replay.steps.len(), 1);
        assert_eq!(replay.result, None);
        assert_eq!(replay_game(&entries, 1).unwrap().steps.len(), 3);
    }

    #[test]
    fn test_replay_rejects_corrupt_record() {
        let mut entries = corner_capture(0);
        entries.insert(2, mv(0, 2, 0, 1, 2));
        assert!(replay_game(&entries, 0).is_err());
        assert!(replay_game(&entries, 9).is_err());
        assert_eq!(last_game(&[]), None);
    }

    #[tokio::test]
    async fn test_run_replay_over_written_record() {
        use crate::recorder::{JsonlRecorder, Recorder};

        let path = std::env::temp_dir().join(format!(
            "go-duel-replay-{}-{}.jsonl",
            std::process::id(),
            fastrand::u64(..)
        ));
        let mut rec = JsonlRecorder::open(&path).await.unwrap();
        rec.create_game(5).unwrap();
        for (number, (row, col, player)) in [(0, 1, 1), (0, 0, 2), (1, 0, 1)].into_iter().enumerate() {
            rec.append_move(number as u32 + 1, &MoveMsg { row, col, player })
                .unwrap();
        }
        rec.finalize("Finished by agreement").unwrap();
        rec.close().await.unwrap();

        let result = run_replay(&path, None).await;
        let entries = read_records(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert!(result.is_ok(), "{result:?}");
        let game = last_game(&entries).unwrap();
        let replay = replay_game(&entries, game).unwrap();
        assert_eq!(replay.steps[2].captured, 1);
        assert_eq!(replay.result.as_deref(), Some("Finished by agreement"));
    }
}
