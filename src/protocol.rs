//! Line-oriented wire protocol between clients and the session server.
//!
//! Every message is one line: an upper-case verb, optionally followed by a
//! single space and an argument. Verbs are matched case-insensitively.
//!
//! ## Client → server
//!
//! - `MOVE {"row":r,"col":c,"player":p}` - place a stone
//! - `PASS`, `RESIGN`, `RESUME`, `FINISH`
//!
//! ## Server → client
//!
//! - `START <id>`, `BOARD {"size":n,"grid":[[...],...]}`
//! - `YOUR_TURN`, `OPPONENT_TURN`, `AGREEMENT_ON`, `AGREEMENT_OFF`
//! - `INFO <text>`, `ERROR <text>`, `GAME_OVER <text>`
//! - `SCORE1 <n>`, `SCORE2 <n>`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Player;
use crate::error::{GameError, Payload};

/// Move payload. The `player` field is replaced by the connection's identity
/// before the move reaches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveMsg {
    pub row: i64,
    pub col: i64,
    pub player: u8,
}

/// Board payload: row-major cells, 0 empty, 1/2 participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardMsg {
    pub size: usize,
    pub grid: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Move(MoveMsg),
    Pass,
    Resign,
    Resume,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Start(Player),
    Board(BoardMsg),
    YourTurn,
    OpponentTurn,
    AgreementOn,
    AgreementOff,
    Info(String),
    Error(String),
    GameOver(String),
    Score { player: Player, captured: u32 },
}

/// Split a line into its upper-cased verb and the trimmed remainder.
fn split_verb(line: &str) -> (String, &str) {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_uppercase(), rest.trim()),
        None => (trimmed.to_uppercase(), ""),
    }
}

pub fn decode_move(payload: &str) -> Result<MoveMsg, GameError> {
    serde_json::from_str(payload).map_err(|e| GameError::malformed(Payload::Move, e.to_string()))
}

pub fn decode_board(payload: &str) -> Result<BoardMsg, GameError> {
    serde_json::from_str(payload).map_err(|e| GameError::malformed(Payload::Board, e.to_string()))
}

impl ClientCommand {
    /// Parse one client line. Payload errors never reach the session.
    pub fn parse(line: &str) -> Result<Self, GameError> {
        let (verb, arg) = split_verb(line);
        match verb.as_str() {
            "MOVE" => {
                if arg.is_empty() {
                    return Err(GameError::malformed(Payload::Move, "MOVE requires JSON argument"));
                }
                decode_move(arg).map(ClientCommand::Move)
            }
            "PASS" => Ok(ClientCommand::Pass),
            "RESIGN" => Ok(ClientCommand::Resign),
            "RESUME" => Ok(ClientCommand::Resume),
            "FINISH" => Ok(ClientCommand::Finish),
            _ => Err(GameError::UnknownCommand { verb }),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ClientCommand::Move(_) => "MOVE",
            ClientCommand::Pass => "PASS",
            ClientCommand::Resign => "RESIGN",
            ClientCommand::Resume => "RESUME",
            ClientCommand::Finish => "FINISH",
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCommand::Move(m) => {
                let json = serde_json::to_string(m).map_err(|_| fmt::Error)?;
                write!(f, "MOVE {json}")
            }
            other => f.write_str(other.verb()),
        }
    }
}

impl ServerEvent {
    /// Parse one server line, as the bot and console client do.
    pub fn parse(line: &str) -> Result<Self, GameError> {
        let (verb, arg) = split_verb(line);
        let number = |arg: &str| -> Result<u32, GameError> {
            arg.parse()
                .map_err(|_| GameError::malformed(Payload::Event, format!("expected a number, got {arg:?}")))
        };
        let event = match verb.as_str() {
            "START" => {
                let id = arg
                    .parse::<u8>()
                    .ok()
                    .and_then(Player::from_id)
                    .ok_or_else(|| GameError::malformed(Payload::Event, format!("bad participant id {arg:?}")))?;
                ServerEvent::Start(id)
            }
            "BOARD" => ServerEvent::Board(decode_board(arg)?),
            "YOUR_TURN" => ServerEvent::YourTurn,
            "OPPONENT_TURN" => ServerEvent::OpponentTurn,
            "AGREEMENT_ON" => ServerEvent::AgreementOn,
            "AGREEMENT_OFF" => ServerEvent::AgreementOff,
            "INFO" => ServerEvent::Info(arg.to_string()),
            "ERROR" => ServerEvent::Error(arg.to_string()),
            "GAME_OVER" => ServerEvent::GameOver(arg.to_string()),
            "SCORE1" => ServerEvent::Score {
                player: Player::One,
                captured: number(arg)?,
            },
            "SCORE2" => ServerEvent::Score {
                player: Player::Two,
                captured: number(arg)?,
            },
            _ => return Err(GameError::UnknownCommand { verb }),
        };
        Ok(event)
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::Start(p) => write!(f, "START {p}"),
            ServerEvent::Board(b) => {
                let json = serde_json::to_string(b).map_err(|_| fmt::Error)?;
                write!(f, "BOARD {json}")
            }
            ServerEvent::YourTurn => f.write_str("YOUR_TURN"),
            ServerEvent::OpponentTurn => f.write_str("OPPONENT_TURN"),
            ServerEvent::AgreementOn => f.write_str("AGREEMENT_ON"),
            ServerEvent::AgreementOff => f.write_str("AGREEMENT_OFF"),
            ServerEvent::Info(text) => write!(f, "INFO {text}"),
            ServerEvent::Error(text) => write!(f, "ERROR {text}"),
            ServerEvent::GameOver(text) => write!(f, "GAME_OVER {text}"),
            ServerEvent::Score { player, captured } => write!(f, "SCORE{player} {captured}"),
        }
    }
}
