//! Rejection reasons reported to clients.
//!
//! Every variant is recoverable: the offending command is answered with an
//! `ERROR <text>` line to the sender only and the session is left untouched.
//! The `Display` text of each variant is exactly what goes on the wire.

use derive_more::{Display, Error};

use crate::board::MoveError;

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameError {
    /// Target point is outside the grid or already holds a stone.
    #[display("Field occupied or out of bounds")]
    OutOfBoundsOrOccupied,
    /// Placement would leave the placed group without liberties and captures nothing.
    #[display("Suicide move not allowed")]
    Suicide,
    /// Placement recreates the position from before the previous move or pass.
    #[display("Ko rule: immediate recapture not allowed")]
    KoViolation,
    #[display("Not your turn")]
    NotYourTurn,
    /// Only RESUME and FINISH are accepted while stopped for agreement.
    #[display("Game stopped. Use RESUME to continue game or FINISH if you have agreed.")]
    GamePaused,
    #[display("Game is not stopped")]
    NotPaused,
    #[display("Game has not started yet")]
    NotStarted,
    #[display("Game already finished")]
    GameAlreadyOver,
    /// A payload or argument did not decode.
    #[display("Bad {payload}: {reason}")]
    MalformedPayload { payload: Payload, reason: String },
    #[display("Unknown command: [{verb}]")]
    UnknownCommand { verb: String },
    #[display("Server full (game in progress). Try again later.")]
    SessionFull,
    #[display("Line too long (limit {limit} bytes)")]
    LineTooLong { limit: usize },
}

/// Which part of a line failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Payload {
    #[display("move JSON")]
    Move,
    #[display("board JSON")]
    Board,
    #[display("event argument")]
    Event,
}

impl GameError {
    pub fn malformed(payload: Payload, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            payload,
            reason: reason.into(),
        }
    }
}

impl From<MoveError> for GameError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::OutOfBoundsOrOccupied => GameError::OutOfBoundsOrOccupied,
            MoveError::Suicide => GameError::Suicide,
        }
    }
}
