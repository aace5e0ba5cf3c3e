//! Go-Duel: a two-player networked Go server.
//!
//! Two clients connect over TCP, are assigned player 1 and player 2, and play
//! one game of Go on a square board held by the server. The server enforces
//! turn order, captures, the suicide rule and simple Ko, and ends the game by
//! resignation, disconnect, or agreement after two consecutive passes.
//!
//! ## Modules
//!
//! - [`constants`] - Board limits, defaults and protocol constants
//! - [`board`] - Board state, move legality and captures
//! - [`protocol`] - Line-oriented wire format with JSON payloads
//! - [`session`] - The game state machine driving one session
//! - [`registry`] - Shared, serialized access to the session
//! - [`server`] - TCP listener and per-connection tasks
//! - [`recorder`] - Optional game records
//! - [`replay`] - Rebuilding recorded games move by move
//! - [`bot`] - Random-move automated client
//! - [`client`] - Interactive console client
//!
//! ## Example
//!
//! ```
//! use go_duel::board::{Board, MoveError, Player};
//!
//! let mut board = Board::new(5);
//! board.play(0, 1, Player::One).unwrap();
//! board.play(1, 0, Player::One).unwrap();
//!
//! // The corner has no liberties left for player 2.
//! assert_eq!(board.play(0, 0, Player::Two), Err(MoveError::Suicide));
//! assert_eq!(board.play(2, 2, Player::Two), Ok(0));
//! ```

pub mod board;
pub mod bot;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod registry;
pub mod replay;
pub mod server;
pub mod session;
