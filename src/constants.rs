//! Constants for board geometry, session rules, and networking defaults.
//!
//! Board size is chosen at runtime (see [`crate::config::ServerConfig`]) and
//! stays fixed for the lifetime of a session.

// =============================================================================
// Board Geometry
// =============================================================================

/// Default board size (NxN) used by the server.
pub const DEFAULT_BOARD_SIZE: usize = 19;

/// Smallest board the server accepts.
pub const MIN_BOARD_SIZE: usize = 2;

/// Largest board the server accepts.
pub const MAX_BOARD_SIZE: usize = 25;

/// Orthogonal neighbor offsets as (row, col) deltas: down, up, right, left.
pub const ORTHOGONAL: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Diagonal neighbor offsets as (row, col) deltas.
pub const DIAGONAL: [(i64, i64); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

// =============================================================================
// Session Rules
// =============================================================================

/// Number of participants in a session.
pub const MAX_PARTICIPANTS: usize = 2;

/// Back-to-back passes that stop the game for agreement.
pub const PASSES_FOR_AGREEMENT: u32 = 2;

// =============================================================================
// Networking
// =============================================================================

/// Default bind/connect host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 55555;

/// Longest client line the server reads; longer lines are discarded.
pub const MAX_LINE_BYTES: usize = 8192;

/// Default bot think delay before each move, in milliseconds.
pub const BOT_MOVE_DELAY_MS: u64 = 700;

/// Rejected attempts the bot makes in one turn before it passes instead.
pub const BOT_MAX_RETRIES: usize = 16;
