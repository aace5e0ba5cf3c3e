//! Session state machine: turn order, passes, agreement voting, resignation, and Ko.
//!
//! A [`Session`] is the only owner of the board and of every counter that
//! decides who may do what next. It drives the [`Board`] engine and pushes the
//! resulting [`ServerEvent`]s to the registered participants' outboxes.
//!
//! ```text
//! WaitingForPlayers --start--> InProgress --pass,pass--> AgreementPause
//!                                  ^                          |
//!                                  +--------- resume ---------+
//! InProgress / AgreementPause --resign | finish x2 | disconnect--> GameOver
//! ```
//!
//! Every public method runs to completion before the next one may start; the
//! caller (see [`crate::registry`]) holds the session behind one mutex so the
//! events produced by a single transition are queued before any other
//! transition is looked at.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::board::{Board, Grid, Player, grids_equal};
use crate::constants::{MAX_PARTICIPANTS, PASSES_FOR_AGREEMENT};
use crate::error::GameError;
use crate::protocol::{ClientCommand, MoveMsg, ServerEvent};
use crate::recorder::{NullRecorder, Recorder};

/// Where a participant's events are delivered.
pub type Outbox = UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    /// Entered after two consecutive passes; only RESUME and FINISH are accepted.
    AgreementPause,
    GameOver,
}

struct Participant {
    player: Player,
    outbox: Outbox,
}

pub struct Session {
    board: Board,
    participants: Vec<Participant>,
    phase: Phase,
    current: Player,
    consecutive_passes: u32,
    finish_votes: [bool; 2],
    captured: [u32; 2],
    /// Grid before the last accepted move or pass, for Ko detection
    previous: Option<Grid>,
    moves_played: u32,
    recorder: Box<dyn Recorder>,
}

impl Session {
    pub fn new(board_size: usize) -> Self {
        Self::with_recorder(board_size, Box::new(NullRecorder))
    }

    pub fn with_recorder(board_size: usize, recorder: Box<dyn Recorder>) -> Self {
        Self {
            board: Board::new(board_size),
            participants: Vec::new(),
            phase: Phase::WaitingForPlayers,
            current: Player::One,
            consecutive_passes: 0,
            finish_votes: [false; 2],
            captured: [0; 2],
            previous: None,
            moves_played: 0,
            recorder,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != Phase::WaitingForPlayers
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::AgreementPause
    }

    pub fn current_player(&self) -> Player {
        self.current
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    /// Opponent stones removed so far by `player`.
    pub fn captured(&self, player: Player) -> u32 {
        self.captured[player.index()]
    }

    pub fn finish_vote(&self, player: Player) -> bool {
        self.finish_votes[player.index()]
    }

    pub fn participants(&self) -> Vec<Player> {
        self.participants.iter().map(|p| p.player).collect()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    // -------------------------------------------------------------------------
    // Event delivery
    // -------------------------------------------------------------------------

    fn send_to(&self, player: Player, event: ServerEvent) {
        if let Some(p) = self.participants.iter().find(|p| p.player == player) {
            // A closed outbox means the connection is going away; its disconnect follows.
            let _ = p.outbox.send(event);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        for p in &self.participants {
            let _ = p.outbox.send(event.clone());
        }
    }

    fn info(&self, text: impl Into<String>) {
        self.broadcast(ServerEvent::Info(text.into()));
    }

    fn broadcast_board(&self) {
        self.broadcast(ServerEvent::Board(self.board.to_msg()));
    }

    fn broadcast_scores(&self) {
        for player in Player::ALL {
            self.broadcast(ServerEvent::Score {
                player,
                captured: self.captured(player),
            });
        }
    }

    fn notify_turn(&self) {
        for p in &self.participants {
            let event = if p.player == self.current {
                ServerEvent::YourTurn
            } else {
                ServerEvent::OpponentTurn
            };
            let _ = p.outbox.send(event);
        }
    }

    fn record(&mut self, f: impl FnOnce(&mut dyn Recorder) -> anyhow::Result<()>) {
        if let Err(e) = f(self.recorder.as_mut()) {
            warn!(error = %e, "game record write failed");
        }
    }

    // -------------------------------------------------------------------------
    // Registration and lifecycle
    // -------------------------------------------------------------------------

    /// Register a connection under the lowest free identity.
    ///
    /// A full session refuses without touching the existing registrations.
    pub fn join(&mut self, outbox: Outbox) -> Result<Player, GameError> {
        let player = Player::ALL
            .into_iter()
            .find(|p| self.participants.iter().all(|q| q.player != *p))
            .ok_or(GameError::SessionFull)?;

        self.participants.push(Participant { player, outbox });
        self.participants.sort_by_key(|p| p.player.id());
        info!(player = %player, count = self.participants.len(), "participant joined");

        self.send_to(player, ServerEvent::Info(format!("Connected as player {player}")));
        if self.participants.len() < MAX_PARTICIPANTS {
            self.send_to(player, ServerEvent::Info("Waiting for opponent...".into()));
        }
        Ok(player)
    }

    /// Both seats are taken and no game is running.
    pub fn can_start(&self) -> bool {
        self.participants.len() == MAX_PARTICIPANTS
            && matches!(self.phase, Phase::WaitingForPlayers | Phase::GameOver)
    }

    /// Begin a fresh game. Returns false when [`Session::can_start`] does not hold.
    pub fn start(&mut self) -> bool {
        if !self.can_start() {
            debug!(count = self.participants.len(), phase = ?self.phase, "start ignored");
            return false;
        }

        let size = self.board.size();
        self.record(|r| r.create_game(size));
        self.board.clear();
        self.phase = Phase::InProgress;
        self.current = Player::One;
        self.consecutive_passes = 0;
        self.finish_votes = [false; 2];
        self.captured = [0; 2];
        self.previous = None;
        self.moves_played = 0;
        info!(board_size = size, "game started");

        for p in &self.participants {
            let _ = p.outbox.send(ServerEvent::Start(p.player));
        }
        self.broadcast_board();
        self.notify_turn();
        true
    }

    /// Back to an empty, unstarted session with no registrations.
    pub fn reset(&mut self) {
        self.participants.clear();
        self.board.clear();
        self.phase = Phase::WaitingForPlayers;
        self.current = Player::One;
        self.consecutive_passes = 0;
        self.finish_votes = [false; 2];
        self.captured = [0; 2];
        self.previous = None;
        self.moves_played = 0;
        info!("session reset, ready for new players");
    }

    /// Drop a participant. Leaving an unfinished game ends it for the other side;
    /// the last one out resets the session.
    pub fn disconnect(&mut self, player: Player) {
        let before = self.participants.len();
        self.participants.retain(|p| p.player != player);
        if self.participants.len() == before {
            return;
        }
        info!(player = %player, "participant left");

        if matches!(self.phase, Phase::InProgress | Phase::AgreementPause) {
            self.phase = Phase::GameOver;
            self.record(|r| r.finalize("Aborted (Disconnect)"));
            self.broadcast(ServerEvent::Error("Opponent disconnected. Game ended.".into()));
            self.broadcast(ServerEvent::GameOver("Opponent disconnected".into()));
        }

        if self.participants.is_empty() {
            self.reset();
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Apply a client command, answering a rejection with `ERROR` to the sender only.
    pub fn handle(&mut self, player: Player, cmd: ClientCommand) -> Result<(), GameError> {
        let result = match cmd {
            ClientCommand::Move(m) => self.play(player, m.row, m.col).map(|_| ()),
            ClientCommand::Pass => self.pass(player),
            ClientCommand::Resign => self.resign(player),
            ClientCommand::Resume => self.resume(player),
            ClientCommand::Finish => self.finish(player),
        };
        if let Err(e) = &result {
            debug!(player = %player, error = %e, "command rejected");
            self.send_to(player, ServerEvent::Error(e.to_string()));
        }
        result
    }

    fn check_turn(&self, player: Player) -> Result<(), GameError> {
        match self.phase {
            Phase::WaitingForPlayers => Err(GameError::NotStarted),
            Phase::GameOver => Err(GameError::GameAlreadyOver),
            Phase::AgreementPause => Err(GameError::GamePaused),
            Phase::InProgress if player != self.current => Err(GameError::NotYourTurn),
            Phase::InProgress => Ok(()),
        }
    }

    fn check_paused(&self) -> Result<(), GameError> {
        match self.phase {
            Phase::WaitingForPlayers => Err(GameError::NotStarted),
            Phase::GameOver => Err(GameError::GameAlreadyOver),
            Phase::InProgress => Err(GameError::NotPaused),
            Phase::AgreementPause => Ok(()),
        }
    }

    /// Place a stone for `player`, returning the number of stones captured.
    pub fn play(&mut self, player: Player, row: i64, col: i64) -> Result<usize, GameError> {
        self.check_turn(player)?;

        let before = self.board.grid_copy();
        let captured = self.board.play(row, col, player)?;
        if let Some(previous) = &self.previous {
            if grids_equal(&self.board.grid_copy(), previous) {
                self.board.set_grid(&before);
                return Err(GameError::KoViolation);
            }
        }

        self.previous = Some(before);
        self.consecutive_passes = 0;
        self.moves_played += 1;
        let number = self.moves_played;
        let mv = MoveMsg {
            row,
            col,
            player: player.id(),
        };
        self.record(|r| r.append_move(number, &mv));
        debug!(player = %player, row, col, captured, "move accepted");

        self.broadcast_board();
        if captured > 0 {
            self.info(format!("Player {player} captured {captured} stone(s)."));
        }
        self.captured[player.index()] += captured as u32;
        self.broadcast_scores();

        self.current = player.opponent();
        self.notify_turn();
        Ok(captured)
    }

    pub fn pass(&mut self, player: Player) -> Result<(), GameError> {
        self.check_turn(player)?;

        self.info(format!("Player {player} passed."));
        // A pass is a null move for Ko purposes.
        self.previous = Some(self.board.grid_copy());
        self.consecutive_passes += 1;

        if self.consecutive_passes >= PASSES_FOR_AGREEMENT {
            self.phase = Phase::AgreementPause;
            info!("both players passed, stopped for agreement");
            self.broadcast(ServerEvent::AgreementOn);
            self.info("Both players passed. Game stopped for agreement.");
            self.info("Players may now agree on dead stones and type FINISH or request RESUME.");
            return Ok(());
        }

        self.current = player.opponent();
        self.notify_turn();
        Ok(())
    }

    /// Leave the agreement pause; the requester's opponent moves next.
    pub fn resume(&mut self, player: Player) -> Result<(), GameError> {
        self.check_paused()?;

        self.phase = Phase::InProgress;
        self.consecutive_passes = 0;
        self.finish_votes = [false; 2];
        self.current = player.opponent();
        info!(player = %player, "game resumed");

        self.broadcast(ServerEvent::AgreementOff);
        self.broadcast_board();
        self.info(format!("Game resumed. Player {} to move.", self.current));
        self.notify_turn();
        Ok(())
    }

    pub fn finish(&mut self, player: Player) -> Result<(), GameError> {
        self.check_paused()?;

        self.finish_votes[player.index()] = true;
        self.info(format!("Player {player} voted FINISH"));

        if self.finish_votes.iter().all(|v| *v) {
            self.phase = Phase::GameOver;
            info!("game finished by agreement");
            self.record(|r| r.finalize("Finished by agreement"));
            self.broadcast(ServerEvent::GameOver(
                "You both agreed. Thanks for the game.".into(),
            ));
        }
        Ok(())
    }

    /// Concede; accepted at any point of a running game, turn or not.
    pub fn resign(&mut self, player: Player) -> Result<(), GameError> {
        match self.phase {
            Phase::WaitingForPlayers => return Err(GameError::NotStarted),
            Phase::GameOver => return Err(GameError::GameAlreadyOver),
            Phase::InProgress | Phase::AgreementPause => {}
        }

        let winner = player.opponent();
        self.phase = Phase::GameOver;
        info!(player = %player, winner = %winner, "player resigned");
        self.record(|r| r.finalize(&format!("Player {player} resigned")));

        self.info(format!("Player {player} resigned. Player {winner} wins."));
        self.broadcast(ServerEvent::GameOver(format!("Player {winner} wins (resign)")));
        Ok(())
    }
}
