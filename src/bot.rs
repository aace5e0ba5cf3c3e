//! A bot that plays as an ordinary client.
//!
//! The bot reads the same event stream a human client does and answers with
//! the same commands. Candidate moves are checked against a private copy of
//! the board, which has no bearing on the authoritative session; whatever the
//! server still rejects (Ko, for instance) is excluded and another point tried.

use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::board::{Board, Player};
use crate::config::ClientConfig;
use crate::constants::BOT_MAX_RETRIES;
use crate::protocol::{ClientCommand, MoveMsg, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    Send(ClientCommand),
    Quit,
    Idle,
}

pub struct Bot {
    me: Option<Player>,
    board: Option<Board>,
    my_turn: bool,
    paused: bool,
    /// Points the server refused during the current turn
    rejected: Vec<(usize, usize)>,
    last_try: Option<(usize, usize)>,
    retries: usize,
    rng: fastrand::Rng,
}

impl Bot {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            me: None,
            board: None,
            my_turn: false,
            paused: false,
            rejected: Vec::new(),
            last_try: None,
            retries: 0,
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
        }
    }

    pub fn player(&self) -> Option<Player> {
        self.me
    }

    pub fn on_event(&mut self, event: &ServerEvent) -> BotAction {
        match event {
            ServerEvent::Start(p) => {
                self.me = Some(*p);
                BotAction::Idle
            }
            ServerEvent::Board(msg) => {
                match Board::from_msg(msg) {
                    Ok(board) => self.board = Some(board),
                    Err(e) => warn!(error = %e, "ignoring unreadable board"),
                }
                BotAction::Idle
            }
            ServerEvent::YourTurn => {
                self.my_turn = true;
                self.rejected.clear();
                self.retries = 0;
                self.next_move()
            }
            ServerEvent::OpponentTurn => {
                self.my_turn = false;
                BotAction::Idle
            }
            ServerEvent::AgreementOn => {
                self.paused = true;
                BotAction::Send(ClientCommand::Finish)
            }
            ServerEvent::AgreementOff => {
                self.paused = false;
                BotAction::Idle
            }
            ServerEvent::Error(text) if self.my_turn && !self.paused => {
                debug!(reason = %text, "move rejected, retrying");
                if let Some(pt) = self.last_try.take() {
                    self.rejected.push(pt);
                }
                self.retries += 1;
                if self.retries > BOT_MAX_RETRIES {
                    BotAction::Send(ClientCommand::Pass)
                } else {
                    self.next_move()
                }
            }
            ServerEvent::GameOver(_) => BotAction::Quit,
            _ => BotAction::Idle,
        }
    }

    fn next_move(&mut self) -> BotAction {
        let (Some(me), Some(board)) = (self.me, &self.board) else {
            return BotAction::Send(ClientCommand::Pass);
        };
        match choose_move(board, me, &self.rejected, &mut self.rng) {
            Some((row, col)) => {
                self.last_try = Some((row, col));
                BotAction::Send(ClientCommand::Move(MoveMsg {
                    row: row as i64,
                    col: col as i64,
                    player: me.id(),
                }))
            }
            None => {
                self.last_try = None;
                BotAction::Send(ClientCommand::Pass)
            }
        }
    }
}

/// Pick a random empty point that is legal for `me` and does not fill one of
/// its own eyes.
pub fn choose_move(
    board: &Board,
    me: Player,
    exclude: &[(usize, usize)],
    rng: &mut fastrand::Rng,
) -> Option<(usize, usize)> {
    let mut candidates: Vec<_> = board
        .empty_points()
        .into_iter()
        .filter(|pt| !exclude.contains(pt) && board.eye_owner(pt.0, pt.1) != Some(me))
        .collect();
    rng.shuffle(&mut candidates);

    candidates.into_iter().find(|&(row, col)| {
        let mut test = board.clone();
        test.play(row as i64, col as i64, me).is_ok()
    })
}

/// Connect to a server and play until the game ends or the server goes away.
pub async fn run_bot(config: ClientConfig, delay: Duration, seed: Option<u64>) -> anyhow::Result<()> {
    let addr = config.socket_addr().await?;
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    stream.set_nodelay(true)?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut bot = Bot::new(seed);
    info!(addr = %addr, "bot connected");

    while let Some(line) = lines.next_line().await? {
        let event = match ServerEvent::parse(&line) {
            Ok(event) => event,
            Err(e) => {
                debug!(line = %line, error = %e, "skipping line");
                continue;
            }
        };
        match bot.on_event(&event) {
            BotAction::Send(cmd) => {
                if matches!(cmd, ClientCommand::Move(_) | ClientCommand::Pass) {
                    tokio::time::sleep(delay).await;
                }
                debug!(command = %cmd, "bot sends");
                writer.write_all(format!("{cmd}\n").as_bytes()).await?;
                writer.flush().await?;
            }
            BotAction::Quit => {
                if let ServerEvent::GameOver(result) = &event {
                    info!(result = %result, "game over");
                }
                return Ok(());
            }
            BotAction::Idle => {}
        }
    }
    warn!("server closed the connection");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(bot: &mut Bot, me: Player, board: &Board) {
        assert_eq!(bot.on_event(&ServerEvent::Start(me)), BotAction::Idle);
        assert_eq!(
            bot.on_event(&ServerEvent::Board(board.to_msg())),
            BotAction::Idle
        );
    }

    #[test]
    fn test_moves_on_its_turn() {
        let mut bot = Bot::new(Some(7));
        start(&mut bot, Player::Two, &Board::new(5));
        assert_eq!(bot.player(), Some(Player::Two));
        let BotAction::Send(ClientCommand::Move(m)) = bot.on_event(&ServerEvent::YourTurn) else {
            panic!("expected a move");
        };
        assert_eq!(m.player, 2);
        assert!(Board::new(5).is_empty(m.row, m.col));
    }

    #[test]
    fn test_waits_for_opponent() {
        let mut bot = Bot::new(Some(7));
        start(&mut bot, Player::One, &Board::new(5));
        assert_eq!(bot.on_event(&ServerEvent::OpponentTurn), BotAction::Idle);
        assert_eq!(
            bot.on_event(&ServerEvent::Error("Not your turn".into())),
            BotAction::Idle
        );
    }

    #[test]
    fn test_never_fills_own_eye_or_suicides() {
        // Every empty point is a corner eye of player 1.
        let mut b = Board::new(3);
        for (r, c) in [(0, 1), (1, 0), (1, 1), (1, 2), (2, 1)] {
            b.set(r, c, Some(Player::One));
        }
        let mut rng = fastrand::Rng::with_seed(1);
        assert_eq!(choose_move(&b, Player::One, &[], &mut rng), None);

        let mut bot = Bot::new(Some(1));
        start(&mut bot, Player::One, &b);
        assert_eq!(
            bot.on_event(&ServerEvent::YourTurn),
            BotAction::Send(ClientCommand::Pass)
        );
    }

    #[test]
    fn test_rejected_point_is_not_retried() {
        let mut b = Board::new(2);
        b.set(0, 0, Some(Player::One));
        b.set(1, 1, Some(Player::One));
        // Both empty points are suicide for player 2.
        let mut rng = fastrand::Rng::with_seed(3);
        assert_eq!(choose_move(&b, Player::Two, &[], &mut rng), None);

        let b = Board::new(2);
        let all = [(0, 0), (0, 1), (1, 0)];
        assert_eq!(choose_move(&b, Player::One, &all, &mut rng), Some((1, 1)));
    }

    #[test]
    fn test_retries_then_passes() {
        let mut bot = Bot::new(Some(5));
        start(&mut bot, Player::One, &Board::new(9));
        let mut tried = Vec::new();
        let mut action = bot.on_event(&ServerEvent::YourTurn);
        for _ in 0..BOT_MAX_RETRIES {
            let BotAction::Send(ClientCommand::Move(m)) = action else {
                panic!("expected a move, got {action:?}");
            };
            assert!(!tried.contains(&(m.row, m.col)), "retried {m:?}");
            tried.push((m.row, m.col));
            action = bot.on_event(&ServerEvent::Error("Ko rule".into()));
        }
        assert!(matches!(action, BotAction::Send(ClientCommand::Move(_))));
        assert_eq!(
            bot.on_event(&ServerEvent::Error("Ko rule".into())),
            BotAction::Send(ClientCommand::Pass)
        );
    }

    #[test]
    fn test_agreement_and_game_over() {
        let mut bot = Bot::new(None);
        assert_eq!(
            bot.on_event(&ServerEvent::AgreementOn),
            BotAction::Send(ClientCommand::Finish)
        );
        assert_eq!(
            bot.on_event(&ServerEvent::GameOver("done".into())),
            BotAction::Quit
        );
    }
}
