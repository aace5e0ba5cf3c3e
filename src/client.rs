//! Interactive console client.
//!
//! Reads the keyboard and the server connection concurrently, rendering
//! server events as text. A few commands are answered locally without a round
//! trip: `SCORE` prints the last scores seen and `QUIT`/`EXIT` resign and leave.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::debug;

use crate::board::{Board, Player};
use crate::config::ClientConfig;
use crate::protocol::{ClientCommand, MoveMsg, ServerEvent};

const USAGE: &str = "Bad input. Use: row col   or PASS   or RESIGN";

/// One line of keyboard input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Send(ClientCommand),
    ShowScore,
    Quit,
    Invalid(&'static str),
}

/// Interpret a typed line. Blank lines yield `None`.
pub fn parse_input(line: &str, me: Option<Player>) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let input = match line.to_ascii_uppercase().as_str() {
        "QUIT" | "EXIT" => Input::Quit,
        "SCORE" => Input::ShowScore,
        "PASS" => Input::Send(ClientCommand::Pass),
        "RESIGN" => Input::Send(ClientCommand::Resign),
        "RESUME" => Input::Send(ClientCommand::Resume),
        "FINISH" => Input::Send(ClientCommand::Finish),
        _ => {
            let mut parts = line.split_whitespace();
            let coords = (
                parts.next().and_then(|s| s.parse::<i64>().ok()),
                parts.next().and_then(|s| s.parse::<i64>().ok()),
                parts.next(),
            );
            match coords {
                (Some(row), Some(col), None) => Input::Send(ClientCommand::Move(MoveMsg {
                    row,
                    col,
                    player: me.map_or(0, Player::id),
                })),
                _ => Input::Invalid(USAGE),
            }
        }
    };
    Some(input)
}

/// What the console knows about the game, built only from server events.
#[derive(Debug, Default)]
pub struct ConsoleView {
    me: Option<Player>,
    my_turn: bool,
    paused: bool,
    finished: bool,
    scores: [u32; 2],
}

impl ConsoleView {
    pub fn player(&self) -> Option<Player> {
        self.me
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn score_line(&self) -> String {
        format!(
            "Captured stones: Player 1 = {}, Player 2 = {}",
            self.scores[0], self.scores[1]
        )
    }

    /// Update the view and return the text to show, if any.
    pub fn render(&mut self, event: &ServerEvent) -> Option<String> {
        let text = match event {
            ServerEvent::Start(p) => {
                self.me = Some(*p);
                format!("Game started. You are player {p} ({})", stone_name(*p))
            }
            ServerEvent::Board(msg) => match Board::from_msg(msg) {
                Ok(board) => format!("{board}"),
                Err(e) => format!("[SERVER] unreadable board: {e}"),
            },
            ServerEvent::YourTurn => {
                self.my_turn = true;
                "Your turn. Enter: row col   (or PASS, RESIGN, SCORE)".to_string()
            }
            ServerEvent::OpponentTurn => {
                self.my_turn = false;
                "Waiting for opponent...".to_string()
            }
            ServerEvent::AgreementOn => {
                self.paused = true;
                "Game stopped. Type FINISH if you agree on the result or RESUME to play on.".to_string()
            }
            ServerEvent::AgreementOff => {
                self.paused = false;
                "Game resumed.".to_string()
            }
            ServerEvent::Info(text) => format!("[INFO] {text}"),
            ServerEvent::Error(text) => format!("[ERROR] {text}"),
            ServerEvent::GameOver(text) => {
                self.finished = true;
                format!("[GAME OVER] {text}")
            }
            ServerEvent::Score { player, captured } => {
                self.scores[player.index()] = *captured;
                return None;
            }
        };
        Some(text)
    }

    /// Commands the console refuses before they reach the server.
    pub fn local_rejection(&self, cmd: &ClientCommand) -> Option<&'static str> {
        match cmd {
            ClientCommand::Resign => None,
            ClientCommand::Finish | ClientCommand::Resume => {
                (!self.paused).then_some("Game is not stopped.")
            }
            _ if self.paused => Some("Game stopped. Use FINISH or RESUME."),
            _ if !self.my_turn => Some("Not your turn yet."),
            _ => None,
        }
    }
}

fn stone_name(player: Player) -> &'static str {
    match player {
        Player::One => "X",
        Player::Two => "O",
    }
}

async fn send(writer: &mut OwnedWriteHalf, cmd: &ClientCommand) -> anyhow::Result<()> {
    debug!(command = %cmd, "sending");
    writer.write_all(format!("{cmd}\n").as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Connect and run the console session until the game ends, the server
/// closes the connection, or the user quits.
pub async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr().await?;
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    let (reader, mut writer) = stream.into_split();
    let mut server = BufReader::new(reader).lines();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut view = ConsoleView::default();
    println!("Connected to {addr}. Waiting for the game to start...");

    loop {
        tokio::select! {
            line = server.next_line() => {
                let Some(line) = line? else {
                    println!("Disconnected from server.");
                    break;
                };
                match ServerEvent::parse(&line) {
                    Ok(event) => {
                        if let Some(text) = view.render(&event) {
                            println!("{text}");
                        }
                        if view.is_finished() {
                            println!("{}", view.score_line());
                            break;
                        }
                    }
                    Err(_) => println!("[SERVER] {line}"),
                }
            }
            input = stdin.next_line() => {
                let Some(input) = input? else {
                    break;
                };
                match parse_input(&input, view.player()) {
                    None => {}
                    Some(Input::Quit) => {
                        send(&mut writer, &ClientCommand::Resign).await?;
                        break;
                    }
                    Some(Input::ShowScore) => println!("{}", view.score_line()),
                    Some(Input::Invalid(msg)) => println!("{msg}"),
                    Some(Input::Send(cmd)) => match view.local_rejection(&cmd) {
                        Some(msg) => println!("{msg}"),
                        None => send(&mut writer, &cmd).await?,
                    },
                }
            }
        }
    }
    Ok(())
}
