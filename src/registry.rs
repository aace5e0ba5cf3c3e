//! Session registry: the shared handle every connection task talks through.
//!
//! The registry owns the one [`Session`] of the process behind a single
//! mutex. Each entry point takes the lock for its whole duration, so two
//! transitions never interleave and the events one of them broadcasts are
//! queued to every outbox before the next transition runs.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::board::Player;
use crate::error::GameError;
use crate::protocol::ClientCommand;
use crate::session::{Outbox, Session};

#[derive(Clone)]
pub struct Registry {
    session: Arc<Mutex<Session>>,
}

impl Registry {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Register a connection; the second registration starts the game.
    pub async fn register(&self, outbox: Outbox) -> Result<Player, GameError> {
        let mut session = self.session.lock().await;
        let player = session.join(outbox)?;
        if session.can_start() {
            info!("two players present, starting game");
            session.start();
        }
        Ok(player)
    }

    /// Forward a parsed command from `player`'s connection.
    pub async fn dispatch(&self, player: Player, cmd: ClientCommand) -> Result<(), GameError> {
        debug!(player = %player, verb = cmd.verb(), "dispatch");
        self.session.lock().await.handle(player, cmd)
    }

    pub async fn disconnect(&self, player: Player) {
        self.session.lock().await.disconnect(player);
    }

    /// Run `f` against the session under the lock.
    pub async fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&*self.session.lock().await)
    }
}
