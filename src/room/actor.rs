//! One `tokio::task` per room, reachable only through a `RoomHandle`
//! wrapping an `mpsc::Sender<RoomCommand>` — never a bare `&mut GameRoom`
//! shared across tasks. Grounded on the teacher's
//! `table::actor::{TableActor, TableHandle}` pattern (SPEC_FULL.md §5),
//! with "table" renamed to "room" throughout.

use tokio::sync::{mpsc, oneshot};

use crate::channel::Channel;
use crate::net::{ClientMessage, ServerEvent};
use crate::player::PlayerId;
use crate::room::{GameRoom, JoinOutcome, RoomResult};

/// A request routed to a room's task. `Join`/`AddBot`/`RemoveBot` carry a
/// reply channel since their caller needs the outcome; `Leave` doesn't —
/// the room broadcasts the resulting seat change itself.
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        money: i64,
        avatar: Option<String>,
        channel: Channel<ClientMessage, ServerEvent>,
        passphrase: Option<String>,
        reply: oneshot::Sender<RoomResult<JoinOutcome>>,
    },
    Leave {
        player_id: PlayerId,
    },
    AddBot {
        requested_by: PlayerId,
        seat_index: usize,
        difficulty: String,
        reply: oneshot::Sender<RoomResult<PlayerId>>,
    },
    RemoveBot {
        requested_by: PlayerId,
        seat_index: Option<usize>,
        bot_id: Option<PlayerId>,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    Shutdown,
}

/// The server's only handle to a running room. Cheaply `Clone`able (an
/// `mpsc::Sender` is just a reference-counted queue slot), so every
/// session that needs to talk to this room gets its own copy.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

/// Channel-closed means the room's task has already exited; callers treat
/// that the same as the room being gone.
#[derive(Debug, thiserror::Error)]
#[error("room is no longer running")]
pub struct RoomGone;

impl RoomHandle {
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        money: i64,
        avatar: Option<String>,
        channel: Channel<ClientMessage, ServerEvent>,
        passphrase: Option<String>,
    ) -> Result<RoomResult<JoinOutcome>, RoomGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join { player_id, name, money, avatar, channel, passphrase, reply: reply_tx })
            .await
            .map_err(|_| RoomGone)?;
        reply_rx.await.map_err(|_| RoomGone)
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomGone> {
        self.sender.send(RoomCommand::Leave { player_id }).await.map_err(|_| RoomGone)
    }

    pub async fn add_bot(
        &self,
        requested_by: PlayerId,
        seat_index: usize,
        difficulty: String,
    ) -> Result<RoomResult<PlayerId>, RoomGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::AddBot { requested_by, seat_index, difficulty, reply: reply_tx })
            .await
            .map_err(|_| RoomGone)?;
        reply_rx.await.map_err(|_| RoomGone)
    }

    pub async fn remove_bot(
        &self,
        requested_by: PlayerId,
        seat_index: Option<usize>,
        bot_id: Option<PlayerId>,
    ) -> Result<RoomResult<()>, RoomGone> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::RemoveBot { requested_by, seat_index, bot_id, reply: reply_tx })
            .await
            .map_err(|_| RoomGone)?;
        reply_rx.await.map_err(|_| RoomGone)
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(RoomCommand::Shutdown).await;
    }
}

/// Spawns a room's task and returns the handle the server registers under
/// its `RoomId`. The task runs [`GameRoom::run`] until the room
/// deactivates or a `Shutdown` command arrives.
pub fn spawn_room(mut room: GameRoom) -> RoomHandle {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        room.run(rx).await;
    });
    RoomHandle { sender: tx }
}
