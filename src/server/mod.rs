//! The top-level `GameServer` (spec §4.5): the lobby and room-control
//! consumer loops, and the registry of running rooms they dispatch into.
//!
//! Grounded on `original_source/poker/game_server_redis.py`, which blocks
//! on a Redis list pop for connect requests and runs a second blocking
//! pop loop for room-control requests. Neither loop here touches a real
//! broker — per the §9 redesign flag ("global broker handle & module-level
//! server state... pass an explicit context object"), both are plain
//! `tokio::sync::mpsc` queues owned by whatever embeds this crate, and
//! `GameServer` itself is just a value, not ambient global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::bot::BotEngineRegistry;
use crate::channel::Channel;
use crate::config::Config;
use crate::net::{ClientMessage, ConnectAck, LobbyRequest, PlayerDto, RoomControlRequest, ServerEvent};
use crate::player::PlayerId;
use crate::room::{self, GameRoom, JoinOutcome, RoomHandle, RoomId, RoomPersistence};

/// Capacity of a session's per-direction queue, standing in for the
/// broker FIFO's unbounded depth (spec §6 "Transport").
const SESSION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("lobby request timeout_epoch {0} has already passed")]
    RequestExpired(i64),
    #[error("lobby request is missing a required field: {0}")]
    MissingField(&'static str),
    #[error("room error: {0}")]
    Room(#[from] crate::room::RoomError),
    #[error("room's task is no longer running")]
    RoomGone,
}

impl From<room::actor::RoomGone> for ServerError {
    fn from(_: room::actor::RoomGone) -> Self {
        ServerError::RoomGone
    }
}

/// The gateway's end of a newly connected session: it feeds `inbound` and
/// drains `outbound`. The matching `Channel::Broker` half was handed to
/// the room the player just joined.
pub struct SessionChannels {
    pub inbound: mpsc::Sender<ClientMessage>,
    pub outbound: mpsc::Receiver<ServerEvent>,
}

fn now_epoch() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Registry of running rooms plus the shared config/engines/persistence
/// every room is built with (SPEC_FULL.md §5, "`TableManager`-shaped
/// registry"). Cloning a `GameServer` is cheap — every field is an `Arc`
/// or a plain value — so one instance can be shared across however many
/// gateway connections embed it.
#[derive(Clone)]
pub struct GameServer {
    server_id: String,
    config: Arc<Config>,
    engines: Arc<BotEngineRegistry>,
    persistence: RoomPersistence,
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
}

impl GameServer {
    pub fn new(
        server_id: String,
        config: Arc<Config>,
        engines: Arc<BotEngineRegistry>,
        persistence: RoomPersistence,
    ) -> Self {
        Self {
            server_id,
            config,
            engines,
            persistence,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Looks up a running room or spawns a fresh one. `private`/
    /// `passphrase_hash` only take effect the first time a given
    /// `room_id` is seen — an already-running room keeps whatever
    /// privacy it was created with (spec §6 supplement, "Private
    /// rooms").
    async fn get_or_spawn_room(
        &self,
        room_id: &RoomId,
        private: bool,
        passphrase_hash: Option<String>,
    ) -> RoomHandle {
        if let Some(handle) = self.rooms.read().await.get(room_id).cloned() {
            return handle;
        }
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(room_id).cloned() {
            return handle;
        }
        let room = GameRoom::new(
            room_id.clone(),
            private,
            passphrase_hash,
            self.config.clone(),
            self.engines.clone(),
            self.persistence.clone(),
        );
        let handle = room::spawn_room(room);
        rooms.insert(room_id.clone(), handle.clone());
        info!("spawned room {room_id}");
        handle
    }

    /// Handles one connect request off the lobby FIFO (spec §4.5).
    /// Validates the request, joins (or reconnects) the player into the
    /// addressed room, and hands back the gateway's half of the
    /// session's duplex channel.
    pub async fn handle_lobby_request(
        &self,
        request: LobbyRequest,
    ) -> Result<(ConnectAck, SessionChannels), ServerError> {
        if request.timeout_epoch < now_epoch() {
            return Err(ServerError::RequestExpired(request.timeout_epoch));
        }
        if request.session_id.is_empty() {
            return Err(ServerError::MissingField("session_id"));
        }
        if request.room_id.is_empty() {
            return Err(ServerError::MissingField("room_id"));
        }
        if request.player.name.is_empty() {
            return Err(ServerError::MissingField("player.name"));
        }

        let passphrase_hash = if request.private {
            request.passphrase.as_deref().map(room::hash_passphrase)
        } else {
            None
        };
        let handle = self.get_or_spawn_room(&request.room_id, request.private, passphrase_hash).await;

        let (inbound_tx, inbound_rx) = mpsc::channel::<ClientMessage>(SESSION_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel::<ServerEvent>(SESSION_QUEUE_CAPACITY);
        let channel = Channel::broker(inbound_rx, outbound_tx);

        let outcome = handle
            .join(
                request.player.id,
                request.player.name.clone(),
                request.player.money,
                request.player.avatar.clone(),
                channel,
                request.passphrase.clone(),
            )
            .await??;

        info!(
            "room {}: player {} {}",
            request.room_id,
            request.player.id,
            if outcome == JoinOutcome::Reconnected { "reconnected" } else { "joined" }
        );

        let ack = ConnectAck { server_id: self.server_id.clone(), player: request.player };
        Ok((ack, SessionChannels { inbound: inbound_tx, outbound: outbound_rx }))
    }

    /// Handles one room-control request. `requester` is the player who
    /// sent it — carried out of band from the session that received it,
    /// since neither `RoomControlRequest` variant puts a player id on
    /// the wire (spec §6; only the gateway's per-session routing knows
    /// who's asking).
    pub async fn handle_room_control(
        &self,
        requester: PlayerId,
        request: RoomControlRequest,
    ) -> Result<(), ServerError> {
        match request {
            RoomControlRequest::AddBot { room_id, seat_index, difficulty } => {
                let Some(handle) = self.rooms.read().await.get(&room_id).cloned() else {
                    return Err(ServerError::Room(crate::room::RoomError::UnknownSeat));
                };
                handle.add_bot(requester, seat_index, difficulty).await??;
                Ok(())
            }
            RoomControlRequest::RemoveBot { room_id, seat_index, bot_id } => {
                let Some(handle) = self.rooms.read().await.get(&room_id).cloned() else {
                    return Err(ServerError::Room(crate::room::RoomError::UnknownSeat));
                };
                handle.remove_bot(requester, seat_index, bot_id).await??;
                Ok(())
            }
        }
    }

    /// Removes a player from whatever room they're in. Called when the
    /// gateway detects a session's transport has gone away for good
    /// (spec §4.4 "Leave").
    pub async fn handle_disconnect(&self, room_id: &RoomId, player_id: PlayerId) {
        if let Some(handle) = self.rooms.read().await.get(room_id).cloned() {
            if handle.leave(player_id).await.is_err() {
                warn!("room {room_id}: leave delivered to a room that already shut down");
            }
        }
    }

    /// Runs the lobby consumer loop: pops connect requests off `requests`
    /// and replies on each one's paired `reply` channel. Models the
    /// blocking-pop loop in `original_source/poker/game_server_redis.py`
    /// as an `mpsc` consumer (SPEC_FULL.md §4.5 supplement) — whatever
    /// embeds this crate is responsible for actually feeding `requests`
    /// from its transport.
    pub async fn run_lobby_loop(
        &self,
        mut requests: mpsc::Receiver<(LobbyRequest, oneshot::Sender<Result<(ConnectAck, SessionChannels), ServerError>>)>,
    ) {
        while let Some((request, reply)) = requests.recv().await {
            let outcome = self.handle_lobby_request(request).await;
            let _ = reply.send(outcome);
        }
    }

    /// Runs the room-control consumer loop, the lobby loop's sibling
    /// (spec §4.5 "a second consumer loop... over the room-control
    /// FIFO").
    pub async fn run_room_control_loop(
        &self,
        mut requests: mpsc::Receiver<(PlayerId, RoomControlRequest, oneshot::Sender<Result<(), ServerError>>)>,
    ) {
        while let Some((requester, request, reply)) = requests.recv().await {
            let outcome = self.handle_room_control(requester, request).await;
            let _ = reply.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::mock::{MockApiKeyRepository, MockHandRepository, MockStatsRepository, MockWalletRepository};

    fn test_server() -> GameServer {
        let persistence = RoomPersistence {
            hands: Arc::new(MockHandRepository::new()),
            wallet: Arc::new(MockWalletRepository::new()),
            stats: Arc::new(MockStatsRepository::new()),
            api_keys: Arc::new(MockApiKeyRepository::new()),
        };
        GameServer::new(
            "server-1".to_string(),
            Arc::new(Config::default()),
            Arc::new(BotEngineRegistry::tabular_only()),
            persistence,
        )
    }

    fn lobby_request(player_id: PlayerId, room_id: &str) -> LobbyRequest {
        LobbyRequest {
            session_id: format!("session-{player_id}"),
            timeout_epoch: now_epoch() + 30,
            player: PlayerDto { id: player_id, name: format!("p{player_id}"), money: 3000, avatar: None },
            room_id: room_id.to_string(),
            private: false,
            passphrase: None,
        }
    }

    #[tokio::test]
    async fn lobby_request_joins_player_and_spawns_room_once() {
        let server = test_server();
        let (ack, _session) = server.handle_lobby_request(lobby_request(1, "room-a")).await.unwrap();
        assert_eq!(ack.server_id, "server-1");
        assert_eq!(ack.player.id, 1);

        server.handle_lobby_request(lobby_request(2, "room-a")).await.unwrap();
        assert_eq!(server.rooms.read().await.len(), 1, "same room_id must reuse the already-spawned room");
    }

    #[tokio::test]
    async fn expired_timeout_is_rejected() {
        let server = test_server();
        let mut request = lobby_request(1, "room-b");
        request.timeout_epoch = now_epoch() - 5;
        let err = server.handle_lobby_request(request).await.unwrap_err();
        assert!(matches!(err, ServerError::RequestExpired(_)));
    }

    #[tokio::test]
    async fn private_room_requires_passphrase_on_the_second_join() {
        let server = test_server();
        let mut creator = lobby_request(1, "room-c");
        creator.private = true;
        creator.passphrase = Some("swordfish".to_string());
        server.handle_lobby_request(creator).await.unwrap();

        let mut wrong = lobby_request(2, "room-c");
        wrong.private = true;
        wrong.passphrase = Some("guess".to_string());
        let err = server.handle_lobby_request(wrong).await.unwrap_err();
        assert!(matches!(err, ServerError::Room(crate::room::RoomError::InvalidPassphrase)));

        let mut right = lobby_request(3, "room-c");
        right.passphrase = Some("swordfish".to_string());
        server.handle_lobby_request(right).await.unwrap();
    }

    #[tokio::test]
    async fn room_control_routes_add_bot_to_the_addressed_room() {
        let server = test_server();
        server.handle_lobby_request(lobby_request(1, "room-d")).await.unwrap();
        server
            .handle_room_control(
                1,
                RoomControlRequest::AddBot { room_id: "room-d".to_string(), seat_index: 1, difficulty: "easy".to_string() },
            )
            .await
            .unwrap();

        let handle = server.rooms.read().await.get("room-d").cloned().unwrap();
        let err = handle
            .add_bot(2, 2, "easy".to_string())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, crate::room::RoomError::NotOwner));
    }

    #[tokio::test]
    async fn room_control_against_unknown_room_is_rejected() {
        let server = test_server();
        let err = server
            .handle_room_control(
                1,
                RoomControlRequest::RemoveBot { room_id: "no-such-room".to_string(), seat_index: None, bot_id: Some(-1) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Room(crate::room::RoomError::UnknownSeat)));
    }
}
