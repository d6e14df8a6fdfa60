//! Wire protocol: the messages that cross the lobby FIFO, the room-control
//! FIFO, and each player's per-session inbound/outbound channel (spec §6).
//! The gateway and the external bot brain are the only things that speak
//! this protocol from outside the crate; everything here is plain,
//! serde-tagged data, never a dynamic dict.

use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::player::PlayerId;
use crate::room::RoomId;

/// Player DTO as carried on the wire (a subset of `Player` — no server-only
/// bookkeeping such as `seat` or `ready`).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerDto {
    pub id: PlayerId,
    pub name: String,
    pub money: i64,
    pub avatar: Option<String>,
}

/// A connect request published onto the lobby FIFO by the gateway.
///
/// `private`/`passphrase` are a supplement beyond the base wire contract:
/// they let the gateway mark a room private on its first join and gate
/// every join after that with an Argon2id-checked passphrase (§6
/// supplement, "Private rooms"). Both are no-ops for a room that already
/// exists as public.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LobbyRequest {
    pub session_id: String,
    pub timeout_epoch: i64,
    pub player: PlayerDto,
    pub room_id: RoomId,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Acknowledgement sent back on the player's outbound channel after a
/// successful `LobbyRequest`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "message_type", rename = "connect")]
pub struct ConnectAck {
    pub server_id: String,
    pub player: PlayerDto,
}

/// A `room-control` request, addressed to a specific room by the owner.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RoomControlRequest {
    AddBot {
        room_id: RoomId,
        seat_index: usize,
        difficulty: String,
    },
    RemoveBot {
        room_id: RoomId,
        seat_index: Option<usize>,
        bot_id: Option<PlayerId>,
    },
}

/// Messages a client may send on its inbound channel.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ClientMessage {
    Pong {
        #[serde(default)]
        ready: Option<bool>,
        #[serde(default)]
        start_final_10_hands: Option<bool>,
    },
    Bet {
        amount: i64,
    },
    ChatMessage {
        message: String,
    },
    Interaction {
        action: String,
    },
    RoomControl(RoomControlRequest),
}

/// A player-facing bet request: the legal range and the deadline by which
/// a reply must arrive.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BetRequestPayload {
    pub player_id: PlayerId,
    pub min_bet: i64,
    pub max_bet: i64,
    pub deadline_epoch_ms: i64,
}

/// Server-to-client events, fanned out via a room's broadcaster (most
/// variants) or routed to a single `target` player (`Cards`, `error`).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "message_type", rename_all = "kebab-case")]
pub enum ServerEvent {
    RoomUpdate {
        room_id: RoomId,
        seats: Vec<Option<PlayerId>>,
    },
    GameUpdate {
        room_id: RoomId,
        street: u8,
        pot_total: i64,
    },
    NewGame {
        room_id: RoomId,
        dealer_seat: usize,
    },
    BetRequest(BetRequestPayload),
    Bet {
        player_id: PlayerId,
        amount: i64,
        action_type: String,
    },
    SharedCards {
        cards: Vec<Card>,
    },
    /// Hole cards, visible only to `target`.
    Cards {
        target: PlayerId,
        cards: Vec<Card>,
    },
    DeadPlayer {
        player_id: PlayerId,
    },
    WinnerDesignation {
        winners: Vec<PlayerId>,
        pot_index: usize,
        amount: i64,
    },
    GameOver {
        room_id: RoomId,
    },
    UpdateRankingData {
        player_id: PlayerId,
        net_chips: i64,
    },
    FinalHandsStarted,
    FinalHandsUpdate {
        current_hand_count: u32,
    },
    FinalHandsFinished,
    Ping {
        deadline_epoch_ms: i64,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Error {
        target: PlayerId,
        reason: String,
    },
}

impl ServerEvent {
    /// `Some(player_id)` when this event is addressed to a single player
    /// rather than broadcast room-wide. Used both to route delivery and to
    /// filter the replay buffer on reconnect (spec §4.4, §8 invariant on
    /// reconnect replay).
    pub fn target(&self) -> Option<PlayerId> {
        match self {
            ServerEvent::Cards { target, .. } | ServerEvent::Error { target, .. } => Some(*target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_pong_round_trips() {
        let msg = ClientMessage::Pong {
            ready: Some(true),
            start_final_10_hands: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ClientMessage::Pong { ready: Some(true), .. }));
    }

    #[test]
    fn server_event_cards_targets_single_player() {
        let event = ServerEvent::Cards {
            target: 42,
            cards: vec![],
        };
        assert_eq!(event.target(), Some(42));
        let broadcast = ServerEvent::FinalHandsStarted;
        assert_eq!(broadcast.target(), None);
    }
}
