//! Player identity and the per-connection wrapper around it (spec §3
//! `Player` / `PlayerServer`).

use std::time::Duration;
use thiserror::Error;

use crate::channel::{Channel, ChannelResult};
use crate::net::{ClientMessage, ServerEvent};

pub type PlayerId = i64;
pub type SeatIndex = usize;

/// Avatars larger than this are dropped rather than stored (spec §3).
pub const MAX_AVATAR_BYTES: usize = 150 * 1024;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PlayerError {
    #[error("player {0} has insufficient money: has {1}, needs {2}")]
    InsufficientMoney(PlayerId, i64, i64),
    #[error("add_money amount must be strictly positive, got {0}")]
    NonPositiveAmount(i64),
}

pub type PlayerResult<T> = Result<T, PlayerError>;

/// A player's identity and stack. Immutable fields are set at connect
/// time; `money` changes only through `take_money`/`add_money`, which
/// enforce the non-negativity invariant.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    money: i64,
    /// Dropped at construction if it exceeds `MAX_AVATAR_BYTES`.
    pub avatar: Option<String>,
    pub ready: bool,
    pub seat: Option<SeatIndex>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, money: i64, avatar: Option<String>) -> Self {
        let avatar = avatar.filter(|a| a.len() <= MAX_AVATAR_BYTES);
        Self {
            id,
            name: name.into(),
            money,
            avatar,
            ready: false,
            seat: None,
        }
    }

    pub fn money(&self) -> i64 {
        self.money
    }

    /// The only path that decreases `money`. Fails rather than going
    /// negative.
    pub fn take_money(&mut self, amount: i64) -> PlayerResult<()> {
        if amount > self.money {
            return Err(PlayerError::InsufficientMoney(self.id, self.money, amount));
        }
        self.money -= amount;
        Ok(())
    }

    /// The only path that increases `money`. Requires a strictly positive
    /// amount.
    pub fn add_money(&mut self, amount: i64) -> PlayerResult<()> {
        if amount <= 0 {
            return Err(PlayerError::NonPositiveAmount(amount));
        }
        self.money += amount;
        Ok(())
    }
}

/// A `Player` plus its live connection. `connected` tracks whether the
/// channel is currently usable; `wants_to_start_final_10_hands` is latched
/// from the owner's ping reply and consumed by the room's hand loop.
pub struct PlayerServer {
    pub player: Player,
    pub channel: Channel<ClientMessage, ServerEvent>,
    pub connected: bool,
    pub wants_to_start_final_10_hands: bool,
}

impl PlayerServer {
    pub fn new(player: Player, channel: Channel<ClientMessage, ServerEvent>) -> Self {
        Self {
            player,
            channel,
            connected: true,
            wants_to_start_final_10_hands: false,
        }
    }

    pub fn bot(player: Player) -> Self {
        Self::new(player, Channel::bot())
    }

    pub fn is_bot(&self) -> bool {
        self.channel.is_bot()
    }

    pub async fn send(&self, event: ServerEvent) -> ChannelResult<()> {
        self.channel.send(event).await
    }

    pub async fn recv(&mut self, deadline: Duration) -> ChannelResult<ClientMessage> {
        self.channel.recv(deadline).await
    }

    /// Re-authentication: replaces the channel in place, preserving the
    /// in-memory stack. Called on reconnect — never rebuild the `Player`
    /// from a stale DB snapshot (spec §4.4, concrete scenario 5).
    pub fn reattach(&mut self, channel: Channel<ClientMessage, ServerEvent>) {
        self.channel = channel;
        self.connected = true;
    }

    /// Detaches on disconnect: closes the channel and marks not connected.
    /// The caller is responsible for sending the one `disconnect` event
    /// before calling this, per spec's "sent once" lifecycle note.
    pub fn detach(&mut self) {
        self.channel.close();
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_money_fails_when_insufficient() {
        let mut p = Player::new(1, "alice", 100, None);
        assert!(p.take_money(50).is_ok());
        assert_eq!(p.money(), 50);
        assert_eq!(
            p.take_money(51),
            Err(PlayerError::InsufficientMoney(1, 50, 51))
        );
        assert_eq!(p.money(), 50, "failed take must not mutate balance");
    }

    #[test]
    fn add_money_requires_strictly_positive_amount() {
        let mut p = Player::new(1, "alice", 100, None);
        assert_eq!(p.add_money(0), Err(PlayerError::NonPositiveAmount(0)));
        assert_eq!(p.add_money(-5), Err(PlayerError::NonPositiveAmount(-5)));
        assert!(p.add_money(10).is_ok());
        assert_eq!(p.money(), 110);
    }

    #[test]
    fn oversized_avatar_is_dropped() {
        let huge = "x".repeat(MAX_AVATAR_BYTES + 1);
        let p = Player::new(1, "alice", 100, Some(huge));
        assert!(p.avatar.is_none());
        let small = "x".repeat(100);
        let p = Player::new(1, "alice", 100, Some(small.clone()));
        assert_eq!(p.avatar, Some(small));
    }
}
