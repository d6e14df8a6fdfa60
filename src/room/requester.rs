//! The [`crate::game::engine::ActionRequester`] a room drives a hand with,
//! plus the buffered-event flush that lets the rest of the hand loop stay
//! synchronous while broadcasting and persisting stay async (spec §4.4/§4.7
//! "Sync/async seam" below).
//!
//! `run_hand`'s `on_action`/`on_board`/`on_hole_cards` callbacks are plain
//! `FnMut` — they never touch a player's `Channel`, only `PlayerServer::player`
//! — so they can't themselves broadcast or write to the database. Instead
//! they push a [`HandEvent`] onto a buffer shared with this requester, which
//! drains and actually ships it at the one place it's already async: just
//! before asking the next player to act. Anything still buffered after the
//! last action (the final board reveal, the last hole cards) is flushed once
//! more by `GameRoom::play_hand` right after `run_hand` returns.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;

use crate::bet::{ActionType, ResolvedAction};
use crate::bot::{ActionHistoryEntry, BotDecisionContext, BotDifficulty, BotEngineRegistry, SeatedPlayerView};
use crate::card::Card;
use crate::channel::Channel;
use crate::db::repository::HandId;
use crate::db::HandRepository;
use crate::game::Street;
use crate::net::{BetRequestPayload, ClientMessage, ServerEvent};
use crate::player::PlayerId;
use crate::room::RoomId;

/// A board reveal, a player's hole cards, or a resolved turn, produced
/// synchronously by `run_hand`'s callbacks and drained asynchronously by
/// [`RoomActionRequester::flush`].
pub enum HandEvent {
    HoleCards(PlayerId, Vec<Card>),
    Board(Vec<Card>),
    Action(ResolvedAction),
}

pub type HandEventBuffer = Arc<Mutex<Vec<HandEvent>>>;

/// One seated participant for the duration of a hand: a human's loaned-out
/// channel (taken from their `PlayerServer` before `run_hand` starts, since
/// it never reads `PlayerServer::channel`), or a bot's difficulty tier.
pub enum Seat {
    Human { channel: Channel<ClientMessage, ServerEvent> },
    Bot { difficulty: BotDifficulty },
}

/// Drives every turn of one hand and ships every event it produces.
/// Constructed fresh per hand; torn down (via [`into_channels`]) right after.
///
/// [`into_channels`]: RoomActionRequester::into_channels
pub struct RoomActionRequester {
    pub room_id: RoomId,
    pub hand_id: HandId,
    pub engines: Arc<BotEngineRegistry>,
    pub hands: Arc<dyn HandRepository>,
    pub seats: HashMap<PlayerId, Seat>,
    pub seat_index: HashMap<PlayerId, usize>,
    pub player_names: HashMap<PlayerId, String>,
    /// Each player's hole cards, learned as `run_hand` deals them (via the
    /// `HandEvent::HoleCards` events this requester flushes) so a bot's
    /// decision context (`BotDecisionContext::hand`) carries its own real
    /// cards rather than a placeholder.
    pub hole_cards: HashMap<PlayerId, [Card; 2]>,
    pub buffer: HandEventBuffer,
    pub board: Vec<Card>,
    pub street: Street,
    pub action_num: i32,
    /// Running total of every chip committed to the pot so far this hand,
    /// for the `game-update` broadcast (spec §6). Every `ResolvedAction`'s
    /// `amount` is already 0 for fold/check, so summing it unconditionally
    /// is correct.
    pub pot_total: i64,
    /// Each seated player's stack as of the last flushed action, seeded
    /// with their stack at the start of the hand. Updated in [`flush`] as
    /// each `ResolvedAction` lands, so [`context`] reports truth instead of
    /// a placeholder.
    ///
    /// [`flush`]: Self::flush
    /// [`context`]: Self::context
    pub stacks: HashMap<PlayerId, i64>,
    pub folded: HashSet<PlayerId>,
    pub all_in: HashSet<PlayerId>,
    /// Every resolved action so far this hand, forwarded verbatim as
    /// `BotDecisionContext::action_history` (spec §4.6).
    pub action_history: Vec<ActionHistoryEntry>,
}

impl RoomActionRequester {
    /// Hands the extracted channels back to their `PlayerServer`s.
    pub fn into_channels(self) -> HashMap<PlayerId, Channel<ClientMessage, ServerEvent>> {
        self.seats
            .into_iter()
            .filter_map(|(pid, seat)| match seat {
                Seat::Human { channel } => Some((pid, channel)),
                Seat::Bot { .. } => None,
            })
            .collect()
    }

    /// Sends a room-wide event to every human seat. Never called with a
    /// single-player-`target`ed event (`Cards`/`Error` go through
    /// [`send_to`](Self::send_to) instead).
    pub async fn broadcast(&self, event: ServerEvent) {
        debug_assert!(event.target().is_none(), "targeted events must use send_to");
        for seat in self.seats.values() {
            if let Seat::Human { channel } = seat {
                if let Err(e) = channel.send(event.clone()).await {
                    warn!("broadcast send failed: {e}");
                }
            }
        }
    }

    /// Drains the shared buffer, broadcasting and persisting each event in
    /// emission order. Called before every bet request and once more after
    /// the hand's last action.
    pub async fn flush(&mut self) {
        let events: Vec<HandEvent> = std::mem::take(&mut *self.buffer.lock().unwrap());
        for event in events {
            match event {
                HandEvent::HoleCards(pid, cards) => {
                    if let [a, b] = cards[..] {
                        self.hole_cards.insert(pid, [a, b]);
                    }
                    self.send_to(pid, ServerEvent::Cards { target: pid, cards: cards.clone() }).await;
                }
                HandEvent::Board(cards) => {
                    self.board = cards.clone();
                    self.broadcast(ServerEvent::SharedCards { cards }).await;
                }
                HandEvent::Action(action) => {
                    self.street = action.street;
                    self.action_num += 1;
                    self.pot_total += action.amount;

                    if action.action_type == ActionType::Fold {
                        self.folded.insert(action.player_id);
                    } else if let Some(stack) = self.stacks.get_mut(&action.player_id) {
                        *stack -= action.amount;
                        if *stack <= 0 {
                            self.all_in.insert(action.player_id);
                        }
                    }
                    self.action_history.push(ActionHistoryEntry {
                        player_id: action.player_id,
                        street: action.street,
                        action_type: action.action_type.as_db_str(),
                        amount: action.amount,
                    });

                    if let Err(e) = self
                        .hands
                        .add_hand_action(
                            self.hand_id,
                            action.player_id,
                            action.street,
                            self.action_num,
                            action.action_type.as_db_str(),
                            action.amount,
                            action.pot_before,
                        )
                        .await
                    {
                        warn!("add_hand_action failed for hand {}: {e}", self.hand_id);
                    }
                    self.broadcast(ServerEvent::Bet {
                        player_id: action.player_id,
                        amount: action.amount,
                        action_type: action.action_type.as_db_str().to_string(),
                    })
                    .await;
                    self.broadcast(ServerEvent::GameUpdate {
                        room_id: self.room_id.clone(),
                        street: self.street.as_db_i16() as u8,
                        pot_total: self.pot_total,
                    })
                    .await;
                }
            }
        }
    }

    async fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(Seat::Human { channel }) = self.seats.get(&player_id) {
            if let Err(e) = channel.send(event).await {
                warn!("send to player {player_id} failed: {e}");
            }
        }
    }

    fn context(&self, player_id: PlayerId, min_bet: i64, max_bet: i64) -> BotDecisionContext {
        BotDecisionContext {
            room_id: self.room_id.clone(),
            game_id: self.hand_id,
            street: self.street,
            player_id,
            player_name: self.player_names.get(&player_id).cloned().unwrap_or_default(),
            seat: self.seat_index.get(&player_id).copied().unwrap_or(0),
            hand: self.hole_cards.get(&player_id).copied().unwrap_or([
                Card(2, crate::card::Suit::Clubs),
                Card(2, crate::card::Suit::Diamonds),
            ]),
            board: self.board.clone(),
            players: self
                .seat_index
                .keys()
                .map(|&pid| SeatedPlayerView {
                    player_id: pid,
                    seat: self.seat_index.get(&pid).copied().unwrap_or(0),
                    stack: self.stacks.get(&pid).copied().unwrap_or(0),
                    folded: self.folded.contains(&pid),
                    all_in: self.all_in.contains(&pid),
                })
                .collect(),
            pot_total: self.pot_total,
            street_bets: min_bet,
            min_bet,
            max_bet,
            to_call: min_bet,
            action_history: self.action_history.clone(),
        }
    }
}

#[async_trait]
impl crate::game::engine::ActionRequester for RoomActionRequester {
    async fn request(
        &mut self,
        player_id: PlayerId,
        min_bet: i64,
        max_bet: i64,
        deadline: Duration,
    ) -> Option<i64> {
        self.flush().await;

        match self.seats.get(&player_id) {
            Some(Seat::Bot { difficulty }) => {
                let ctx = self.context(player_id, min_bet, max_bet);
                Some(self.engines.decide(*difficulty, &ctx).await)
            }
            Some(Seat::Human { .. }) => {
                let deadline_epoch_ms = (std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    + deadline)
                    .as_millis() as i64;
                self.broadcast(ServerEvent::BetRequest(BetRequestPayload {
                    player_id,
                    min_bet,
                    max_bet,
                    deadline_epoch_ms,
                }))
                .await;

                let Some(Seat::Human { channel }) = self.seats.get_mut(&player_id) else {
                    return None;
                };
                let started = Instant::now();
                loop {
                    let remaining = deadline.checked_sub(started.elapsed())?;
                    match channel.recv(remaining).await {
                        Ok(ClientMessage::Bet { amount }) => return Some(amount),
                        Ok(
                            ClientMessage::ChatMessage { .. }
                            | ClientMessage::Pong { .. }
                            | ClientMessage::Interaction { .. }
                            | ClientMessage::RoomControl(_),
                        ) => continue,
                        Err(_) => return None,
                    }
                }
            }
            None => {
                warn!("bet request for unseated player {player_id}");
                Some(-1)
            }
        }
    }
}
