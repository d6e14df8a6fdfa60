//! Seat management, reconnection, the hand loop, and bot control (spec
//! §4.4). `GameRoom` owns everything one table needs in memory; the room is
//! driven by one task that loops [`GameRoom::run`] for as long as
//! `active` holds (the actor wrapper living one level up, in
//! [`crate::server`], is what actually spawns that task and exposes a
//! handle other tasks talk to).
//!
//! Grounded directly on `original_source/poker/game_room.py`'s `activate()`
//! loop: ping-with-grace before every hand, the `all_players_ready()` gate,
//! dealer rotation by modulo, final-10-hands bookkeeping, and a
//! deactivate-on-too-few-players exit.

pub mod actor;
mod requester;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use log::{info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::bot::{BotDifficulty, BotEngineRegistry};
use crate::card::{Card, Deck};
use crate::channel::Channel;
use crate::config::Config;
use crate::db::repository::{HandId, LifetimeStatsDelta, NewHandPlayer, TableId};
use crate::db::{ApiKeyRepository, HandRepository, StatsRepository, WalletRepository};
use crate::game::engine::{run_hand, HandResult, HandSetup};
use crate::game::{assert_chip_conservation, auto_topup_amount, position_name};
use crate::net::ServerEvent;
use crate::player::{Player, PlayerId, PlayerServer};

pub use actor::{spawn_room, RoomCommand, RoomHandle};
pub use requester::{HandEvent, RoomActionRequester, Seat};

/// A room's identity on the wire and in the registry (spec §3, §6). Plain
/// `String` rather than a newtype wrapper, matching how it's carried
/// verbatim through every wire message in [`crate::net::messages`].
pub type RoomId = String;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room is full")]
    RoomFull,
    #[error("no such seat")]
    UnknownSeat,
    #[error("seat is already occupied")]
    SeatOccupied,
    #[error("seat is empty")]
    SeatEmpty,
    #[error("only the room owner may do this")]
    NotOwner,
    #[error("wrong or missing passphrase")]
    InvalidPassphrase,
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Hashes a raw passphrase for a private room (spec §6 supplement). Never
/// called on the hot join path — only when a room is created or its
/// passphrase changed.
pub fn hash_passphrase(raw: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .expect("argon2 hashing of a bounded passphrase never fails")
        .to_string()
}

fn verify_passphrase(raw: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok()
}

/// The repositories one room writes through, bundled so `GameRoom::new`
/// takes one argument instead of four (spec §4.7).
#[derive(Clone)]
pub struct RoomPersistence {
    pub hands: Arc<dyn HandRepository>,
    pub wallet: Arc<dyn WalletRepository>,
    pub stats: Arc<dyn StatsRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
}

/// Outcome of a successful [`GameRoom::join`], distinguishing a fresh seat
/// from a reconnect so the caller (the per-session relay in `server`) knows
/// whether to expect replayed events.
#[derive(Debug, Eq, PartialEq)]
pub enum JoinOutcome {
    Added,
    Reconnected,
}

/// One table: its seats, its players, and the hand loop that drives them
/// (spec §3 `GameRoom`, §4.4).
pub struct GameRoom {
    pub id: RoomId,
    pub private: bool,
    passphrase_hash: Option<String>,
    pub active: bool,
    pub hand_in_progress: bool,
    pub owner: Option<PlayerId>,
    seats: Vec<Option<PlayerId>>,
    players: HashMap<PlayerId, PlayerServer>,
    join_order: Vec<PlayerId>,
    event_messages: Vec<ServerEvent>,
    final_hands_countdown: Option<u32>,
    current_hand_count: u32,
    dealer_seat: usize,
    bot_difficulties: HashMap<PlayerId, BotDifficulty>,
    next_bot_id: PlayerId,
    table_id: Option<TableId>,
    config: Arc<Config>,
    engines: Arc<BotEngineRegistry>,
    persistence: RoomPersistence,
}

impl GameRoom {
    pub fn new(
        id: RoomId,
        private: bool,
        passphrase_hash: Option<String>,
        config: Arc<Config>,
        engines: Arc<BotEngineRegistry>,
        persistence: RoomPersistence,
    ) -> Self {
        let room_size = config.room_size;
        Self {
            id,
            private,
            passphrase_hash,
            active: true,
            hand_in_progress: false,
            owner: None,
            seats: vec![None; room_size],
            players: HashMap::new(),
            join_order: Vec::new(),
            event_messages: Vec::new(),
            final_hands_countdown: None,
            current_hand_count: 0,
            dealer_seat: 0,
            bot_difficulties: HashMap::new(),
            next_bot_id: -1,
            table_id: None,
            config,
            engines,
            persistence,
        }
    }

    pub fn seats(&self) -> &[Option<PlayerId>] {
        &self.seats
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    async fn broadcast(&self, event: ServerEvent) {
        for ps in self.players.values() {
            if let Err(e) = ps.send(event.clone()).await {
                warn!("room {}: broadcast send failed: {e}", self.id);
            }
        }
    }

    async fn broadcast_room_update(&self) {
        self.broadcast(ServerEvent::RoomUpdate {
            room_id: self.id.clone(),
            seats: self.seats.clone(),
        })
        .await;
    }

    /// Joins a new player or reconnects a known one (spec §4.4 "Join").
    pub async fn join(
        &mut self,
        player_id: PlayerId,
        name: String,
        money: i64,
        avatar: Option<String>,
        channel: Channel<crate::net::ClientMessage, ServerEvent>,
        passphrase: Option<&str>,
    ) -> RoomResult<JoinOutcome> {
        if self.private {
            match (&self.passphrase_hash, passphrase) {
                (Some(hash), Some(raw)) if verify_passphrase(raw, hash) => {}
                (Some(_), _) => return Err(RoomError::InvalidPassphrase),
                (None, _) => {}
            }
        }

        if let Some(ps) = self.players.get_mut(&player_id) {
            ps.reattach(channel);
            let replay: Vec<ServerEvent> = self
                .event_messages
                .iter()
                .filter(|e| e.target().is_none_or(|t| t == player_id))
                .cloned()
                .collect();
            for event in replay {
                if let Err(e) = ps.send(event).await {
                    warn!("room {}: replay send to {player_id} failed: {e}", self.id);
                }
            }
            self.broadcast_room_update().await;
            return Ok(JoinOutcome::Reconnected);
        }

        let seat = self
            .seats
            .iter()
            .position(|s| s.is_none())
            .ok_or(RoomError::RoomFull)?;
        let mut player = Player::new(player_id, name, money, avatar);
        player.seat = Some(seat);
        self.seats[seat] = Some(player_id);
        self.players.insert(player_id, PlayerServer::new(player, channel));
        self.join_order.push(player_id);
        if self.owner.is_none() {
            self.owner = Some(player_id);
        }
        self.broadcast_room_update().await;
        Ok(JoinOutcome::Added)
    }

    /// Removes a player outright: persists their wallet, closes the
    /// channel, vacates the seat, promotes a new owner if needed (spec
    /// §4.4 "Leave"). Safe to call on a player who isn't seated.
    async fn remove_player(&mut self, player_id: PlayerId) {
        let Some(mut ps) = self.players.remove(&player_id) else {
            return;
        };
        if !ps.is_bot() {
            if let Err(e) = self
                .persistence
                .wallet
                .update_player_wallet(player_id, ps.player.money())
                .await
            {
                warn!("room {}: wallet persist on leave failed: {e}", self.id);
            }
            let _ = ps.send(ServerEvent::Disconnect { player_id }).await;
        }
        ps.detach();
        if let Some(seat) = ps.player.seat {
            if let Some(slot) = self.seats.get_mut(seat) {
                *slot = None;
            }
        }
        self.join_order.retain(|&p| p != player_id);
        self.bot_difficulties.remove(&player_id);
        if self.owner == Some(player_id) {
            self.owner = self.join_order.first().copied();
        }
        self.broadcast_room_update().await;
    }

    /// Leaves the room. Mid-hand, the player is only detached (their
    /// channel closed so the bet requester sees a disconnect and forces a
    /// fold on their next turn); actual seat removal is deferred to the
    /// post-hand sweep in [`GameRoom::run`] so `run_hand`'s seat list for
    /// the in-flight hand stays stable (spec §4.4 "Leave").
    pub async fn leave(&mut self, player_id: PlayerId) {
        if self.hand_in_progress {
            if let Some(ps) = self.players.get_mut(&player_id) {
                if !ps.is_bot() {
                    let _ = ps.send(ServerEvent::Disconnect { player_id }).await;
                }
                ps.detach();
            }
            return;
        }
        self.remove_player(player_id).await;
    }

    /// Adds a bot to an empty seat; only the owner may (spec §4.4 "Bot
    /// seating").
    pub async fn add_bot(
        &mut self,
        requested_by: PlayerId,
        seat_index: usize,
        difficulty: &str,
    ) -> RoomResult<PlayerId> {
        if self.owner != Some(requested_by) {
            return Err(RoomError::NotOwner);
        }
        let slot = self.seats.get_mut(seat_index).ok_or(RoomError::UnknownSeat)?;
        if slot.is_some() {
            return Err(RoomError::SeatOccupied);
        }
        let bot_id = self.next_bot_id;
        self.next_bot_id -= 1;
        let parsed = BotDifficulty::parse(difficulty);
        let mut player = Player::new(bot_id, format!("bot-{}", parsed.as_str()), self.config.init_money, None);
        player.seat = Some(seat_index);
        player.ready = true;
        *slot = Some(bot_id);
        self.bot_difficulties.insert(bot_id, parsed);
        self.players.insert(bot_id, PlayerServer::bot(player));
        self.join_order.push(bot_id);
        self.broadcast_room_update().await;
        Ok(bot_id)
    }

    /// Removes a bot by seat or id; only the owner may (spec §4.4 "Bot
    /// seating").
    pub async fn remove_bot(
        &mut self,
        requested_by: PlayerId,
        seat_index: Option<usize>,
        bot_id: Option<PlayerId>,
    ) -> RoomResult<()> {
        if self.owner != Some(requested_by) {
            return Err(RoomError::NotOwner);
        }
        let pid = match bot_id {
            Some(id) => id,
            None => {
                let seat = seat_index.ok_or(RoomError::UnknownSeat)?;
                self.seats.get(seat).copied().flatten().ok_or(RoomError::SeatEmpty)?
            }
        };
        if !self.players.get(&pid).is_some_and(PlayerServer::is_bot) {
            return Err(RoomError::UnknownSeat);
        }
        self.remove_player(pid).await;
        Ok(())
    }

    fn all_players_ready(&self) -> bool {
        self.players.len() >= 2 && self.players.values().all(|p| p.player.ready)
    }

    fn apply_pong(&mut self, pid: PlayerId, ready: Option<bool>, start_final_10_hands: Option<bool>) {
        let owner = self.owner;
        if let Some(ps) = self.players.get_mut(&pid) {
            if let Some(r) = ready {
                ps.player.ready = r;
            }
            if start_final_10_hands == Some(true) && owner == Some(pid) {
                ps.wants_to_start_final_10_hands = true;
            }
        }
    }

    /// Pings every connected human (bots are always ready), waiting first
    /// `2s` then, on silence, one more `ping_grace` window before treating
    /// them as gone (spec §4.4 "Hand loop", §5 suspension point (d)).
    /// Returns the players who failed to answer either window.
    async fn ping_round(&mut self) -> Vec<PlayerId> {
        let initial_wait = Duration::from_secs(2);
        let ids: Vec<PlayerId> = self.join_order.clone();
        let mut disconnected = Vec::new();

        for pid in ids {
            let Some(ps) = self.players.get_mut(&pid) else { continue };
            if ps.is_bot() {
                ps.player.ready = true;
                continue;
            }
            let deadline_epoch_ms = (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                + initial_wait
                + self.config.ping_grace)
                .as_millis() as i64;
            if ps.send(ServerEvent::Ping { deadline_epoch_ms }).await.is_err() {
                disconnected.push(pid);
                continue;
            }

            let first = self.players.get_mut(&pid).unwrap().recv(initial_wait).await;
            match first {
                Ok(crate::net::ClientMessage::Pong { ready, start_final_10_hands }) => {
                    self.apply_pong(pid, ready, start_final_10_hands);
                    continue;
                }
                _ => {
                    let grace = self.config.ping_grace;
                    let retry = self.players.get_mut(&pid).unwrap().recv(grace).await;
                    match retry {
                        Ok(crate::net::ClientMessage::Pong { ready, start_final_10_hands }) => {
                            self.apply_pong(pid, ready, start_final_10_hands);
                        }
                        _ => disconnected.push(pid),
                    }
                }
            }
        }
        disconnected
    }

    /// Advances the dealer button to the next occupied seat clockwise
    /// (spec §4.4 "Rotate dealer clockwise").
    fn rotate_dealer(&mut self) {
        let n = self.seats.len();
        if n == 0 {
            return;
        }
        for offset in 1..=n {
            let candidate = (self.dealer_seat + offset) % n;
            if self.seats[candidate].is_some() {
                self.dealer_seat = candidate;
                return;
            }
        }
    }

    /// The seating order for the next hand: occupied seats starting at the
    /// dealer, clockwise.
    fn seat_order(&self) -> Vec<PlayerId> {
        let n = self.seats.len();
        (0..n)
            .filter_map(|offset| self.seats[(self.dealer_seat + offset) % n])
            .collect()
    }

    async fn table_id(&mut self) -> RoomResult<TableId> {
        if let Some(id) = self.table_id {
            return Ok(id);
        }
        let id = self
            .persistence
            .hands
            .get_or_create_table(&self.id, self.seats.len() as i32)
            .await
            .map_err(|e| {
                warn!("room {}: get_or_create_table failed: {e}", self.id);
                e
            })
            .unwrap_or(0);
        self.table_id = Some(id);
        Ok(id)
    }

    /// Applies one command from the room's actor queue ([`RoomCommand`]).
    /// Returns `true` if the room should stop running (only `Shutdown`
    /// does this; `run` checks `self.active` for every other exit path).
    async fn apply_command(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join { player_id, name, money, avatar, channel, passphrase, reply } => {
                let outcome = self.join(player_id, name, money, avatar, channel, passphrase.as_deref()).await;
                let _ = reply.send(outcome);
            }
            RoomCommand::Leave { player_id } => {
                self.leave(player_id).await;
            }
            RoomCommand::AddBot { requested_by, seat_index, difficulty, reply } => {
                let outcome = self.add_bot(requested_by, seat_index, &difficulty).await;
                let _ = reply.send(outcome);
            }
            RoomCommand::RemoveBot { requested_by, seat_index, bot_id, reply } => {
                let outcome = self.remove_bot(requested_by, seat_index, bot_id).await;
                let _ = reply.send(outcome);
            }
            RoomCommand::Shutdown => {
                self.active = false;
                return true;
            }
        }
        false
    }

    /// Runs the room's hand loop for as long as it stays active (spec
    /// §4.4 "Hand loop"). `commands` is this room's end of the actor
    /// queue a [`RoomHandle`] sends into; it's drained at the top of
    /// every iteration, which is the only point between hands (and
    /// between ready-polls) where joins, leaves, and bot seating are
    /// applied. Returns once the room has deactivated (fewer than two
    /// players remain, the final-10-hands countdown finished, or a
    /// `Shutdown` command arrived).
    pub async fn run(&mut self, mut commands: mpsc::Receiver<RoomCommand>) {
        loop {
            if !self.active {
                return;
            }

            while let Ok(command) = commands.try_recv() {
                if self.apply_command(command).await {
                    return;
                }
            }

            let disconnected = self.ping_round().await;
            for pid in disconnected {
                self.remove_player(pid).await;
            }
            if self.players.len() < 2 {
                self.active = false;
                return;
            }
            if !self.all_players_ready() {
                tokio::time::sleep(Duration::from_millis(250)).await;
                continue;
            }

            if self.final_hands_countdown.is_none() {
                if let Some(owner) = self.owner {
                    if self
                        .players
                        .get(&owner)
                        .is_some_and(|p| p.wants_to_start_final_10_hands)
                    {
                        self.final_hands_countdown = Some(0);
                        self.broadcast(ServerEvent::FinalHandsStarted).await;
                    }
                }
            }

            self.rotate_dealer();
            self.hand_in_progress = true;
            self.play_hand().await;
            self.hand_in_progress = false;

            self.broadcast(ServerEvent::GameOver { room_id: self.id.clone() }).await;
            for ps in self.players.values_mut() {
                ps.player.ready = false;
                ps.wants_to_start_final_10_hands = false;
            }

            if let Some(count) = self.final_hands_countdown {
                let next = count + 1;
                self.final_hands_countdown = Some(next);
                self.current_hand_count = next;
                self.broadcast(ServerEvent::FinalHandsUpdate { current_hand_count: next }).await;
                if next >= 10 {
                    self.broadcast(ServerEvent::FinalHandsFinished).await;
                    self.active = false;
                }
            }

            let stale: Vec<PlayerId> = self
                .players
                .iter()
                .filter(|(_, p)| !p.connected && !p.is_bot())
                .map(|(&pid, _)| pid)
                .collect();
            for pid in stale {
                self.remove_player(pid).await;
            }
            if self.players.len() < 2 {
                self.active = false;
            }
        }
    }

    /// Plays exactly one hand end to end: auto-topup, persistence setup,
    /// `run_hand`, settlement persistence, and final broadcasts (spec
    /// §4.3, §4.7, §4.8).
    async fn play_hand(&mut self) {
        let order = self.seat_order();
        if order.len() < 2 {
            return;
        }

        let table_id = match self.table_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("room {}: could not resolve table id: {e}", self.id);
                return;
            }
        };

        for &pid in order.iter() {
            let is_bot = self.players.get(&pid).is_some_and(PlayerServer::is_bot);
            if !is_bot {
                match self
                    .persistence
                    .wallet
                    .check_and_reset_daily_chips(pid, self.config.init_money)
                    .await
                {
                    Ok(chips) => {
                        if let Some(ps) = self.players.get_mut(&pid) {
                            let delta = chips - ps.player.money();
                            if delta > 0 {
                                let _ = ps.player.add_money(delta);
                            }
                        }
                    }
                    Err(e) => warn!("room {}: daily reset check failed for {pid}: {e}", self.id),
                }
            }

            let stack = self.players[&pid].player.money();
            if let Some(topup) = auto_topup_amount(stack, self.config.big_blind, self.config.init_money) {
                if !is_bot {
                    if let Err(e) = self.persistence.wallet.auto_topup_chips(pid, topup, None).await {
                        warn!("room {}: auto-topup persist failed for {pid}: {e}", self.id);
                    }
                }
                if let Some(ps) = self.players.get_mut(&pid) {
                    let _ = ps.player.add_money(topup);
                }
            }
        }

        let hand_id = match self
            .persistence
            .hands
            .create_hand(table_id, self.config.small_blind, self.config.big_blind)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("room {}: create_hand failed: {e}", self.id);
                return;
            }
        };

        let starting_stacks: HashMap<PlayerId, i64> = order
            .iter()
            .map(|&pid| (pid, self.players[&pid].player.money()))
            .collect();

        for (offset, &pid) in order.iter().enumerate() {
            let position = position_name(offset, order.len());
            let record = NewHandPlayer {
                player_id: pid,
                seat_no: self.players[&pid].player.seat.unwrap_or(offset) as i32,
                starting_stack: starting_stacks[&pid],
                position_name: position,
            };
            if let Err(e) = self.persistence.hands.add_hand_player(hand_id, &record).await {
                warn!("room {}: add_hand_player failed for {pid}: {e}", self.id);
            }
        }

        let setup = HandSetup {
            seat_order: order.clone(),
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
        };

        let mut seats: HashMap<PlayerId, Seat> = HashMap::new();
        let mut seat_index: HashMap<PlayerId, usize> = HashMap::new();
        let mut player_names: HashMap<PlayerId, String> = HashMap::new();
        for (idx, &pid) in order.iter().enumerate() {
            seat_index.insert(pid, idx);
            let ps = self.players.get_mut(&pid).unwrap();
            player_names.insert(pid, ps.player.name.clone());
            if let Some(&difficulty) = self.bot_difficulties.get(&pid) {
                seats.insert(pid, Seat::Bot { difficulty });
            } else {
                let taken = std::mem::replace(&mut ps.channel, Channel::bot());
                seats.insert(pid, Seat::Human { channel: taken });
            }
        }

        let buffer: Arc<Mutex<Vec<HandEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let mut requester = RoomActionRequester {
            room_id: self.id.clone(),
            hand_id,
            engines: self.engines.clone(),
            hands: self.persistence.hands.clone(),
            seats,
            seat_index,
            player_names,
            hole_cards: HashMap::new(),
            buffer: buffer.clone(),
            board: Vec::new(),
            street: crate::game::Street::Preflop,
            action_num: 0,
            pot_total: 0,
            stacks: starting_stacks.clone(),
            folded: HashSet::new(),
            all_in: HashSet::new(),
            action_history: Vec::new(),
        };

        let on_action = {
            let buffer = buffer.clone();
            move |action: &crate::bet::ResolvedAction| {
                buffer.lock().unwrap().push(HandEvent::Action(action.clone()));
            }
        };
        let on_board = {
            let buffer = buffer.clone();
            move |cards: &[Card]| {
                buffer.lock().unwrap().push(HandEvent::Board(cards.to_vec()));
            }
        };
        let on_hole_cards = {
            let buffer = buffer.clone();
            move |pid: PlayerId, cards: &[Card]| {
                buffer.lock().unwrap().push(HandEvent::HoleCards(pid, cards.to_vec()));
            }
        };

        self.broadcast(ServerEvent::NewGame { room_id: self.id.clone(), dealer_seat: self.dealer_seat })
            .await;

        let result: HandResult = run_hand(
            &self.config,
            &mut self.players,
            &setup,
            Deck::new_shuffled(),
            &mut requester,
            on_action,
            on_board,
            on_hole_cards,
        )
        .await;

        requester.flush().await;
        let channels = requester.into_channels();
        for (pid, channel) in channels {
            if let Some(ps) = self.players.get_mut(&pid) {
                ps.channel = channel;
            }
        }

        self.settle_hand(hand_id, &order, &starting_stacks, &result).await;

        // Record the replay buffer for rejoiners until the next hand starts.
        self.event_messages = Self::replay_events(&result, &order);
    }

    fn replay_events(result: &HandResult, order: &[PlayerId]) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        for &pid in order {
            if let Some(cards) = result.hole_cards.get(&pid) {
                events.push(ServerEvent::Cards { target: pid, cards: cards.clone() });
            }
        }
        if !result.board.is_empty() {
            events.push(ServerEvent::SharedCards { cards: result.board.clone() });
        }
        events
    }

    async fn settle_hand(
        &mut self,
        hand_id: HandId,
        order: &[PlayerId],
        starting_stacks: &HashMap<PlayerId, i64>,
        result: &HandResult,
    ) {
        let before_total: i64 = starting_stacks.values().sum();
        let after_total: i64 = order
            .iter()
            .map(|pid| self.players.get(pid).map(|p| p.player.money()).unwrap_or(0))
            .sum();
        if let Err(e) = assert_chip_conservation(before_total, after_total) {
            warn!("room {}: hand {hand_id} aborted: {e}", self.id);
            self.refund_to_starting_stacks(order, starting_stacks);
            return;
        }

        let board_json = serde_json::to_string(&result.board).unwrap_or_else(|_| "[]".to_string());
        let total_pot: i64 = result.pots.iter().map(|p| p.amount).sum();
        if let Err(e) = self.persistence.hands.finish_hand(hand_id, &board_json, total_pot).await {
            warn!("room {}: finish_hand failed: {e}", self.id);
        }

        let totals = result.total_payouts();
        for (pot_index, (pot, payout)) in result.pots.iter().zip(result.payouts_per_pot.iter()).enumerate() {
            let winners: Vec<PlayerId> = payout.keys().copied().collect();
            self.broadcast(ServerEvent::WinnerDesignation { winners, pot_index, amount: pot.amount })
                .await;
        }

        for &pid in order {
            let Some(hole_cards) = result.hole_cards.get(&pid) else { continue };
            let hole_json = serde_json::to_string(hole_cards).ok();
            if let Err(e) = self
                .persistence
                .hands
                .update_hand_player_result(hand_id, pid, starting_stacks[&pid], false, hole_json.as_deref())
                .await
            {
                warn!("room {}: hole-card persist failed for {pid}: {e}", self.id);
            }

            let ending_stack = self.players.get(&pid).map(|p| p.player.money()).unwrap_or(0);
            let is_winner = totals.get(&pid).is_some_and(|&a| a > 0);
            if let Err(e) = self
                .persistence
                .hands
                .update_hand_player_result(hand_id, pid, ending_stack, is_winner, None)
                .await
            {
                warn!("room {}: settlement persist failed for {pid}: {e}", self.id);
            }

            let is_bot = self.players.get(&pid).is_some_and(PlayerServer::is_bot);
            if is_bot {
                continue;
            }

            let net_chips = ending_stack - starting_stacks[&pid];
            if let Err(e) = self.persistence.stats.update_daily_stats(pid, 1, net_chips).await {
                warn!("room {}: daily stats persist failed for {pid}: {e}", self.id);
            }

            let stats = result.stats.get(&pid).copied().unwrap_or_default();
            let delta = LifetimeStatsDelta {
                hands_played: 1,
                net_chips,
                vpip: stats.vpip as i64,
                pfr: stats.pfr as i64,
                threebet: stats.threebet as i64,
                agg_bets: stats.agg_bets as i64,
                agg_calls: stats.agg_calls as i64,
                wtsd: stats.wtsd as i64,
                wsd: stats.wsd as i64,
                net_bb: net_chips as f64 / self.config.big_blind as f64,
            };
            if let Err(e) = self.persistence.stats.update_lifetime_stats(pid, delta).await {
                warn!("room {}: lifetime stats persist failed for {pid}: {e}", self.id);
            }

            if let Err(e) = self.persistence.wallet.update_player_wallet(pid, ending_stack).await {
                warn!("room {}: wallet persist failed for {pid}: {e}", self.id);
            }

            if ending_stack == 0 {
                self.broadcast(ServerEvent::DeadPlayer { player_id: pid }).await;
            }
            let net_points = ending_stack - starting_stacks[&pid];
            self.broadcast(ServerEvent::UpdateRankingData { player_id: pid, net_chips: net_points })
                .await;
        }

        info!(
            "room {}: hand {hand_id} settled, pot {total_pot}, board {:?}",
            self.id, result.board
        );
    }

    /// Restores every seated player to the stack they held at the start of
    /// the hand (spec §7 "Fatal" error kind). Called only when
    /// `assert_chip_conservation` catches a pot-sum mismatch; the hand's
    /// own settlement is skipped entirely since its payouts can't be
    /// trusted.
    fn refund_to_starting_stacks(&mut self, order: &[PlayerId], starting_stacks: &HashMap<PlayerId, i64>) {
        for &pid in order {
            let Some(ps) = self.players.get_mut(&pid) else { continue };
            let current = ps.player.money();
            let target = starting_stacks[&pid];
            if target > current {
                let _ = ps.player.add_money(target - current);
            } else if target < current {
                let _ = ps.player.take_money(current - target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room() -> GameRoom {
        use crate::db::repository::mock::{MockApiKeyRepository, MockHandRepository, MockStatsRepository, MockWalletRepository};

        let persistence = RoomPersistence {
            hands: Arc::new(MockHandRepository::new()),
            wallet: Arc::new(MockWalletRepository::new()),
            stats: Arc::new(MockStatsRepository::new()),
            api_keys: Arc::new(MockApiKeyRepository::new()),
        };
        GameRoom::new(
            "room-1".to_string(),
            false,
            None,
            Arc::new(Config::default()),
            Arc::new(BotEngineRegistry::tabular_only()),
            persistence,
        )
    }

    fn bot_channel_pair() -> Channel<crate::net::ClientMessage, ServerEvent> {
        Channel::bot()
    }

    #[tokio::test]
    async fn first_joiner_becomes_owner_and_seats_at_zero() {
        let mut room = test_room();
        let outcome = room
            .join(1, "alice".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Added);
        assert_eq!(room.owner, Some(1));
        assert_eq!(room.seats()[0], Some(1));
    }

    #[tokio::test]
    async fn rejoin_with_same_id_is_a_reconnect_not_a_new_seat() {
        let mut room = test_room();
        room.join(1, "alice".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap();
        let outcome = room
            .join(1, "alice".to_string(), 9999, None, bot_channel_pair(), None)
            .await
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Reconnected);
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[&1].player.money(), 3000, "reconnect must not overwrite the stack");
    }

    #[tokio::test]
    async fn room_full_rejects_further_joins() {
        let mut room = test_room();
        room.seats = vec![None; 1];
        room.join(1, "alice".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap();
        let err = room
            .join(2, "bob".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::RoomFull));
    }

    #[tokio::test]
    async fn only_owner_can_add_a_bot() {
        let mut room = test_room();
        room.join(1, "alice".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap();
        let err = room.add_bot(2, 1, "easy").await.unwrap_err();
        assert!(matches!(err, RoomError::NotOwner));
        let bot_id = room.add_bot(1, 1, "easy").await.unwrap();
        assert_eq!(room.seats()[1], Some(bot_id));
    }

    #[tokio::test]
    async fn removing_a_bot_frees_its_seat() {
        let mut room = test_room();
        room.join(1, "alice".to_string(), 3000, None, bot_channel_pair(), None)
            .await
            .unwrap();
        let bot_id = room.add_bot(1, 2, "hard").await.unwrap();
        room.remove_bot(1, None, Some(bot_id)).await.unwrap();
        assert_eq!(room.seats()[2], None);
    }

    #[tokio::test]
    async fn private_room_rejects_wrong_passphrase() {
        let mut room = test_room();
        room.private = true;
        room.passphrase_hash = Some(hash_passphrase("letmein"));
        let err = room
            .join(1, "alice".to_string(), 3000, None, bot_channel_pair(), Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::InvalidPassphrase));
        room.join(1, "alice".to_string(), 3000, None, bot_channel_pair(), Some("letmein"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dealer_rotates_to_next_occupied_seat() {
        let mut room = test_room();
        room.seats = vec![Some(1), None, Some(3), Some(4)];
        room.dealer_seat = 0;
        room.rotate_dealer();
        assert_eq!(room.dealer_seat, 2);
        room.rotate_dealer();
        assert_eq!(room.dealer_seat, 3);
        room.rotate_dealer();
        assert_eq!(room.dealer_seat, 0);
    }
}
