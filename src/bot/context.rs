//! `BotDecisionContext` (spec §4.6), the snapshot handed to a decision
//! engine. Field list and shape are ported directly from
//! `original_source/poker/bots/decision.py`'s `BotDecisionContext`
//! dataclass (see DESIGN.md); `player_name` is carried over as a
//! **(SUPPLEMENT)** even though the distilled spec's field list omits it,
//! since the tabular engine's logging and the remote engine's payload both
//! read it in the original.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::game::Street;
use crate::player::PlayerId;
use crate::room::RoomId;

/// One other seated player, as visible to the bot deciding its action.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeatedPlayerView {
    pub player_id: PlayerId,
    pub seat: usize,
    pub stack: i64,
    pub folded: bool,
    pub all_in: bool,
}

/// One already-resolved action this hand, for the `action_history` the
/// remote engine forwards verbatim.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActionHistoryEntry {
    pub player_id: PlayerId,
    pub street: Street,
    pub action_type: &'static str,
    pub amount: i64,
}

/// Everything a decision engine needs to pick an action for one bot turn.
/// Constructed fresh by the room for every bet request; never mutated.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BotDecisionContext {
    pub room_id: RoomId,
    pub game_id: i64,
    pub street: Street,
    pub player_id: PlayerId,
    pub player_name: String,
    pub seat: usize,
    pub hand: [Card; 2],
    pub board: Vec<Card>,
    pub players: Vec<SeatedPlayerView>,
    pub pot_total: i64,
    pub street_bets: i64,
    pub min_bet: i64,
    pub max_bet: i64,
    pub to_call: i64,
    pub action_history: Vec<ActionHistoryEntry>,
}

/// A pluggable bot brain: given a context, returns a raw bet amount in the
/// same `-1`/`0`/`min_bet`/`>min_bet` vocabulary the bet handler already
/// speaks (spec §4.6 "Decision plumbing").
#[async_trait]
pub trait BotDecisionEngine: Send + Sync {
    async fn decide(&self, context: &BotDecisionContext) -> i64;
}
