//! The remote HTTP decision engine (spec §4.6), ported from
//! `original_source/poker/bots/remote_engine.py`'s `RemoteDecisionEngine`:
//! resolves its base URL from the DB-stored `solver` API key first, then
//! `BOT_DECISION_URL`, POSTs `{difficulty, context}` to `{base_url}/act`
//! with a single attempt and a 1.2s default timeout, and falls back to the
//! tabular engine (or a minimal pot-odds heuristic) on any failure — never
//! retried (spec §7).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Serialize;

use crate::bot::context::{ActionHistoryEntry, BotDecisionContext, BotDecisionEngine, SeatedPlayerView};
use crate::bot::tabular::TabularEngine;
use crate::card::{Card, Suit};
use crate::db::ApiKeyRepository;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const SOLVER_API_KEY_SERVICE: &str = "solver";

fn suit_char(suit: Suit) -> char {
    match suit {
        Suit::Spades => 'S',
        Suit::Hearts => 'H',
        Suit::Diamonds => 'D',
        Suit::Clubs => 'C',
    }
}

fn rank_char(rank: u8) -> char {
    match rank {
        14 => 'A',
        13 => 'K',
        12 => 'Q',
        11 => 'J',
        10 => 'T',
        r => (b'0' + r).into(),
    }
}

/// `<suit-letter><rank-char>` wire encoding, matching the original's
/// `SUIT_TO_CHAR`/`RANK_TO_CHAR` tables.
fn to_backend_card(card: Card) -> String {
    format!("{}{}", suit_char(card.suit()), rank_char(card.rank()))
}

#[derive(Serialize)]
struct DecisionRequestContext<'a> {
    room_id: &'a str,
    game_id: i64,
    street: u8,
    player_id: i64,
    player_name: &'a str,
    seat: usize,
    hand: Vec<String>,
    board: Vec<String>,
    players: &'a [SeatedPlayerView],
    pot_total: i64,
    street_bets: i64,
    min_bet: i64,
    max_bet: i64,
    to_call: i64,
    action_history: &'a [ActionHistoryEntry],
}

#[derive(Serialize)]
struct DecisionRequest<'a> {
    difficulty: &'a str,
    context: DecisionRequestContext<'a>,
}

#[derive(serde::Deserialize)]
struct DecisionResponse {
    bet: Option<f64>,
}

/// Calls an external bot service via HTTP for decisions. One instance per
/// difficulty tier (spec names `medium`/`hard`; `easy` stays tabular).
pub struct RemoteEngine {
    difficulty: &'static str,
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    fallback: TabularEngine,
}

impl RemoteEngine {
    /// `base_url` resolution order matches the original: DB-stored
    /// `api_keys.solver` first, then the env-derived `Config::bot_decision_url`,
    /// then a local default.
    pub async fn new(
        difficulty: &'static str,
        api_keys: &Arc<dyn ApiKeyRepository>,
        configured_url: Option<&str>,
        timeout: Duration,
        token: Option<String>,
    ) -> Self {
        let db_url = api_keys
            .get_api_key(SOLVER_API_KEY_SERVICE)
            .await
            .ok()
            .flatten();
        let base_url = db_url
            .or_else(|| configured_url.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            difficulty,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
            fallback: TabularEngine::new(),
        }
    }

    async fn call(&self, context: &BotDecisionContext) -> Option<i64> {
        let url = format!("{}/act", self.base_url);
        let request = DecisionRequest {
            difficulty: self.difficulty,
            context: DecisionRequestContext {
                room_id: &context.room_id,
                game_id: context.game_id,
                street: context.street.as_db_i16() as u8,
                player_id: context.player_id,
                player_name: &context.player_name,
                seat: context.seat,
                hand: context.hand.iter().copied().map(to_backend_card).collect(),
                board: context.board.iter().copied().map(to_backend_card).collect(),
                players: &context.players,
                pot_total: context.pot_total,
                street_bets: context.street_bets,
                min_bet: context.min_bet,
                max_bet: context.max_bet,
                to_call: context.to_call,
                action_history: &context.action_history,
            },
        };

        let mut req = self.client.post(&url).timeout(self.timeout).json(&request);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: DecisionResponse = response.json().await.ok()?;
        body.bet.map(|b| b.round() as i64)
    }
}

#[async_trait]
impl BotDecisionEngine for RemoteEngine {
    async fn decide(&self, context: &BotDecisionContext) -> i64 {
        match self.call(context).await {
            Some(bet) => bet,
            None => {
                warn!(
                    "bot decision call to {}/act failed for player {}, falling back to tabular engine",
                    self.base_url, context.player_id
                );
                self.fallback.decide_sync(context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    #[test]
    fn to_backend_card_matches_original_encoding() {
        assert_eq!(to_backend_card(Card(14, Suit::Spades)), "SA");
        assert_eq!(to_backend_card(Card(10, Suit::Hearts)), "HT");
        assert_eq!(to_backend_card(Card(2, Suit::Clubs)), "C2");
    }
}
