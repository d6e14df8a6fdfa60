//! The bot subsystem (spec §4.6): decision engines selected by difficulty,
//! plus the `BotDecisionContext` snapshot they're handed. A bot's
//! transport-level behavior (swallowed outbound messages, timed-out
//! inbound recv) lives in [`crate::channel::Channel::Bot`] and
//! [`crate::player::PlayerServer::bot`] — this module is only the brain.

pub mod context;
pub mod remote;
pub mod tabular;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use context::{ActionHistoryEntry, BotDecisionContext, BotDecisionEngine, SeatedPlayerView};
pub use tabular::TabularEngine;

use crate::config::Config;
use crate::db::ApiKeyRepository;
use remote::RemoteEngine;

/// Bot skill tiers, matching the difficulty strings carried on
/// `room-control{action:"add-bot"}` requests (spec §4.4, §6). Unknown
/// strings fall back to `Easy`; `"normal"` is accepted as a synonym for
/// `Medium` (`original_source/poker/bots/registry.py`'s
/// `get_engine_for_difficulty`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
}

impl BotDifficulty {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "medium" | "normal" => BotDifficulty::Medium,
            "hard" => BotDifficulty::Hard,
            _ => BotDifficulty::Easy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BotDifficulty::Easy => "easy",
            BotDifficulty::Medium => "medium",
            BotDifficulty::Hard => "hard",
        }
    }
}

/// The three difficulty-keyed engines, built once at room/server startup
/// (spec's `BOT_ENGINE_REGISTRY`). `easy` is always the in-process tabular
/// engine; `medium`/`hard` are remote HTTP clients that fall back to it.
pub struct BotEngineRegistry {
    engines: HashMap<BotDifficulty, Arc<dyn BotDecisionEngine>>,
}

impl BotEngineRegistry {
    pub async fn new(config: &Config, api_keys: Arc<dyn ApiKeyRepository>) -> Self {
        let mut engines: HashMap<BotDifficulty, Arc<dyn BotDecisionEngine>> = HashMap::new();
        engines.insert(BotDifficulty::Easy, Arc::new(TabularEngine::new()));
        engines.insert(
            BotDifficulty::Medium,
            Arc::new(
                RemoteEngine::new(
                    "medium",
                    &api_keys,
                    config.bot_decision_url.as_deref(),
                    config.bot_decision_timeout,
                    None,
                )
                .await,
            ),
        );
        engines.insert(
            BotDifficulty::Hard,
            Arc::new(
                RemoteEngine::new(
                    "hard",
                    &api_keys,
                    config.bot_decision_url.as_deref(),
                    config.bot_decision_timeout,
                    None,
                )
                .await,
            ),
        );
        Self { engines }
    }

    /// Builds a registry with only the tabular engine, for tests and any
    /// deployment that never configures a remote solver.
    pub fn tabular_only() -> Self {
        let mut engines: HashMap<BotDifficulty, Arc<dyn BotDecisionEngine>> = HashMap::new();
        engines.insert(BotDifficulty::Easy, Arc::new(TabularEngine::new()));
        Self { engines }
    }

    pub fn get(&self, difficulty: BotDifficulty) -> Arc<dyn BotDecisionEngine> {
        self.engines
            .get(&difficulty)
            .or_else(|| self.engines.get(&BotDifficulty::Easy))
            .cloned()
            .expect("tabular engine is always registered")
    }

    pub async fn decide(&self, difficulty: BotDifficulty, context: &BotDecisionContext) -> i64 {
        self.get(difficulty).decide(context).await
    }
}

/// Default bot-decision timeout used when `Config::bot_decision_timeout`
/// isn't set (spec §6), re-exported for callers that build a
/// [`RemoteEngine`] directly.
pub const DEFAULT_BOT_DECISION_TIMEOUT: Duration = Duration::from_millis(1200);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parse_maps_normal_to_medium_and_unknown_to_easy() {
        assert_eq!(BotDifficulty::parse("normal"), BotDifficulty::Medium);
        assert_eq!(BotDifficulty::parse("medium"), BotDifficulty::Medium);
        assert_eq!(BotDifficulty::parse("hard"), BotDifficulty::Hard);
        assert_eq!(BotDifficulty::parse("whatever"), BotDifficulty::Easy);
    }

    #[tokio::test]
    async fn tabular_only_registry_serves_every_difficulty_via_easy() {
        let registry = BotEngineRegistry::tabular_only();
        let ctx = BotDecisionContext {
            room_id: "r1".to_string(),
            game_id: 1,
            street: crate::game::Street::Preflop,
            player_id: 1,
            player_name: "bot".to_string(),
            seat: 0,
            hand: [crate::card::Card(2, crate::card::Suit::Clubs), crate::card::Card(7, crate::card::Suit::Hearts)],
            board: vec![],
            players: vec![],
            pot_total: 15,
            street_bets: 0,
            min_bet: 0,
            max_bet: 3000,
            to_call: 0,
            action_history: vec![],
        };
        assert_eq!(registry.decide(BotDifficulty::Hard, &ctx).await, 0);
    }
}
