//! The table-driven "easy" engine (spec §4.6): hand-class lookup pre-flop,
//! category threshold post-flop. Ported verbatim from the hand-class sets
//! and pot-fraction rules in `original_source/poker/bots/registry.py`'s
//! `TableDrivenEasyEngine` — the premium/strong/speculative sets, the
//! `_preflop_decide`/`_postflop_decide` branches, and the raise/call
//! sizing helpers all correspond 1:1 to functions there (see DESIGN.md).

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;

use crate::bot::context::BotDecisionContext;
use crate::card::Card;
use crate::game::Street;
use crate::score::{self, Rank};

use super::context::BotDecisionEngine;

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

/// Canonical two-card hand notation: `"AA"`, `"AKs"`, `"AKo"`. Rank
/// characters are emitted high-to-low so `"AKs"` never appears as `"KAs"`.
fn hand_key(hole: &[Card; 2]) -> String {
    let (hi, lo) = if hole[0].rank() >= hole[1].rank() {
        (hole[0], hole[1])
    } else {
        (hole[1], hole[0])
    };
    if hi.rank() == lo.rank() {
        return format!("{}{}", rank_char(hi.rank()), rank_char(lo.rank()));
    }
    let suited = if hi.suit() == lo.suit() { "s" } else { "o" };
    format!("{}{}{}", rank_char(hi.rank()), rank_char(lo.rank()), suited)
}

static PREMIUM: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["AA", "KK", "QQ", "JJ", "TT", "AKs", "AKo", "AQs", "AQo", "KQs"]
        .into_iter()
        .collect()
});

static STRONG: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "99", "88", "77", "AJs", "ATs", "KJs", "QJs", "JTs", "KQo", "AJo", "KTs", "QTs", "T9s", "98s",
    ]
    .into_iter()
    .collect()
});

static SPECULATIVE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "66", "55", "44", "33", "22", "A9s", "A8s", "A7s", "A6s", "A5s", "A4s", "A3s", "A2s", "87s",
        "76s", "65s", "54s",
    ]
    .into_iter()
    .collect()
});

/// Clamps a raw amount into the legal `[min_bet, max_bet]` range for the
/// turn.
fn clamp_bet(amount: i64, min_bet: i64, max_bet: i64) -> i64 {
    amount.clamp(min_bet.min(max_bet), max_bet)
}

/// Calls if `min_bet` is within `max_ratio` of the pot, otherwise folds
/// (checks instead of folding when free).
fn call_or_fold(ctx: &BotDecisionContext, max_ratio: f64) -> i64 {
    if ctx.min_bet == 0 {
        return 0;
    }
    let pot = ctx.pot_total.max(1) as f64;
    if ctx.min_bet as f64 <= pot * max_ratio {
        ctx.min_bet
    } else {
        -1
    }
}

/// Bets `fraction * pot` when free to act, clamped into range.
fn bet(ctx: &BotDecisionContext, fraction: f64) -> i64 {
    let amount = (ctx.pot_total.max(ctx.min_bet.max(1)) as f64 * fraction).round() as i64;
    clamp_bet(amount, 0, ctx.max_bet)
}

/// Raises `fraction * pot` on top of the call, with a minimum raise-to of
/// `2 * min_bet` when already facing action (spec §4.6).
fn raise(ctx: &BotDecisionContext, fraction: f64) -> i64 {
    let base = (ctx.pot_total.max(1) as f64 * fraction).round() as i64;
    let floor = if ctx.min_bet > 0 { 2 * ctx.min_bet } else { 0 };
    clamp_bet(base.max(floor), ctx.min_bet, ctx.max_bet)
}

fn preflop_decide(ctx: &BotDecisionContext) -> i64 {
    let key = hand_key(&ctx.hand);
    if PREMIUM.contains(key.as_str()) {
        return raise(ctx, 0.9);
    }
    if STRONG.contains(key.as_str()) {
        return if ctx.min_bet == 0 { bet(ctx, 0.6) } else { call_or_fold(ctx, 0.5) };
    }
    if SPECULATIVE.contains(key.as_str()) {
        return call_or_fold(ctx, 0.25);
    }
    if ctx.min_bet == 0 { 0 } else { -1 }
}

fn postflop_decide(ctx: &BotDecisionContext) -> i64 {
    let mut seven: Vec<Card> = ctx.hand.to_vec();
    seven.extend(ctx.board.iter().copied());
    score::prepare_hand(&mut seven);
    let best = score::eval(&seven);
    let category = best.first().map(|s| s.rank).unwrap_or(Rank::HighCard);

    if category >= Rank::TwoPair {
        return if ctx.min_bet == 0 { bet(ctx, 0.6) } else { raise(ctx, 0.8) };
    }
    if category == Rank::OnePair {
        return call_or_fold(ctx, 0.4);
    }
    if ctx.min_bet == 0 { 0 } else { -1 }
}

/// The tabular "easy" bot engine (spec §4.6).
#[derive(Default)]
pub struct TabularEngine;

impl TabularEngine {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous decision path, reused by [`crate::bot::remote::RemoteEngine`]
    /// as its failure-mode fallback (spec §4.6, §7 Retries).
    pub fn decide_sync(&self, ctx: &BotDecisionContext) -> i64 {
        if ctx.street == Street::Preflop && ctx.board.is_empty() {
            preflop_decide(ctx)
        } else {
            postflop_decide(ctx)
        }
    }
}

#[async_trait]
impl BotDecisionEngine for TabularEngine {
    async fn decide(&self, context: &BotDecisionContext) -> i64 {
        self.decide_sync(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    fn base_ctx(hand: [Card; 2], board: Vec<Card>, min_bet: i64, max_bet: i64, pot: i64) -> BotDecisionContext {
        BotDecisionContext {
            room_id: "room-1".to_string(),
            game_id: 1,
            street: if board.is_empty() { Street::Preflop } else { Street::Flop },
            player_id: 1,
            player_name: "bot".to_string(),
            seat: 0,
            hand,
            board,
            players: vec![],
            pot_total: pot,
            street_bets: min_bet,
            min_bet,
            max_bet,
            to_call: min_bet,
            action_history: vec![],
        }
    }

    #[test]
    fn hand_key_normalizes_high_card_first() {
        let hole = [Card(13, Suit::Spades), Card(14, Suit::Hearts)];
        assert_eq!(hand_key(&hole), "AKo");
        let pair = [Card(9, Suit::Clubs), Card(9, Suit::Diamonds)];
        assert_eq!(hand_key(&pair), "99");
    }

    #[test]
    fn premium_hand_raises_preflop() {
        let ctx = base_ctx(
            [Card(14, Suit::Spades), Card(14, Suit::Hearts)],
            vec![],
            10,
            3000,
            15,
        );
        let engine = TabularEngine::new();
        let decision = engine.decide_sync(&ctx);
        assert!(decision > ctx.min_bet, "AA should raise preflop, got {decision}");
    }

    #[test]
    fn trash_hand_checks_or_folds_preflop() {
        let ctx = base_ctx(
            [Card(7, Suit::Clubs), Card(2, Suit::Diamonds)],
            vec![],
            0,
            3000,
            15,
        );
        let engine = TabularEngine::new();
        assert_eq!(engine.decide_sync(&ctx), 0, "free to act, should check");

        let facing_bet = base_ctx(
            [Card(7, Suit::Clubs), Card(2, Suit::Diamonds)],
            vec![],
            50,
            3000,
            15,
        );
        assert_eq!(engine.decide_sync(&facing_bet), -1, "facing a bet, should fold");
    }

    #[test]
    fn two_pair_or_better_raises_postflop() {
        let hand = [Card(10, Suit::Spades), Card(10, Suit::Hearts)];
        let board = vec![Card(4, Suit::Clubs), Card(4, Suit::Diamonds), Card(9, Suit::Spades)];
        let ctx = base_ctx(hand, board, 20, 3000, 100);
        let engine = TabularEngine::new();
        let decision = engine.decide_sync(&ctx);
        assert!(decision >= 2 * ctx.min_bet, "two pair facing a bet should raise, got {decision}");
    }
}
