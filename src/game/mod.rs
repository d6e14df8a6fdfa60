//! The Hold'em hand state machine (spec §4.3): blinds, hole cards, the
//! four streets, showdown, and settlement. [`engine::run_hand`] drives the
//! whole sequence for a single hand; [`states`] names its fourteen phases.

pub mod engine;
pub mod states;

use std::collections::HashMap;
use thiserror::Error;

use crate::player::PlayerId;

pub use states::{PhaseMeta, PokerHand};

/// One of the four betting streets (spec GLOSSARY).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Street {
    Preflop = 0,
    Flop = 1,
    Turn = 2,
    River = 3,
}

impl Street {
    pub fn as_db_i16(self) -> i16 {
        self as i16
    }
}

/// Fatal engine invariants (spec §7, "Fatal" kind): the pot sum doesn't
/// match contributions, or a phase transition was attempted out of order.
/// The room catches this, refunds every player to their starting stack,
/// and continues its own loop rather than propagating a panic.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("chip conservation violated: stacks+pots before {before}, after {after}")]
    ChipConservation { before: i64, after: i64 },
    #[error("hand has fewer than two players")]
    NotEnoughPlayers,
}

pub type GameResult<T> = Result<T, GameError>;

/// Per-hand, per-player in-flight statistics (spec §3 `HandStats`). Folded
/// into `player_lifetime_stats`/`player_daily_stats` at hand end (§4.7
/// step 5).
#[derive(Clone, Copy, Debug, Default)]
pub struct HandStats {
    pub vpip: bool,
    pub pfr: bool,
    pub threebet: bool,
    pub agg_bets: u32,
    pub agg_calls: u32,
    pub wtsd: bool,
    pub wsd: bool,
}

/// Derives each seated player's table position from their seat's offset
/// from the dealer button (spec §4.7 step 2; ported from
/// `original_source/poker/poker_game_holdem.py`'s `_init_db_record`, see
/// DESIGN.md). Heads-up is the one exception spec §4.3 calls out
/// explicitly: the dealer posts the small blind.
pub fn position_name(offset_from_dealer: usize, num_players: usize) -> &'static str {
    if num_players == 2 {
        return if offset_from_dealer == 0 { "SB" } else { "BB" };
    }
    match offset_from_dealer {
        0 => "BTN",
        1 => "SB",
        2 => "BB",
        3 => "UTG",
        o if o == num_players - 1 => "CO",
        o if num_players > 4 && o == num_players - 2 => "HJ",
        _ => "MP",
    }
}

/// Checks the chip-conservation invariant (spec §8): total chips before
/// the hand must equal total chips after it, since this engine charges no
/// rake.
pub fn assert_chip_conservation(before: i64, after: i64) -> GameResult<()> {
    if before != after {
        return Err(GameError::ChipConservation { before, after });
    }
    Ok(())
}

/// If a seated player's stack is below the big blind, they're loaned
/// `init_money` before the hand deals (spec §4.3 "Auto-topup"). Returns
/// the loaned amount so the caller can record the `chip_transactions` row
/// and wallet update atomically with the hand start.
pub fn auto_topup_amount(stack: i64, big_blind: i64, init_money: i64) -> Option<i64> {
    if stack < big_blind {
        Some(init_money)
    } else {
        None
    }
}

/// Computes each participant's in-flight `HandStats` from the ordered
/// list of resolved actions plus who reached/won showdown.
pub fn compute_hand_stats(
    actions: &[crate::bet::ResolvedAction],
    participants: &[PlayerId],
    went_to_showdown: &[PlayerId],
    won_at_showdown: &[PlayerId],
) -> HashMap<PlayerId, HandStats> {
    use crate::bet::ActionType;

    let mut stats: HashMap<PlayerId, HandStats> =
        participants.iter().map(|&p| (p, HandStats::default())).collect();
    let mut preflop_raises = 0u32;

    for action in actions {
        let entry = stats.entry(action.player_id).or_default();
        match action.action_type {
            ActionType::Call => entry.agg_calls += 1,
            ActionType::Bet | ActionType::Raise => entry.agg_bets += 1,
            ActionType::AllIn if action.is_aggressive => entry.agg_bets += 1,
            ActionType::AllIn => entry.agg_calls += 1,
            ActionType::Fold | ActionType::Check | ActionType::Blind => {}
        }

        if action.street == Street::Preflop {
            match action.action_type {
                ActionType::Call | ActionType::Bet | ActionType::Raise | ActionType::AllIn => {
                    entry.vpip = true;
                }
                ActionType::Fold | ActionType::Check | ActionType::Blind => {}
            }
            let is_preflop_raise = matches!(action.action_type, ActionType::Raise)
                || (action.action_type == ActionType::AllIn && action.is_aggressive);
            if is_preflop_raise {
                entry.pfr = true;
                preflop_raises += 1;
                if preflop_raises == 2 {
                    entry.threebet = true;
                }
            }
        }
    }

    for &pid in went_to_showdown {
        stats.entry(pid).or_default().wtsd = true;
    }
    for &pid in won_at_showdown {
        stats.entry(pid).or_default().wsd = true;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_up_dealer_posts_small_blind() {
        assert_eq!(position_name(0, 2), "SB");
        assert_eq!(position_name(1, 2), "BB");
    }

    #[test]
    fn six_max_positions_are_distinct() {
        let names: std::collections::HashSet<_> = (0..6).map(|o| position_name(o, 6)).collect();
        assert!(names.contains("BTN"));
        assert!(names.contains("SB"));
        assert!(names.contains("BB"));
        assert!(names.contains("CO"));
    }

    #[test]
    fn chip_conservation_detects_mismatch() {
        assert!(assert_chip_conservation(1000, 1000).is_ok());
        assert!(assert_chip_conservation(1000, 999).is_err());
    }

    #[test]
    fn auto_topup_only_below_big_blind() {
        assert_eq!(auto_topup_amount(5, 10, 3000), Some(3000));
        assert_eq!(auto_topup_amount(10, 10, 3000), None);
        assert_eq!(auto_topup_amount(11, 10, 3000), None);
    }
}
