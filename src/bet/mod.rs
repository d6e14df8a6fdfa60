//! Turn scheduling, raise legality, all-in handling, and pot splitting
//! (spec §4.2 `BetRounder`/`BetHandler`).
//!
//! A betting round is driven by [`bet_round`]; pot construction from
//! cumulative per-hand contributions is the pure function [`build_pots`],
//! called once at settlement rather than incrementally, since the result
//! is identical either way and a single pass is easier to reason about.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::warn;

use crate::config::Config;
use crate::game::Street;
use crate::player::{PlayerId, PlayerServer};

/// A pot with the chips it holds and the set of players still eligible to
/// win it. Eligibility is the key set of `investments` — a folded
/// player's chips are still counted in `amount` but never appear here, so
/// there's no redundant separate `eligible_players` field to drift out of
/// sync with it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pot {
    pub amount: i64,
    pub investments: HashMap<PlayerId, i64>,
}

impl Pot {
    pub fn eligible_players(&self) -> Vec<PlayerId> {
        self.investments.keys().copied().collect()
    }
}

/// Builds the full set of pots (main + side pots) from each player's total
/// contribution to the hand so far and which of them have folded (spec
/// §4.2 "Side-pot construction"). Ascending distinct contribution levels
/// become pot boundaries; adjacent layers with an identical eligible set
/// are merged into one `Pot` so "main pot" / "side pot" map 1:1 onto the
/// scenarios in spec §8.
pub fn build_pots(
    contributed: &HashMap<PlayerId, i64>,
    folded: &HashSet<PlayerId>,
) -> Vec<Pot> {
    let mut levels: Vec<i64> = contributed.values().copied().filter(|&v| v > 0).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots: Vec<Pot> = Vec::new();
    let mut prev = 0i64;
    for level in levels {
        let layer = level - prev;
        let contributors: Vec<PlayerId> = contributed
            .iter()
            .filter(|&(_, &amt)| amt >= level)
            .map(|(&pid, _)| pid)
            .collect();
        let amount = layer * contributors.len() as i64;
        let investments: HashMap<PlayerId, i64> = contributors
            .iter()
            .filter(|pid| !folded.contains(pid))
            .map(|&pid| (pid, layer))
            .collect();

        let merged = pots.last_mut().is_some_and(|last| {
            let last_keys: HashSet<_> = last.investments.keys().copied().collect();
            let cur_keys: HashSet<_> = investments.keys().copied().collect();
            last_keys == cur_keys
        });
        if merged {
            let last = pots.last_mut().unwrap();
            last.amount += amount;
            for (pid, amt) in investments {
                *last.investments.entry(pid).or_insert(0) += amt;
            }
        } else {
            pots.push(Pot { amount, investments });
        }
        prev = level;
    }
    pots
}

/// Classification of a resolved bet for the `hand_actions.action_type`
/// column (spec §4.7).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionType {
    Blind,
    Fold,
    Check,
    Bet,
    Call,
    Raise,
    AllIn,
}

impl ActionType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            ActionType::Blind => "blind",
            ActionType::Fold => "fold",
            ActionType::Check => "check",
            ActionType::Bet => "bet",
            ActionType::Call => "call",
            ActionType::Raise => "raise",
            ActionType::AllIn => "all-in",
        }
    }
}

/// Classifies a resolved `bet` amount against the legal `min_bet`/`max_bet`
/// for that turn, per spec §4.7's table. `forced` overrides the derived
/// type (used for blinds, which are neither a check/call/raise in the
/// ordinary sense).
pub fn classify_action(bet: i64, min_bet: i64, max_bet: i64, forced: Option<ActionType>) -> ActionType {
    if let Some(f) = forced {
        return f;
    }
    if bet == -1 {
        return ActionType::Fold;
    }
    let base = if min_bet == 0 {
        if bet == 0 { ActionType::Check } else { ActionType::Bet }
    } else if bet == min_bet {
        ActionType::Call
    } else {
        ActionType::Raise
    };
    if bet == max_bet && bet > 0 {
        ActionType::AllIn
    } else {
        base
    }
}

/// Clamps a raw requested bet into the legal range for the turn (spec
/// §4.2, §7 Game-rule errors: illegal bets are silently clamped, never
/// rejected outright). `-1` (fold) and `0` (check, only legal when
/// `min_bet == 0`) pass through unchanged; anything else is clamped into
/// `min_bet..=max_bet`, with raises additionally required to meet
/// `min_raise_to` (the current contribution level plus the last raise
/// increment) when `strict` raise-increment discipline is enabled.
pub fn resolve_bet(
    requested: i64,
    min_bet: i64,
    max_bet: i64,
    min_raise_to: i64,
    strict: bool,
) -> i64 {
    if requested == -1 {
        return -1;
    }
    if requested == 0 {
        return if min_bet == 0 { 0 } else { min_bet.min(max_bet) };
    }
    let mut amount = requested.clamp(min_bet.min(max_bet), max_bet);
    if strict && amount > min_bet && amount < min_raise_to {
        amount = min_raise_to.min(max_bet);
    }
    amount
}

/// One resolved turn, ready to be persisted as a `hand_actions` row (spec
/// §4.7 step 4) and folded into in-flight `HandStats`.
#[derive(Clone, Debug)]
pub struct ResolvedAction {
    pub player_id: PlayerId,
    pub street: Street,
    pub action_type: ActionType,
    /// Chips moved into the pot by this action (0 for fold/check).
    pub amount: i64,
    pub pot_before: i64,
    pub timed_out: bool,
    /// True when this action raised the current contribution level,
    /// including an all-in raise. Distinguishes an all-in *raise* from an
    /// all-in *call* for the §4.7 aggression-factor bookkeeping, which
    /// counts them differently even though both land on `ActionType::AllIn`.
    pub is_aggressive: bool,
}

/// Outcome of a single `bet_round` call.
#[derive(Clone, Copy, Debug, Default)]
pub struct BetRoundOutcome {
    /// Only one non-folded player remains; jump straight to `Settle`.
    pub hand_ends: bool,
    /// Every remaining player is all-in; deal remaining streets without
    /// further betting.
    pub all_in_no_more_betting: bool,
}

/// Per-hand betting state threaded through every street's `bet_round`
/// call. Lives for the duration of one hand.
pub struct HandLedger {
    /// Total chips each player has committed to the pot so far this hand.
    pub contributed: HashMap<PlayerId, i64>,
    pub folded: HashSet<PlayerId>,
    pub all_in: HashSet<PlayerId>,
    /// Running total committed-to-pots as of the start of the current
    /// street, used to compute `pot_before` for the §4.7 persistence
    /// contract (`pot_before` = committed-to-pots + committed-this-street
    /// - this action's own contribution).
    pub pot_before_street: i64,
}

impl HandLedger {
    pub fn new(seats: &[PlayerId]) -> Self {
        Self {
            contributed: seats.iter().map(|&p| (p, 0)).collect(),
            folded: HashSet::new(),
            all_in: HashSet::new(),
            pot_before_street: 0,
        }
    }

    pub fn active_count(&self) -> usize {
        self.contributed.len() - self.folded.len()
    }

    pub fn total_pot(&self) -> i64 {
        self.contributed.values().sum()
    }
}

/// Posts a forced blind for `player_id`. Short-stacked players post their
/// entire remaining stack (an implicit all-in) rather than failing.
pub fn post_blind(
    players: &mut HashMap<PlayerId, PlayerServer>,
    ledger: &mut HandLedger,
    player_id: PlayerId,
    amount: i64,
) -> ResolvedAction {
    let pot_before = ledger.total_pot();
    let stack = players[&player_id].player.money();
    let posted = amount.min(stack);
    players
        .get_mut(&player_id)
        .expect("blind poster is seated")
        .player
        .take_money(posted)
        .expect("posted is clamped to stack");
    *ledger.contributed.get_mut(&player_id).unwrap() += posted;
    if posted == stack {
        ledger.all_in.insert(player_id);
    }
    ResolvedAction {
        player_id,
        street: Street::Preflop,
        action_type: ActionType::Blind,
        amount: posted,
        pot_before,
        timed_out: false,
        is_aggressive: false,
    }
}

/// Drives one betting round: iterates `order` starting from the first
/// entry, skipping folded/all-in players, requesting an action from each
/// remaining player with a `BET_TIMEOUT + TIMEOUT_TOLERANCE` deadline. A
/// missed deadline is a forced fold. After a raise, action reopens to
/// every non-folded, non-all-in player except the raiser. The round ends
/// when every remaining player has matched the highest contribution or is
/// all-in.
///
/// `street_contributed` is the amount each player has already put in
/// *this street* before the round starts — zero for post-flop streets,
/// the posted blinds for the preflop round (spec's `is_blind_round`
/// posts blinds immediately before calling this). It's also the round's
/// output: the final per-player street contributions, which the caller
/// folds back into `ledger.contributed` (already updated live) and
/// discards at the next street.
///
/// `request_action` asks the seated player (human or bot) for a raw bet
/// amount; callers supply it so this module stays independent of the
/// transport and bot-decision layers. `on_action` is invoked once per
/// resolved turn, in order, so persistence can append `hand_actions` rows
/// with a strictly monotonic `action_num` (spec §4.7 step 4, §5 ordering
/// guarantee).
pub async fn bet_round<F, Fut, A>(
    config: &Config,
    street: Street,
    players: &mut HashMap<PlayerId, PlayerServer>,
    order: &[PlayerId],
    ledger: &mut HandLedger,
    street_contributed: &mut HashMap<PlayerId, i64>,
    mut request_action: F,
    mut on_action: A,
) -> BetRoundOutcome
where
    F: FnMut(PlayerId, i64, i64, Duration) -> Fut,
    Fut: std::future::Future<Output = Option<i64>>,
    A: FnMut(&ResolvedAction),
{
    for &pid in order {
        street_contributed.entry(pid).or_insert(0);
    }
    let mut current_max = street_contributed.values().copied().max().unwrap_or(0);
    let mut last_raise_increment = config.big_blind;

    let deadline = config.bet_timeout + config.timeout_tolerance;

    // Active players this street, in order, repeated until the round
    // closes. `acted_since_raise` tracks who still owes a decision after
    // the most recent raise; starts as everyone not already folded/all-in.
    let live = |ledger: &HandLedger, pid: PlayerId| {
        !ledger.folded.contains(&pid) && !ledger.all_in.contains(&pid)
    };

    let mut pending: std::collections::VecDeque<PlayerId> =
        order.iter().copied().filter(|&p| live(ledger, p)).collect();

    while let Some(pid) = pending.pop_front() {
        if !live(ledger, pid) {
            continue;
        }
        if ledger.active_count() <= 1 {
            break;
        }
        let already = *street_contributed.get(&pid).unwrap_or(&0);
        let to_call = current_max - already;
        let stack = players[&pid].player.money();
        let min_bet = to_call.max(0).min(stack);
        let max_bet = stack;
        let min_raise_to = (current_max - already) + last_raise_increment;

        let pot_before = ledger.total_pot();
        let raw = request_action(pid, min_bet, max_bet, deadline).await;
        let (resolved, timed_out) = match raw {
            Some(r) => (
                resolve_bet(r, min_bet, max_bet, min_raise_to, config.strict_raise_increment),
                false,
            ),
            None => (-1, true),
        };

        let forced = if timed_out { Some(ActionType::Fold) } else { None };
        let action_type = classify_action(resolved, min_bet, max_bet, forced);

        let mut is_aggressive = false;
        match action_type {
            ActionType::Fold => {
                ledger.folded.insert(pid);
            }
            _ => {
                let stack_before = players[&pid].player.money();
                players
                    .get_mut(&pid)
                    .unwrap()
                    .player
                    .take_money(resolved)
                    .unwrap_or_else(|_| {
                        warn!("player {pid} bet {resolved} exceeding stack {stack_before}; clamping");
                    });
                *ledger.contributed.get_mut(&pid).unwrap() += resolved;
                *street_contributed.get_mut(&pid).unwrap() += resolved;
                let new_total = *street_contributed.get(&pid).unwrap();
                if action_type == ActionType::AllIn {
                    ledger.all_in.insert(pid);
                }
                if new_total > current_max {
                    let increment = new_total - current_max;
                    is_aggressive = true;
                    // A raise below the prior increment doesn't reopen
                    // action (spec §8 boundary behavior): only update
                    // `last_raise_increment`/reopen the queue when the
                    // raise is a genuine re-raise meeting the increment,
                    // which `resolve_bet` already enforced when strict.
                    if increment >= last_raise_increment {
                        last_raise_increment = increment.max(last_raise_increment);
                        current_max = new_total;
                        pending.clear();
                        for &other in order {
                            if other != pid && live(ledger, other) {
                                pending.push_back(other);
                            }
                        }
                    } else {
                        current_max = current_max.max(new_total);
                    }
                }
            }
        }

        let outcome = ResolvedAction {
            player_id: pid,
            street,
            action_type,
            amount: if action_type == ActionType::Fold { 0 } else { resolved },
            pot_before,
            timed_out,
            is_aggressive,
        };
        on_action(&outcome);
    }

    BetRoundOutcome {
        hand_ends: ledger.active_count() <= 1,
        all_in_no_more_betting: order
            .iter()
            .filter(|p| !ledger.folded.contains(p))
            .all(|p| ledger.all_in.contains(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pairs: &[(PlayerId, i64)]) -> HashMap<PlayerId, i64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn build_pots_heads_up_no_all_in_is_one_pot() {
        let contributed = m(&[(1, 100), (2, 100)]);
        let pots = build_pots(&contributed, &HashSet::new());
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 200);
        assert_eq!(pots[0].eligible_players().len(), 2);
    }

    #[test]
    fn build_pots_side_pot_scenario_3() {
        // A(50) all-in, B(200), C(200) per spec §8 scenario 3.
        let contributed = m(&[(1, 50), (2, 200), (3, 200)]);
        let pots = build_pots(&contributed, &HashSet::new());
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, 150);
        let mut main_eligible = pots[0].eligible_players();
        main_eligible.sort();
        assert_eq!(main_eligible, vec![1, 2, 3]);
        assert_eq!(pots[1].amount, 300);
        let mut side_eligible = pots[1].eligible_players();
        side_eligible.sort();
        assert_eq!(side_eligible, vec![2, 3]);
    }

    #[test]
    fn build_pots_folded_player_chips_stay_in_pot_but_not_eligible() {
        let contributed = m(&[(1, 100), (2, 100), (3, 100)]);
        let folded: HashSet<PlayerId> = [3].into_iter().collect();
        let pots = build_pots(&contributed, &folded);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 300, "folded chips still counted");
        let mut eligible = pots[0].eligible_players();
        eligible.sort();
        assert_eq!(eligible, vec![1, 2]);
    }

    #[test]
    fn classify_action_matches_spec_table() {
        assert_eq!(classify_action(-1, 10, 500, None), ActionType::Fold);
        assert_eq!(classify_action(0, 0, 500, None), ActionType::Check);
        assert_eq!(classify_action(20, 0, 500, None), ActionType::Bet);
        assert_eq!(classify_action(10, 10, 500, None), ActionType::Call);
        assert_eq!(classify_action(40, 10, 500, None), ActionType::Raise);
        assert_eq!(classify_action(500, 10, 500, None), ActionType::AllIn);
        assert_eq!(classify_action(500, 500, 500, None), ActionType::AllIn, "all-in call overrides call");
    }

    #[test]
    fn resolve_bet_clamps_below_min_raise_upward() {
        // Facing a min_bet (call) of 20 with last raise increment 10: a
        // "raise" to 25 doesn't meet the 30 minimum raise-to and is
        // clamped up to it.
        let resolved = resolve_bet(25, 20, 1000, 30, true);
        assert_eq!(resolved, 30);
    }

    #[test]
    fn resolve_bet_passes_through_fold_and_legal_check() {
        assert_eq!(resolve_bet(-1, 10, 500, 20, true), -1);
        assert_eq!(resolve_bet(0, 0, 500, 10, true), 0);
    }

    #[test]
    fn resolve_bet_clamps_over_stack_to_all_in() {
        assert_eq!(resolve_bet(10_000, 10, 500, 20, true), 500);
    }
}
