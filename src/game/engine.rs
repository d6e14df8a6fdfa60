//! Drives one hand end-to-end: blinds, hole cards, the four streets,
//! showdown, settlement (spec §4.3). Owns the deck and the pots for the
//! duration of the hand; everything else (seating, persistence, the
//! transport) is injected as data or callbacks so this module stays
//! independent of the room/server/db layers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::bet::{self, HandLedger, Pot, ResolvedAction};
use crate::card::{Card, Deck};
use crate::config::Config;
use crate::game::states::{
    Blinds, DealHole, EarlyEnd, FlopBet, FlopDeal, Init, PhaseMeta, PokerHand, PreflopBet,
    RiverBet, RiverDeal, Settle, Showdown, TurnBet, TurnDeal,
};
use crate::game::{HandStats, Street, compute_hand_stats};
use crate::player::{PlayerId, PlayerServer};
use crate::score::{self, SubHand};

fn enter(phase: impl Into<PokerHand>) {
    let phase: PokerHand = phase.into();
    debug!("hand phase: {}", phase.label());
}

/// Everything the room needs to know once a hand is done: the board, the
/// final pots with their winners, each player's hole cards (for the
/// `hand_players.hole_cards` column), the in-flight stats, and the full
/// ordered action log (for `hand_actions`).
pub struct HandResult {
    pub board: Vec<Card>,
    pub hole_cards: HashMap<PlayerId, Vec<Card>>,
    pub pots: Vec<Pot>,
    /// Winners for each pot in `pots`, same index, chips already split
    /// (remainder to the earliest seat from the dealer, spec §4.3
    /// Showdown).
    pub payouts_per_pot: Vec<HashMap<PlayerId, i64>>,
    pub actions: Vec<ResolvedAction>,
    pub stats: HashMap<PlayerId, HandStats>,
    pub ended_early: bool,
}

impl HandResult {
    /// Total chips paid to each player across every pot.
    pub fn total_payouts(&self) -> HashMap<PlayerId, i64> {
        let mut totals: HashMap<PlayerId, i64> = HashMap::new();
        for pot in &self.payouts_per_pot {
            for (&pid, &amount) in pot {
                *totals.entry(pid).or_insert(0) += amount;
            }
        }
        totals
    }
}

/// Seating for one hand: `seat_order[0]` is the dealer; the rest follow
/// clockwise. All entries must key into `players`.
pub struct HandSetup {
    pub seat_order: Vec<PlayerId>,
    pub small_blind: i64,
    pub big_blind: i64,
}

/// Hook the room supplies to ask a seated player (human or bot) for a raw
/// bet amount, already having sent the `bet-request` event for humans or
/// consulted the bot decision pipeline for bots. `None` means the
/// deadline passed with no reply.
#[async_trait]
pub trait ActionRequester: Send {
    async fn request(
        &mut self,
        player_id: PlayerId,
        min_bet: i64,
        max_bet: i64,
        deadline: Duration,
    ) -> Option<i64>;
}

/// Runs one complete hand. `players` must contain every id in
/// `setup.seat_order`. `deck` is shuffled once per hand by the caller
/// (spec §4.3) and handed in rather than built here, so tests can deal a
/// chosen ordering via [`Deck::from_ordered`] without threading an RNG seed
/// through this function. `on_action` fires once per resolved turn (blinds,
/// bets, forced folds) in order, for persistence; `on_board` fires once
/// per community-card reveal with the cards dealt so far; `on_hole_cards`
/// fires once per player with their two hole cards, so the room can route
/// a `Cards` event to that player alone.
pub async fn run_hand<R, A, B, H>(
    config: &Config,
    players: &mut HashMap<PlayerId, PlayerServer>,
    setup: &HandSetup,
    mut deck: Deck,
    requester: &mut R,
    mut on_action: A,
    mut on_board: B,
    mut on_hole_cards: H,
) -> HandResult
where
    R: ActionRequester,
    A: FnMut(&ResolvedAction),
    B: FnMut(&[Card]),
    H: FnMut(PlayerId, &[Card]),
{
    let seats = &setup.seat_order;
    let n = seats.len();
    let mut ledger = HandLedger::new(seats);
    let mut all_actions: Vec<ResolvedAction> = Vec::new();

    // BLINDS. Heads-up exception: the dealer posts small, the other posts
    // big (spec §4.3).
    let (sb_seat, bb_seat) = if n == 2 { (0, 1) } else { (1, 2) };
    let sb_action = bet::post_blind(players, &mut ledger, seats[sb_seat], setup.small_blind);
    on_action(&sb_action);
    all_actions.push(sb_action);
    let bb_action = bet::post_blind(players, &mut ledger, seats[bb_seat], setup.big_blind);
    on_action(&bb_action);
    all_actions.push(bb_action);

    let mut street_contributed: HashMap<PlayerId, i64> = seats.iter().map(|&p| (p, 0)).collect();
    *street_contributed.get_mut(&seats[sb_seat]).unwrap() = sb_action.amount;
    *street_contributed.get_mut(&seats[bb_seat]).unwrap() = bb_action.amount;

    // DEAL_HOLE.
    let mut hole_cards: HashMap<PlayerId, Vec<Card>> = HashMap::new();
    for &pid in seats {
        let cards = deck.pop_cards(2);
        on_hole_cards(pid, &cards);
        hole_cards.insert(pid, cards);
    }

    let order_from = |start_offset: usize| -> Vec<PlayerId> {
        (0..n).map(|i| seats[(start_offset + i) % n]).collect()
    };

    // PREFLOP_BET starts after the big blind.
    let preflop_order = order_from((bb_seat + 1) % n);
    let outcome = bet::bet_round(
        config,
        Street::Preflop,
        players,
        &preflop_order,
        &mut ledger,
        &mut street_contributed,
        |pid, min_bet, max_bet, deadline| requester.request(pid, min_bet, max_bet, deadline),
        |action| {
            on_action(action);
            all_actions.push(action.clone());
        },
    )
    .await;

    let mut board: Vec<Card> = Vec::new();
    let mut ended_early = outcome.hand_ends;

    if !ended_early {
        let streets: [(usize, Street, usize); 3] = [
            (3, Street::Flop, 0),
            (1, Street::Turn, 0),
            (1, Street::River, 0),
        ];
        let mut all_in_no_more_betting = outcome.all_in_no_more_betting;
        for (count, street, _) in streets {
            if ended_early {
                break;
            }
            let dealt = deck.pop_cards(count);
            board.extend(dealt);
            on_board(&board);
            tokio::time::sleep(config.wait_after_street).await;

            if all_in_no_more_betting {
                // Remaining streets deal without further betting (spec
                // §4.3): skip straight to the next reveal.
                continue;
            }

            let mut street_contrib: HashMap<PlayerId, i64> = seats.iter().map(|&p| (p, 0)).collect();
            let street_order = order_from(1); // seat after dealer acts first post-flop
            let street_outcome = bet::bet_round(
                config,
                street,
                players,
                &street_order,
                &mut ledger,
                &mut street_contrib,
                |pid, min_bet, max_bet, deadline| requester.request(pid, min_bet, max_bet, deadline),
                |action| {
                    on_action(action);
                    all_actions.push(action.clone());
                },
            )
            .await;
            ended_early = street_outcome.hand_ends;
            all_in_no_more_betting = street_outcome.all_in_no_more_betting;
        }
    }

    // SHOWDOWN / EARLY_END / SETTLE.
    let non_folded: Vec<PlayerId> = seats
        .iter()
        .copied()
        .filter(|p| !ledger.folded.contains(p))
        .collect();

    let pots = bet::build_pots(&ledger.contributed, &ledger.folded);
    let total_pot: i64 = pots.iter().map(|p| p.amount).sum();

    let payouts_per_pot = if ended_early {
        // Only one non-folded player: award every pot to them uncontested,
        // no community cards dealt beyond what already happened (spec §8
        // boundary: BB wins uncontested, no reveal at all if folded
        // pre-flop).
        let winner = non_folded
            .first()
            .copied()
            .expect("bet rounds never fold the last remaining player");
        pots.iter().map(|p| HashMap::from([(winner, p.amount)])).collect()
    } else {
        let scored: HashMap<PlayerId, Vec<SubHand>> = non_folded
            .iter()
            .map(|&pid| {
                let mut seven: Vec<Card> = hole_cards[&pid].clone();
                seven.extend(board.iter().copied());
                score::prepare_hand(&mut seven);
                (pid, score::eval(&seven))
            })
            .collect();

        pots.iter()
            .map(|pot| split_pot(pot, &scored, seats))
            .collect()
    };

    for (pot, payout) in pots.iter().zip(payouts_per_pot.iter()) {
        for (&pid, &amount) in payout {
            players
                .get_mut(&pid)
                .expect("winner is seated")
                .player
                .add_money(amount)
                .unwrap_or_else(|e| log::warn!("settlement credit failed: {e}"));
        }
        let _ = pot;
    }

    let went_to_showdown: Vec<PlayerId> = if ended_early { Vec::new() } else { non_folded.clone() };
    let won_at_showdown: Vec<PlayerId> = payouts_per_pot
        .iter()
        .flat_map(|p| p.keys().copied())
        .filter(|pid| went_to_showdown.contains(pid))
        .collect();

    let stats = compute_hand_stats(&all_actions, seats, &went_to_showdown, &won_at_showdown);

    info!(
        "hand settled: pot {total_pot}, board {:?}, ended_early {ended_early}",
        board
    );

    HandResult {
        board,
        hole_cards,
        pots,
        payouts_per_pot,
        actions: all_actions,
        stats,
        ended_early,
    }
}

/// Splits one pot among its eligible winners: the highest-ranked
/// eligible score(s) split the pot evenly, remainder chips going to the
/// earliest seat from the dealer (spec §4.3 Showdown).
fn split_pot(
    pot: &Pot,
    scored: &HashMap<PlayerId, Vec<SubHand>>,
    seat_order: &[PlayerId],
) -> HashMap<PlayerId, i64> {
    let eligible: Vec<PlayerId> = pot
        .eligible_players()
        .into_iter()
        .filter(|pid| scored.contains_key(pid))
        .collect();
    if eligible.is_empty() {
        return HashMap::new();
    }
    let eligible_scores: Vec<Vec<SubHand>> = eligible.iter().map(|pid| scored[pid].clone()).collect();
    let winner_indices = score::argmax(&eligible_scores);
    let mut winners: Vec<PlayerId> = winner_indices.iter().map(|&i| eligible[i]).collect();
    // Earliest seat from the dealer gets the remainder; sort winners by
    // seat order so the split loop below hands it out deterministically.
    winners.sort_by_key(|pid| seat_order.iter().position(|s| s == pid).unwrap_or(usize::MAX));

    let share = pot.amount / winners.len() as i64;
    let mut remainder = pot.amount % winners.len() as i64;
    let mut payout = HashMap::new();
    for &pid in &winners {
        let mut amount = share;
        if remainder > 0 {
            amount += 1;
            remainder -= 1;
        }
        payout.insert(pid, amount);
    }
    payout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    fn pot(amount: i64, eligible: &[PlayerId]) -> Pot {
        Pot {
            amount,
            investments: eligible.iter().map(|&p| (p, amount / eligible.len() as i64)).collect(),
        }
    }

    #[test]
    fn split_pot_single_winner_takes_all() {
        let mut scored = HashMap::new();
        scored.insert(1, score::eval(&[Card(14, Suit::Spades), Card(14, Suit::Hearts), Card(2, Suit::Clubs), Card(3, Suit::Diamonds), Card(9, Suit::Spades)]));
        scored.insert(2, score::eval(&[Card(2, Suit::Hearts), Card(3, Suit::Spades), Card(4, Suit::Diamonds), Card(5, Suit::Clubs), Card(9, Suit::Hearts)]));
        let p = pot(200, &[1, 2]);
        let payout = split_pot(&p, &scored, &[1, 2]);
        assert_eq!(payout.get(&1), Some(&200));
        assert_eq!(payout.get(&2), None);
    }

    #[test]
    fn split_pot_tie_splits_evenly_with_remainder_to_earliest_seat() {
        let hand = vec![Card(10, Suit::Clubs), Card(10, Suit::Hearts), Card(4, Suit::Spades), Card(4, Suit::Diamonds), Card(9, Suit::Clubs)];
        let mut scored = HashMap::new();
        scored.insert(1, score::eval(&hand));
        scored.insert(2, score::eval(&hand));
        let p = pot(101, &[1, 2]);
        let payout = split_pot(&p, &scored, &[2, 1]);
        assert_eq!(payout.get(&2), Some(&51), "earliest seat from dealer gets remainder");
        assert_eq!(payout.get(&1), Some(&50));
    }
}
