//! Cards and the deck they're dealt from.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four suits. Order is arbitrary but fixed, used only for deck
/// construction and display.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Clubs => "♣",
            Self::Diamonds => "♦",
            Self::Hearts => "♥",
            Self::Spades => "♠",
        };
        write!(f, "{repr}")
    }
}

/// `(rank ∈ 2..=14, suit)`. Ace is 14; straight evaluation treats an
/// ace-low wheel (A-2-3-4-5) as a special case rather than a second rank
/// value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub u8, pub Suit);

impl Card {
    pub fn rank(&self) -> u8 {
        self.0
    }

    pub fn suit(&self) -> Suit {
        self.1
    }

    /// Textual DTO used on the wire: `<suit-letter><rank-char>`, matching
    /// the bot remote-engine encoding.
    pub fn dto(&self) -> String {
        let rank = match self.0 {
            14 => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            11 => "J".to_string(),
            10 => "T".to_string(),
            v => v.to_string(),
        };
        let suit = match self.1 {
            Suit::Spades => "S",
            Suit::Hearts => "H",
            Suit::Diamonds => "D",
            Suit::Clubs => "C",
        };
        format!("{suit}{rank}")
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.dto())
    }
}

/// A shuffled 52-card deck with a dealing cursor. Shuffled once per hand;
/// `pop_cards` advances the cursor and never reuses a card within a hand.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    cursor: usize,
}

impl Deck {
    pub fn new_shuffled() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades] {
            for rank in 2..=14u8 {
                cards.push(Card(rank, suit));
            }
        }
        let mut rng = rand::rng();
        cards.shuffle(&mut rng);
        Self { cards, cursor: 0 }
    }

    /// Builds a deck from an explicit, pre-ordered card sequence rather
    /// than shuffling. Exists for deterministic testing of the hand
    /// state machine (spec §9's "inject a Clock collaborator" design note,
    /// applied the same way to card dealing) — production code always
    /// deals from [`Deck::new_shuffled`].
    pub fn from_ordered(cards: Vec<Card>) -> Self {
        Self { cards, cursor: 0 }
    }

    /// Deals the next `n` cards. Panics if the deck is exhausted, which
    /// would indicate a hand dealt more cards than a 52-card deck supports
    /// (an engine invariant violation, not a reachable runtime condition).
    pub fn pop_cards(&mut self, n: usize) -> Vec<Card> {
        assert!(
            self.cursor + n <= self.cards.len(),
            "deck exhausted: cursor {} + {} > 52",
            self.cursor,
            n
        );
        let dealt = self.cards[self.cursor..self.cursor + n].to_vec();
        self.cursor += n;
        dealt
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn new_shuffled_deck_is_a_permutation_of_52_unique_cards() {
        let deck = Deck::new_shuffled();
        assert_eq!(deck.cards.len(), 52);
        let unique: BTreeSet<_> = deck.cards.iter().map(|c| (c.0, c.1)).collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn pop_cards_advances_cursor_and_never_repeats() {
        let mut deck = Deck::new_shuffled();
        let hole = deck.pop_cards(2);
        let flop = deck.pop_cards(3);
        assert_eq!(hole.len(), 2);
        assert_eq!(flop.len(), 3);
        assert_eq!(deck.remaining(), 47);
        let all: BTreeSet<_> = hole.iter().chain(flop.iter()).map(|c| (c.0, c.1)).collect();
        assert_eq!(all.len(), 5);
    }

    #[test]
    #[should_panic(expected = "deck exhausted")]
    fn pop_cards_past_52_panics() {
        let mut deck = Deck::new_shuffled();
        deck.pop_cards(52);
        deck.pop_cards(1);
    }

    #[test]
    fn card_dto_round_trips_readable_shorthand() {
        assert_eq!(Card(14, Suit::Spades).dto(), "SA");
        assert_eq!(Card(10, Suit::Hearts).dto(), "HT");
        assert_eq!(Card(2, Suit::Clubs).dto(), "C2");
    }
}
