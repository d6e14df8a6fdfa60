use std::collections::{HashMap, HashSet};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use holdem_engine::bet::build_pots;
use holdem_engine::card::{Card, Deck, Suit};
use holdem_engine::score::{argmax, eval};

/// Benchmark hand evaluation with 2 cards (pocket cards)
fn bench_hand_eval_2_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spades), // Ace
        Card(13, Suit::Spades), // King
    ];

    c.bench_function("hand_eval_2_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark hand evaluation with 7 cards (hole + board)
fn bench_hand_eval_7_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spades),  // Pocket: Ace of Spades
        Card(13, Suit::Spades),  // Pocket: King of Spades
        Card(12, Suit::Spades),  // Board: Queen of Spades
        Card(11, Suit::Spades),  // Board: Jack of Spades
        Card(10, Suit::Spades),  // Board: Ten of Spades (royal flush)
        Card(2, Suit::Hearts),   // Board: 2 of Hearts
        Card(3, Suit::Diamonds), // Board: 3 of Diamonds
    ];

    c.bench_function("hand_eval_7_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark hand evaluation over 100 distinct 7-card hands
fn bench_hand_eval_100_iterations(c: &mut Criterion) {
    let mut all_hands = Vec::new();
    for i in 0..100 {
        let base_value = (i % 13) as u8 + 2;
        let cards = vec![
            Card(base_value, Suit::Spades),
            Card((base_value + 1).min(14), Suit::Hearts),
            Card((base_value + 2).min(14), Suit::Diamonds),
            Card((base_value + 3).min(14), Suit::Clubs),
            Card((base_value + 4).min(14), Suit::Spades),
            Card((base_value + 5).min(14), Suit::Hearts),
            Card((base_value + 6).min(14), Suit::Diamonds),
        ];
        all_hands.push(cards);
    }

    c.bench_function("hand_eval_100_iterations", |b| {
        b.iter(|| {
            all_hands
                .iter()
                .map(|cards| eval(cards))
                .collect::<Vec<_>>()
        });
    });
}

/// Benchmark showdown winner selection (argmax) over several scored hands
fn bench_hand_comparison(c: &mut Criterion) {
    let hands = vec![
        eval(&[Card(2, Suit::Clubs), Card(5, Suit::Hearts), Card(9, Suit::Diamonds)]),
        eval(&[Card(2, Suit::Clubs), Card(2, Suit::Hearts), Card(9, Suit::Diamonds)]),
        eval(&[
            Card(2, Suit::Clubs),
            Card(2, Suit::Hearts),
            Card(9, Suit::Diamonds),
            Card(9, Suit::Clubs),
        ]),
        eval(&[Card(2, Suit::Clubs), Card(2, Suit::Hearts), Card(2, Suit::Diamonds)]),
    ];

    c.bench_function("hand_comparison_4_hands", |b| {
        b.iter(|| argmax(&hands));
    });
}

/// Benchmark deck construction and shuffling, once per hand in the engine.
fn bench_deck_shuffle(c: &mut Criterion) {
    c.bench_function("deck_new_shuffled", |b| {
        b.iter(Deck::new_shuffled);
    });
}

/// Benchmark side-pot construction with a growing number of all-in levels,
/// the hot path of settlement for a hand with several short stacks.
fn bench_build_pots(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_pots");

    for &n_players in &[2usize, 4, 6, 10] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_players}_players")),
            &n_players,
            |b, &n| {
                let contributed: HashMap<i64, i64> =
                    (0..n as i64).map(|pid| (pid, (pid + 1) * 50)).collect();
                let folded: HashSet<i64> = HashSet::new();
                b.iter(|| build_pots(&contributed, &folded));
            },
        );
    }

    group.finish();
}

criterion_group!(
    hand_evaluation,
    bench_hand_eval_2_cards,
    bench_hand_eval_7_cards,
    bench_hand_eval_100_iterations,
    bench_hand_comparison,
);

criterion_group!(game_operations, bench_deck_shuffle, bench_build_pots,);

criterion_main!(hand_evaluation, game_operations);
