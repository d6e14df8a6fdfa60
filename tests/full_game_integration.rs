//! End-to-end hand integration tests. Each test drives `run_hand` with a
//! scripted `ActionRequester` standing in for the room/transport layer and
//! checks the resulting stacks and action log against literal numbers.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use holdem_engine::bet::ActionType;
use holdem_engine::card::{Card, Deck, Suit};
use holdem_engine::config::Config;
use holdem_engine::game::engine::{run_hand, ActionRequester, HandSetup};
use holdem_engine::player::{Player, PlayerId, PlayerServer};

/// Feeds each player a pre-recorded queue of raw bet amounts. `None` means
/// "no reply in time" — a simulated timeout, which `bet_round` resolves as
/// a forced fold, without actually waiting out a real deadline.
struct ScriptedRequester {
    scripts: HashMap<PlayerId, VecDeque<Option<i64>>>,
}

impl ScriptedRequester {
    fn new() -> Self {
        Self { scripts: HashMap::new() }
    }

    fn script(mut self, player_id: PlayerId, actions: Vec<Option<i64>>) -> Self {
        self.scripts.insert(player_id, actions.into_iter().collect());
        self
    }
}

#[async_trait]
impl ActionRequester for ScriptedRequester {
    async fn request(
        &mut self,
        player_id: PlayerId,
        _min_bet: i64,
        _max_bet: i64,
        _deadline: Duration,
    ) -> Option<i64> {
        match self.scripts.get_mut(&player_id).and_then(VecDeque::pop_front) {
            Some(action) => action,
            None => panic!("no scripted action left for player {player_id}"),
        }
    }
}

fn seated_player(id: PlayerId, name: &str, money: i64) -> (PlayerId, PlayerServer) {
    let player = Player::new(id, name, money, None);
    (id, PlayerServer::bot(player))
}

fn fast_config() -> Config {
    // No community-card reveal needs an animation pause in a test.
    Config { wait_after_street: Duration::ZERO, ..Config::default() }
}

fn no_op_deck() -> Deck {
    // Heads-up walk and timeout-fold scenarios never reach the flop, so
    // only the four hole cards dealt before betting starts are ever
    // popped; their ranks don't affect either outcome.
    Deck::from_ordered(vec![
        Card(2, Suit::Clubs),
        Card(3, Suit::Clubs),
        Card(4, Suit::Clubs),
        Card(5, Suit::Clubs),
    ])
}

// ============================================================================
// Scenario 1: heads-up walk — small blind folds preflop
// ============================================================================

#[tokio::test]
async fn heads_up_walk_sb_fold_awards_blinds_to_big_blind() {
    const ALICE: PlayerId = 1;
    const BOB: PlayerId = 2;

    let mut players: HashMap<PlayerId, PlayerServer> = [
        seated_player(ALICE, "alice", 3000),
        seated_player(BOB, "bob", 3000),
    ]
    .into_iter()
    .collect();

    let setup = HandSetup {
        seat_order: vec![ALICE, BOB],
        small_blind: 5,
        big_blind: 10,
    };

    let mut requester = ScriptedRequester::new().script(ALICE, vec![Some(-1)]);

    let result = run_hand(
        &fast_config(),
        &mut players,
        &setup,
        no_op_deck(),
        &mut requester,
        |_| {},
        |_| {},
        |_, _| {},
    )
    .await;

    assert!(result.ended_early);
    assert_eq!(players[&ALICE].player.money(), 2995);
    assert_eq!(players[&BOB].player.money(), 3005);

    let actions: Vec<(PlayerId, ActionType)> =
        result.actions.iter().map(|a| (a.player_id, a.action_type)).collect();
    assert_eq!(
        actions,
        vec![
            (ALICE, ActionType::Blind),
            (BOB, ActionType::Blind),
            (ALICE, ActionType::Fold),
        ]
    );
}

// ============================================================================
// Scenario 2: all-in showdown — short stack shoves, the caller still has
// to check down every remaining street with no one left to act against
// ============================================================================

#[tokio::test]
async fn all_in_showdown_awards_main_pot_to_the_better_hand() {
    const ALICE: PlayerId = 1; // dealer/SB, shoves for 100
    const BOB: PlayerId = 2; // BB, calls with a deep stack

    let mut players: HashMap<PlayerId, PlayerServer> = [
        seated_player(ALICE, "alice", 100),
        seated_player(BOB, "bob", 1000),
    ]
    .into_iter()
    .collect();

    let setup = HandSetup {
        seat_order: vec![ALICE, BOB],
        small_blind: 5,
        big_blind: 10,
    };

    // Alice: A-A. Bob: K-K. Board: 2-3-4-5-9 with no suit overlap, so
    // Alice's seven cards contain the ace-low wheel (A-2-3-4-5) and Bob's
    // don't — Alice wins with a straight over a pair of kings regardless
    // of how the evaluator walks the 5-of-7 combinations.
    let deck = Deck::from_ordered(vec![
        Card(14, Suit::Spades),
        Card(14, Suit::Hearts),
        Card(13, Suit::Spades),
        Card(13, Suit::Hearts),
        Card(2, Suit::Clubs),
        Card(3, Suit::Diamonds),
        Card(4, Suit::Hearts),
        Card(5, Suit::Spades),
        Card(9, Suit::Clubs),
    ]);

    let mut requester = ScriptedRequester::new()
        .script(ALICE, vec![Some(95)])
        .script(BOB, vec![Some(90), Some(0), Some(0), Some(0)]);

    let result = run_hand(
        &fast_config(),
        &mut players,
        &setup,
        deck,
        &mut requester,
        |_| {},
        |_| {},
        |_, _| {},
    )
    .await;

    assert!(!result.ended_early);
    assert_eq!(result.board.len(), 5);
    assert_eq!(players[&ALICE].player.money(), 200);
    assert_eq!(players[&BOB].player.money(), 900);

    assert_eq!(result.pots.len(), 1, "both players contributed the same total, one pot");
    assert_eq!(result.pots[0].amount, 200);
    let totals = result.total_payouts();
    assert_eq!(totals.get(&ALICE), Some(&200));
    assert_eq!(totals.get(&BOB), None);
}

// ============================================================================
// Scenario 4: a missed deadline is a forced fold
// ============================================================================

#[tokio::test]
async fn missed_deadline_forces_fold_and_awards_pot_to_remaining_player() {
    const DEALER: PlayerId = 1; // SB, calls
    const BIG_BLIND: PlayerId = 2; // faces min_bet == 0 and never replies

    let mut players: HashMap<PlayerId, PlayerServer> = [
        seated_player(DEALER, "dealer", 3000),
        seated_player(BIG_BLIND, "bb", 3000),
    ]
    .into_iter()
    .collect();

    let setup = HandSetup {
        seat_order: vec![DEALER, BIG_BLIND],
        small_blind: 5,
        big_blind: 10,
    };

    let mut requester = ScriptedRequester::new()
        .script(DEALER, vec![Some(5)]) // calls the big blind
        .script(BIG_BLIND, vec![None]); // deadline passes with no reply

    let result = run_hand(
        &fast_config(),
        &mut players,
        &setup,
        no_op_deck(),
        &mut requester,
        |_| {},
        |_| {},
        |_, _| {},
    )
    .await;

    assert!(result.ended_early);
    assert_eq!(players[&DEALER].player.money(), 3010);
    assert_eq!(players[&BIG_BLIND].player.money(), 2990);

    let bb_action = result
        .actions
        .iter()
        .find(|a| a.player_id == BIG_BLIND && a.street == holdem_engine::game::Street::Preflop && a.action_type == ActionType::Fold)
        .expect("big blind's timeout is recorded as a fold");
    assert!(bb_action.timed_out);
}
