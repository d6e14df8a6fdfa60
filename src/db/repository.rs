//! Repository traits over the persisted schema (spec §6), one per
//! aggregate, each with a `sqlx::PgPool`-backed implementation and an
//! in-memory `mock` behind `#[cfg(test)]` — the shape of the teacher's
//! `UserRepository`/`PgUserRepository`/`mock::MockUserRepository` trio.
//!
//! Every write here is exactly the statement the original
//! `poker/db_utils/*.py` helpers issue (see DESIGN.md); the async_trait
//! seam exists so `room`/`bot` code depends on an interface, never a bare
//! pool, per spec §4.7's "transactional write-through" framing.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db::{PersistenceError, PersistenceResult};
use crate::game::Street;
use crate::player::PlayerId;

pub type HandId = i64;
pub type TableId = i64;

/// One seated player's starting record for `add_hand_player` (spec §4.7
/// step 2).
#[derive(Clone, Debug)]
pub struct NewHandPlayer {
    pub player_id: PlayerId,
    pub seat_no: i32,
    pub starting_stack: i64,
    pub position_name: &'static str,
}

/// Per-player hand-end counters folded into `player_lifetime_stats` (spec
/// §4.7 step 5; field names match `game::HandStats` plus the settlement
/// deltas the in-flight counters alone can't supply).
#[derive(Clone, Copy, Debug, Default)]
pub struct LifetimeStatsDelta {
    pub hands_played: i64,
    pub net_chips: i64,
    pub vpip: i64,
    pub pfr: i64,
    pub threebet: i64,
    pub agg_bets: i64,
    pub agg_calls: i64,
    pub wtsd: i64,
    pub wsd: i64,
    pub net_bb: f64,
}

/// `hands` / `hand_players` / `hand_actions` (spec §4.7 steps 1-5).
#[async_trait]
pub trait HandRepository: Send + Sync {
    async fn get_or_create_table(&self, name: &str, max_seats: i32) -> PersistenceResult<TableId>;

    async fn create_hand(
        &self,
        table_id: TableId,
        small_blind: i64,
        big_blind: i64,
    ) -> PersistenceResult<HandId>;

    async fn add_hand_player(&self, hand_id: HandId, player: &NewHandPlayer) -> PersistenceResult<()>;

    /// Records hole cards dealt (`is_winner=false`, step 3) or the final
    /// settlement (`ending_stack`/`is_winner`, step 5). `hole_cards` is
    /// `None` on the settlement call, which leaves the column untouched —
    /// matching `update_hand_player_result`'s dynamic-SQL behavior in the
    /// original source.
    async fn update_hand_player_result(
        &self,
        hand_id: HandId,
        player_id: PlayerId,
        ending_stack: i64,
        is_winner: bool,
        hole_cards: Option<&str>,
    ) -> PersistenceResult<()>;

    async fn add_hand_action(
        &self,
        hand_id: HandId,
        player_id: PlayerId,
        street: Street,
        action_num: i32,
        action_type: &str,
        amount: i64,
        pot_before: i64,
    ) -> PersistenceResult<()>;

    async fn finish_hand(
        &self,
        hand_id: HandId,
        board_cards_json: &str,
        total_pot: i64,
    ) -> PersistenceResult<()>;
}

/// `wallet` / `chip_transactions` (spec §4.7 step 6, §4.8).
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn update_player_wallet(&self, player_id: PlayerId, chips: i64) -> PersistenceResult<()>;

    /// Increments `wallet.chips` and records a `chip_transactions` row of
    /// type `auto_topup`, atomically (spec §4.3 "Auto-topup").
    async fn auto_topup_chips(
        &self,
        player_id: PlayerId,
        amount: i64,
        hand_id: Option<HandId>,
    ) -> PersistenceResult<()>;

    /// Resets `wallet.chips` to `init_money` if `last_reset_date` isn't
    /// today, recording a `daily_reset` transaction for the delta (spec
    /// §4.8). Returns the wallet's current chip count either way.
    async fn check_and_reset_daily_chips(
        &self,
        player_id: PlayerId,
        init_money: i64,
    ) -> PersistenceResult<i64>;
}

/// `player_daily_stats` / `player_lifetime_stats` (spec §4.7 step 5).
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn update_daily_stats(
        &self,
        player_id: PlayerId,
        hands_played: i64,
        net_chips: i64,
    ) -> PersistenceResult<()>;

    async fn update_lifetime_stats(
        &self,
        player_id: PlayerId,
        delta: LifetimeStatsDelta,
    ) -> PersistenceResult<()>;
}

/// `api_keys` (spec §4.6: the solver base URL can be DB-stored under the
/// `solver` service name, overriding the `BOT_DECISION_URL` env var).
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn get_api_key(&self, service_name: &str) -> PersistenceResult<Option<String>>;
}

pub struct PgHandRepository {
    pool: PgPool,
}

impl PgHandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HandRepository for PgHandRepository {
    async fn get_or_create_table(&self, name: &str, max_seats: i32) -> PersistenceResult<TableId> {
        if let Some(row) = sqlx::query("SELECT id FROM poker_tables WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(row.get("id"));
        }
        let row = sqlx::query(
            "INSERT INTO poker_tables (name, max_seats) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(max_seats)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }

    async fn create_hand(
        &self,
        table_id: TableId,
        small_blind: i64,
        big_blind: i64,
    ) -> PersistenceResult<HandId> {
        let row = sqlx::query(
            "INSERT INTO hands (table_id, small_blind, big_blind, started_at)
             VALUES ($1, $2, $3, NOW()) RETURNING id",
        )
        .bind(table_id)
        .bind(small_blind)
        .bind(big_blind)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }

    async fn add_hand_player(&self, hand_id: HandId, player: &NewHandPlayer) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO hand_players
                 (hand_id, player_id, seat_no, starting_stack, ending_stack, position_name, is_winner)
             VALUES ($1, $2, $3, $4, $4, $5, FALSE)",
        )
        .bind(hand_id)
        .bind(player.player_id)
        .bind(player.seat_no)
        .bind(player.starting_stack)
        .bind(player.position_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_hand_player_result(
        &self,
        hand_id: HandId,
        player_id: PlayerId,
        ending_stack: i64,
        is_winner: bool,
        hole_cards: Option<&str>,
    ) -> PersistenceResult<()> {
        match hole_cards {
            Some(cards) => {
                sqlx::query(
                    "UPDATE hand_players
                     SET ending_stack = $1, is_winner = $2, hole_cards = $3
                     WHERE hand_id = $4 AND player_id = $5",
                )
                .bind(ending_stack)
                .bind(is_winner)
                .bind(cards)
                .bind(hand_id)
                .bind(player_id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE hand_players
                     SET ending_stack = $1, is_winner = $2
                     WHERE hand_id = $3 AND player_id = $4",
                )
                .bind(ending_stack)
                .bind(is_winner)
                .bind(hand_id)
                .bind(player_id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn add_hand_action(
        &self,
        hand_id: HandId,
        player_id: PlayerId,
        street: Street,
        action_num: i32,
        action_type: &str,
        amount: i64,
        pot_before: i64,
    ) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO hand_actions
                 (hand_id, player_id, street, action_num, action_type, amount, pot_before)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(hand_id)
        .bind(player_id)
        .bind(street.as_db_i16())
        .bind(action_num)
        .bind(action_type)
        .bind(amount)
        .bind(pot_before)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_hand(
        &self,
        hand_id: HandId,
        board_cards_json: &str,
        total_pot: i64,
    ) -> PersistenceResult<()> {
        sqlx::query(
            "UPDATE hands SET ended_at = NOW(), board_cards = $1, total_pot = $2 WHERE id = $3",
        )
        .bind(board_cards_json)
        .bind(total_pot)
        .bind(hand_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn update_player_wallet(&self, player_id: PlayerId, chips: i64) -> PersistenceResult<()> {
        sqlx::query("UPDATE wallet SET chips = $1, updated_at = NOW() WHERE player_id = $2")
            .bind(chips)
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn auto_topup_chips(
        &self,
        player_id: PlayerId,
        amount: i64,
        hand_id: Option<HandId>,
    ) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE wallet SET chips = chips + $1, updated_at = NOW() WHERE player_id = $2")
            .bind(amount)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO chip_transactions (player_id, tx_type, amount, hand_id)
             VALUES ($1, 'auto_topup', $2, $3)",
        )
        .bind(player_id)
        .bind(amount)
        .bind(hand_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn check_and_reset_daily_chips(
        &self,
        player_id: PlayerId,
        init_money: i64,
    ) -> PersistenceResult<i64> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT chips, last_reset_date FROM wallet WHERE player_id = $1")
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            sqlx::query(
                "INSERT INTO wallet (player_id, chips, last_reset_date) VALUES ($1, $2, CURRENT_DATE)",
            )
            .bind(player_id)
            .bind(init_money)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(init_money);
        };

        let current_chips: i64 = row.get("chips");
        let last_reset_date: chrono::NaiveDate = row.get("last_reset_date");
        let today = chrono::Local::now().date_naive();

        if last_reset_date != today {
            let diff = init_money - current_chips;
            sqlx::query(
                "UPDATE wallet SET chips = $1, last_reset_date = $2, updated_at = NOW()
                 WHERE player_id = $3",
            )
            .bind(init_money)
            .bind(today)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "INSERT INTO chip_transactions (player_id, tx_type, amount, note)
                 VALUES ($1, 'daily_reset', $2, $3)",
            )
            .bind(player_id)
            .bind(diff)
            .bind(format!("Daily reset from {current_chips} to {init_money}"))
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(init_money)
        } else {
            tx.commit().await?;
            Ok(current_chips)
        }
    }
}

pub struct PgStatsRepository {
    pool: PgPool,
}

impl PgStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepository for PgStatsRepository {
    async fn update_daily_stats(
        &self,
        player_id: PlayerId,
        hands_played: i64,
        net_chips: i64,
    ) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO player_daily_stats (stat_date, player_id, hands_played, net_chips)
             VALUES (CURRENT_DATE, $1, $2, $3)
             ON CONFLICT (stat_date, player_id) DO UPDATE
                SET hands_played = player_daily_stats.hands_played + excluded.hands_played,
                    net_chips    = player_daily_stats.net_chips + excluded.net_chips",
        )
        .bind(player_id)
        .bind(hands_played)
        .bind(net_chips)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_lifetime_stats(
        &self,
        player_id: PlayerId,
        delta: LifetimeStatsDelta,
    ) -> PersistenceResult<()> {
        sqlx::query("INSERT INTO player_lifetime_stats (player_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "UPDATE player_lifetime_stats
             SET hands_played    = hands_played + $1,
                 net_chips       = net_chips + $2,
                 vpip_hands      = vpip_hands + $3,
                 pfr_hands       = pfr_hands + $4,
                 threebet_hands  = threebet_hands + $5,
                 agg_bets_raises = agg_bets_raises + $6,
                 agg_calls       = agg_calls + $7,
                 wtsd_hands      = wtsd_hands + $8,
                 wsd_hands       = wsd_hands + $9,
                 net_bb          = net_bb + $10,
                 updated_at      = NOW()
             WHERE player_id = $11",
        )
        .bind(delta.hands_played)
        .bind(delta.net_chips)
        .bind(delta.vpip)
        .bind(delta.pfr)
        .bind(delta.threebet)
        .bind(delta.agg_bets)
        .bind(delta.agg_calls)
        .bind(delta.wtsd)
        .bind(delta.wsd)
        .bind(delta.net_bb)
        .bind(player_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgApiKeyRepository {
    pool: PgPool,
}

impl PgApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PgApiKeyRepository {
    async fn get_api_key(&self, service_name: &str) -> PersistenceResult<Option<String>> {
        let row = sqlx::query("SELECT api_key FROM api_keys WHERE service_name = $1")
            .bind(service_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("api_key")))
    }
}
