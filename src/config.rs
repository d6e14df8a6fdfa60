//! Crate-wide configuration, assembled from environment variables with
//! typed defaults. Every knob named in spec §6 lives here; nothing reaches
//! into `std::env` outside this module and `db::config`.

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs_or(key: &str, default: f64) -> Duration {
    let secs: f64 = env_or(key, default);
    Duration::from_secs_f64(secs)
}

/// Top-level engine configuration. Constructed once at process start and
/// threaded through the server/room/bot layers as an `Arc<Config>` rather
/// than read from ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chips a fresh wallet (or a daily reset) is funded with.
    pub init_money: i64,
    /// Seconds a human player is given to act before a forced fold.
    pub bet_timeout: Duration,
    /// Extra grace added on top of `bet_timeout` before a turn expires.
    pub timeout_tolerance: Duration,
    /// Pause after each community-card reveal.
    pub wait_after_street: Duration,
    /// Reconnection grace period after a failed ping.
    pub ping_grace: Duration,
    pub small_blind: i64,
    pub big_blind: i64,
    pub room_size: usize,
    /// Base URL of the external solver HTTP bot brain, e.g. `http://solver:8080`.
    pub bot_decision_url: Option<String>,
    pub bot_decision_timeout: Duration,
    /// Whether a raise must meet the previous raise increment (strict,
    /// standard no-limit rule) or merely the big blind (looser legacy
    /// rule). See DESIGN.md for the Open Question this resolves.
    pub strict_raise_increment: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            init_money: env_or("INIT_MONEY", 3000),
            bet_timeout: env_secs_or("BET_TIMEOUT", 30.0),
            timeout_tolerance: env_secs_or("TIMEOUT_TOLERANCE", 2.0),
            wait_after_street: env_secs_or("WAIT_AFTER_FLOP_TURN_RIVER", 2.0),
            ping_grace: env_secs_or("PING_GRACE", 3.0),
            small_blind: env_or("SMALL_BLIND", 5),
            big_blind: env_or("BIG_BLIND", 10),
            room_size: env_or("ROOM_SIZE", 10),
            bot_decision_url: env::var("BOT_DECISION_URL").ok(),
            bot_decision_timeout: env_secs_or("BOT_DECISION_TIMEOUT", 1.2),
            strict_raise_increment: env_or("STRICT_RAISE_INCREMENT", true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            init_money: 3000,
            bet_timeout: Duration::from_secs(30),
            timeout_tolerance: Duration::from_secs(2),
            wait_after_street: Duration::from_secs(2),
            ping_grace: Duration::from_secs(3),
            small_blind: 5,
            big_blind: 10,
            room_size: 10,
            bot_decision_url: None,
            bot_decision_timeout: Duration::from_millis(1200),
            strict_raise_increment: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_6() {
        let c = Config::default();
        assert_eq!(c.init_money, 3000);
        assert_eq!(c.bet_timeout, Duration::from_secs(30));
        assert_eq!(c.timeout_tolerance, Duration::from_secs(2));
        assert_eq!(c.wait_after_street, Duration::from_secs(2));
        assert_eq!(c.ping_grace, Duration::from_secs(3));
        assert_eq!(c.big_blind, 10);
        assert_eq!(c.small_blind, 5);
        assert_eq!(c.room_size, 10);
        assert_eq!(c.bot_decision_timeout, Duration::from_millis(1200));
    }
}
