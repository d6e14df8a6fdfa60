//! # Holdem Engine
//!
//! Backend game engine for a multi-room, multi-table Texas Hold'em server.
//! This crate owns the authoritative game state: the lobby/room lifecycle,
//! the hand state machine, the player/channel model with reconnection and
//! timeouts, the bet handler, the bot decision pipeline, and the
//! persistence contracts that record hands, actions, and statistics.
//!
//! What it does *not* own: the HTTP/WebSocket gateway, login/session
//! cookies, templates, password hashing for login, or the external
//! "solver" HTTP bot brain's own implementation (only the client side of
//! that contract lives here, in [`bot::remote`]).
//!
//! ## Core modules
//!
//! - [`card`] / [`score`]: the deck and the hand evaluator.
//! - [`channel`] / [`player`]: transport and identity.
//! - [`bet`]: turn scheduling, raise legality, pot construction.
//! - [`game`]: the per-hand state machine ([`game::engine::run_hand`]).
//! - [`room`]: seat management, reconnection, the hand loop, bot control.
//! - [`server`]: lobby intake and the room registry.
//! - [`bot`]: decision engines and the bot pseudo-channel.
//! - [`net`]: the wire protocol.
//! - [`db`]: persistence (repositories over a `sqlx::PgPool`).
//! - [`config`]: environment-derived configuration.

pub mod bet;
pub mod bot;
pub mod card;
pub mod channel;
pub mod config;
pub mod db;
pub mod game;
pub mod net;
pub mod player;
pub mod room;
pub mod score;
pub mod server;

pub use config::Config;
pub use game::{GameError, GameResult};
pub use player::{Player, PlayerServer};
pub use room::{GameRoom, RoomError, RoomId};
pub use server::{GameServer, ServerError};
