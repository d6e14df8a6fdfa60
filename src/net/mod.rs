//! Wire protocol types exchanged with the gateway, the external bot brain,
//! and across the broker-backed channels (spec §6). Transport itself lives
//! in [`crate::channel`].

pub mod messages;

pub use messages::{
    BetRequestPayload, ClientMessage, ConnectAck, LobbyRequest, PlayerDto, RoomControlRequest,
    ServerEvent,
};
