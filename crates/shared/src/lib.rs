//! Wire protocol shared between the FlipFlop server and its clients.
//!
//! Everything on the socket is a JSON envelope ([`protocol::IncomingMessage`]
//! / [`protocol::OutgoingMessage`]) carrying a typed payload. Error codes
//! ([`error::AppError`]) are part of the protocol: clients match on the
//! stable snake_case strings.

pub mod error;
pub mod protocol;

pub use error::{AppError, ErrorPayload};
pub use protocol::{
    ChatPayload, CreateRoomPayload, GameMode, GameType, IncomingMessage, MsgType, OutgoingMessage,
};
