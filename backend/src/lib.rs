//! FlipFlop game server backend.
//!
//! The [`ws`] module owns connections and the room directory, [`room`] the
//! per-room state machine and the AI turn orchestration, [`api`] the HTTP
//! surface. Game rules live in the `flipflop_engine` crate and the wire
//! protocol in `shared`.

pub mod api;
pub mod config;
pub mod room;
pub mod ws;
