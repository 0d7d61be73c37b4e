//! # PHOSPHOR Server - The Serial Shell
//!
//! Wraps [`phosphor_core`] in a runtime: wand telemetry on stdin, viewers
//! on line-framed JSON connections, a 50 Hz tick timer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PHOSPHOR SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  stdin telemetry ──┐                                        │
//! │  viewer sockets ───┼──► one event channel ──► GameEngine    │
//! │  50 Hz timer ──────┘        (serialized)        │           │
//! │                                                 ▼           │
//! │                                  World ──► diff broadcast   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one task owns the [`engine::GameEngine`]; every other task only
//! parses bytes and forwards [`engine::Event`]s. That single-writer shape
//! is what lets the core run lock-free.
//!
//! Connection handshakes (TLS, WebSocket upgrades) belong to a fronting
//! collaborator; this crate speaks newline-delimited JSON and nothing
//! else.

pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod net;
pub mod telemetry;

pub use config::ServerConfig;
pub use engine::{Event, GameEngine};
pub use error::ServerError;
pub use net::{run, ConnectionId, ConnectionTable, OutboundSender};
