//! # PHOSPHOR Core - The Authoritative World
//!
//! Canonical game-object state for a tracked-wand VR playground.
//!
//! ## Architecture
//!
//! One process owns every entity. Telemetry from physical wands and JSON
//! messages from viewers mutate the world through the components in this
//! crate; a fixed-tick simulation advances ephemeral objects; and every
//! change is recorded as a dirty property key so the replication cache can
//! send viewers a minimal diff instead of a snapshot.
//!
//! - **Pose composition** ([`pose`]): raw sensor reading + calibration
//!   offsets -> renderable transform. Pure math.
//! - **Entity model** ([`entity`]): tagged-union identifiers, per-kind
//!   bodies, create-on-lookup defaults.
//! - **Registry** ([`registry`]): the single id -> entity map.
//! - **Replication** ([`sync`], [`properties`]): dirty-key cache, flush-time
//!   value read-through, per-kind property dispatch.
//! - **Input** ([`input`], [`calibration`]): bitmask edge detection, hold
//!   timers, and the threshold-banded recalibration procedure.
//! - **Simulation** ([`simulation`]): 50 Hz integration, collision, expiry,
//!   terrain-following avatar movement.
//!
//! ## Concurrency Model
//!
//! None. Every function here takes `&mut World` and runs to completion; the
//! server shell serializes telemetry, viewer messages, and ticks onto one
//! logical thread. The core never blocks and never spawns.

pub mod calibration;
pub mod entity;
pub mod error;
pub mod input;
pub mod pose;
pub mod properties;
pub mod registry;
pub mod simulation;
pub mod sync;
pub mod world;

pub use calibration::CalibrationConfig;
pub use entity::{Entity, EntityBody, EntityId, EntityKind};
pub use error::WorldError;
pub use input::ButtonState;
pub use pose::TrackedPose;
pub use registry::Registry;
pub use simulation::{FlatTerrain, HeightField, SimConfig};
pub use sync::SyncCache;
pub use world::World;

/// Simulation tick rate in Hz.
///
/// At 50 Hz each tick is 20 ms - wand telemetry arrives faster than this,
/// so the tick only has to advance what telemetry does not drive.
pub const TICK_RATE: u32 = 50;

/// Number of reserved trackable-controller slots.
///
/// The tracking rig addresses wands by array index; ids below this bound
/// always mean a controller.
pub const MAX_CONTROLLERS: u32 = 10;

/// First identifier handed out to ephemeral entities.
///
/// Seeded well above [`MAX_CONTROLLERS`] so the two slot-addressed id
/// spaces can never collide.
pub const FIRST_EPHEMERAL_ID: u32 = 1000;
