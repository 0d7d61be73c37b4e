//! # Game Engine
//!
//! The single owner of the [`World`]. Every external stimulus arrives as
//! an [`Event`] and is handled to completion before the next one - the
//! transport tasks around this type only parse and forward.
//!
//! ## Event Flow
//!
//! - Telemetry line: update the wand's raw pose and buttons, run the
//!   calibration machine, flush immediately (wand motion should not wait
//!   out a tick).
//! - Viewer message: avatar pose sync, VR entry, wand claiming.
//! - Tick: advance the simulation, flush.
//!
//! No error in here is fatal; bad input is logged and dropped, and the
//! next update supersedes it.

use std::collections::HashMap;
use std::time::Instant;

use glam::Quat;
use rand::rngs::StdRng;
use rand::SeedableRng;

use phosphor_core::entity::EntityId;
use phosphor_core::properties::keys;
use phosphor_core::{
    calibration, simulation, EntityKind, HeightField, World, WorldError, MAX_CONTROLLERS,
};

use crate::config::ServerConfig;
use crate::messages::{ClientMessage, ControllerEntry, ServerMessage};
use crate::net::{ConnectionId, ConnectionTable, OutboundSender};
use crate::telemetry::{self, MoveUpdate, TelemetryError};

/// A hiccup in the telemetry stream must not register as a long button
/// hold; per-update deltas are clamped to this many seconds.
const MAX_TELEMETRY_DT: f32 = 0.25;

/// The particle RNG is seeded, not entropic: two runs of the same inputs
/// produce the same world.
const RNG_SEED: u64 = 0x0f05;

/// One external stimulus for the engine.
#[derive(Debug)]
pub enum Event {
    /// A raw line from the tracking daemon.
    Telemetry {
        /// The unparsed line.
        line: String,
    },
    /// A viewer connection opened.
    Connected {
        /// Connection handle.
        conn: ConnectionId,
        /// Peer address; doubles as the avatar id.
        addr: String,
        /// Outbound channel for this viewer.
        sender: OutboundSender,
    },
    /// A viewer connection closed.
    Disconnected {
        /// Connection handle.
        conn: ConnectionId,
    },
    /// A JSON line from a viewer.
    Message {
        /// Connection handle.
        conn: ConnectionId,
        /// The unparsed JSON text.
        text: String,
    },
    /// The fixed-interval timer fired.
    Tick,
}

/// The authoritative engine: world, viewers, and the handlers that bind
/// them.
pub struct GameEngine {
    world: World,
    connections: ConnectionTable,
    terrain: Box<dyn HeightField + Send>,
    rng: StdRng,
    config: ServerConfig,
    /// Per-controller arrival clock for button hold timing.
    last_seen: HashMap<u32, Instant>,
}

impl GameEngine {
    /// Creates an engine with an empty world.
    #[must_use]
    pub fn new(config: ServerConfig, terrain: Box<dyn HeightField + Send>) -> Self {
        Self {
            world: World::new(),
            connections: ConnectionTable::new(),
            terrain,
            rng: StdRng::seed_from_u64(RNG_SEED),
            config,
            last_seen: HashMap::new(),
        }
    }

    /// Read access to the world, mainly for tests and diagnostics.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for test setup.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Dispatches one event to completion.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Telemetry { line } => self.handle_telemetry(&line),
            Event::Connected { conn, addr, sender } => self.handle_connected(conn, addr, sender),
            Event::Disconnected { conn } => self.handle_disconnected(conn),
            Event::Message { conn, text } => self.handle_message(conn, &text),
            Event::Tick => self.handle_tick(),
        }
    }

    fn handle_telemetry(&mut self, line: &str) {
        let frame = match telemetry::parse_line(line) {
            Ok(frame) => frame,
            Err(TelemetryError::UnknownKind(kind)) => {
                tracing::debug!(%kind, "ignoring unknown telemetry message");
                return;
            }
            Err(err) => {
                tracing::warn!(%err, line, "dropping malformed telemetry line");
                return;
            }
        };

        let now = Instant::now();
        let dt = self
            .last_seen
            .insert(frame.controller, now)
            .map_or(0.0, |previous| {
                now.duration_since(previous).as_secs_f32().min(MAX_TELEMETRY_DT)
            });

        self.apply_move_update(frame, dt);
        // Wand motion goes out now, not on the next tick.
        self.flush_and_broadcast();
    }

    /// Applies one telemetry frame with an explicit button-hold delta.
    ///
    /// Split from [`Self::handle_telemetry`] so the hold clock can be
    /// driven deterministically.
    pub fn apply_move_update(&mut self, frame: MoveUpdate, dt: f32) {
        if frame.controller >= MAX_CONTROLLERS {
            tracing::warn!(
                controller = frame.controller,
                "telemetry for a slot outside the controller range"
            );
            return;
        }
        let id = EntityId::Slot(frame.controller);
        self.world.registry.get_or_create(id.clone(), EntityKind::Controller);

        // The carrying avatar's position feeds the composition.
        let parent = self
            .world
            .registry
            .get(&id)
            .and_then(|e| e.as_controller())
            .and_then(|c| c.player_id.clone())
            .and_then(|key| {
                self.world
                    .registry
                    .get(&EntityId::remote(key))
                    .map(|p| p.position)
            });

        if let Some(entity) = self.world.registry.get_mut(&id) {
            if let Some(controller) = entity.as_controller_mut() {
                if controller.color_value != frame.color_value {
                    controller.color_value = frame.color_value;
                    self.world.sync.mark(&id, &[keys::COLOR_VALUE]);
                }
                if controller.buttons.buttons != frame.buttons {
                    self.world.sync.mark(&id, &[keys::BUTTONS]);
                }
                controller.buttons.update(frame.buttons, dt);
                controller.trigger = frame.trigger;
                controller.pose.raw_position = frame.position;
                controller.pose.raw_orientation = frame.orientation;
            }
            entity.recompose(parent);
            self.world.sync.mark(&id, &[keys::POSITION, keys::QUATERNION]);
        }

        calibration::process_buttons(
            &mut self.world,
            frame.controller,
            &self.config.calibration,
            &self.config.simulation,
        );
    }

    fn handle_connected(&mut self, conn: ConnectionId, addr: String, sender: OutboundSender) {
        tracing::info!(conn = conn.0, %addr, "viewer connected");
        self.connections.insert(conn, addr, sender);
        // New viewers start from the current wand roster.
        let roster = self.controller_list();
        self.connections.send_to(conn, &encode(&roster));
    }

    fn handle_disconnected(&mut self, conn: ConnectionId) {
        let Some(addr) = self.connections.remove(conn) else {
            return;
        };
        tracing::info!(conn = conn.0, %addr, "viewer disconnected");
        if self.config.reap_on_disconnect {
            self.reap_player(&addr);
        }
    }

    /// Removes a disconnected viewer's avatar and frees its wand.
    ///
    /// The terminal `life` flush goes out while the entity still exists,
    /// so viewers see the removal before the id goes silent.
    fn reap_player(&mut self, addr: &str) {
        let player_id = EntityId::remote(addr);
        if self.world.registry.get(&player_id).is_none() {
            return;
        }

        let held: Vec<EntityId> = self
            .world
            .registry
            .iter()
            .filter(|(_, e)| {
                e.as_controller()
                    .is_some_and(|c| c.player_id.as_deref() == Some(addr))
            })
            .map(|(id, _)| id.clone())
            .collect();
        for controller_id in &held {
            if let Some(controller) = self
                .world
                .registry
                .get_mut(controller_id)
                .and_then(|e| e.as_controller_mut())
            {
                controller.player_id = None;
            }
            self.world.sync.mark(controller_id, &[keys::PLAYER_ID]);
        }

        if let Some(player) = self.world.registry.get_mut(&player_id) {
            player.life = 0.0;
        }
        self.world.sync.mark(&player_id, &[keys::LIFE]);
        self.flush_and_broadcast();
        self.world.registry.remove(&player_id);

        if !held.is_empty() {
            self.broadcast_controller_list();
        }
    }

    fn handle_message(&mut self, conn: ConnectionId, text: &str) {
        let Some(addr) = self.connections.addr(conn).map(str::to_owned) else {
            tracing::warn!(conn = conn.0, "message from an unknown connection");
            return;
        };
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%err, %addr, "dropping malformed viewer message");
                return;
            }
        };

        match message {
            ClientMessage::SyncPlayer { position, quaternion } => {
                let id = EntityId::remote(addr);
                let entity = self.world.registry.get_or_create(id.clone(), EntityKind::Player);
                if let Some(pose) = entity.pose_mut() {
                    pose.raw_position = position.into();
                    pose.raw_orientation = Quat::from_array(quaternion);
                }
                entity.recompose(None);
                self.world.sync.mark(&id, &[keys::POSITION, keys::QUATERNION]);
            }
            ClientMessage::EnterVr => {
                let id = EntityId::remote(addr.clone());
                let entity = self.world.registry.get_or_create(id, EntityKind::Player);
                if let Some(player) = entity.as_player_mut() {
                    player.vr_active = true;
                }
                let reply = ServerMessage::Init { player_id: addr };
                self.connections.send_to(conn, &encode(&reply));
            }
            ClientMessage::ControllerSelect { id } => {
                if let Err(err) = self.select_controller(&addr, id) {
                    tracing::warn!(%err, claimant = %addr, "controller_select refused");
                }
            }
        }
    }

    /// Assigns a wand to the avatar behind `addr`.
    ///
    /// Refused if the wand does not exist or a still-connected avatar
    /// holds it; prior state stays intact either way.
    fn select_controller(&mut self, addr: &str, slot: u32) -> Result<(), WorldError> {
        let controller_id = EntityId::Slot(slot);
        let Some(controller) = self
            .world
            .registry
            .get(&controller_id)
            .and_then(|e| e.as_controller())
        else {
            return Err(WorldError::NoSuchEntity(controller_id));
        };
        if let Some(owner) = &controller.player_id {
            if owner != addr && self.connections.is_addr_connected(owner) {
                return Err(WorldError::ControllerOwned {
                    controller: slot,
                    owner: owner.clone(),
                });
            }
        }

        if let Some(controller) = self
            .world
            .registry
            .get_mut(&controller_id)
            .and_then(|e| e.as_controller_mut())
        {
            controller.player_id = Some(addr.to_owned());
        }
        self.world.sync.mark(&controller_id, &[keys::PLAYER_ID]);
        tracing::info!(slot, player = %addr, "controller assigned");
        self.broadcast_controller_list();
        Ok(())
    }

    fn handle_tick(&mut self) {
        let dt = self.config.simulation.dt();
        simulation::step(
            &mut self.world,
            self.terrain.as_ref(),
            &mut self.rng,
            dt,
            &self.config.simulation,
        );
        self.flush_and_broadcast();
    }

    fn controller_list(&self) -> ServerMessage {
        let list = self
            .world
            .registry
            .iter()
            .filter_map(|(id, entity)| {
                let controller = entity.as_controller()?;
                let EntityId::Slot(slot) = id else {
                    return None;
                };
                Some(ControllerEntry {
                    id: *slot,
                    color_value: controller.color_value,
                    player_id: controller.player_id.clone(),
                })
            })
            .collect();
        ServerMessage::ControllerList { list }
    }

    fn broadcast_controller_list(&mut self) {
        let roster = self.controller_list();
        self.connections.broadcast(&encode(&roster));
    }

    fn flush_and_broadcast(&mut self) {
        let payload = self.world.flush_sync();
        if payload.is_empty() {
            return;
        }
        let message = ServerMessage::Sync { sync: payload };
        self.connections.broadcast(&encode(&message));
    }
}

fn encode(message: &ServerMessage) -> String {
    // ServerMessage serialization cannot fail: no non-string keys, no
    // non-finite floats originate here.
    serde_json::to_string(message).unwrap_or_else(|err| {
        tracing::error!(%err, "failed to encode server message");
        String::new()
    })
}
