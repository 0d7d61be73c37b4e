//! # Calibration State Machine
//!
//! Physical tracking drifts. Rather than dedicating controls to fixing
//! it, one wand drives everything through edge events and a tilt gesture:
//!
//! - START toggles the avatar's calibration mode.
//! - In calibration mode, SQUARE/CROSS nudge the rig-to-world scale
//!   (trigger held = coarse steps).
//! - SELECT recalibrates: a tap adjusts the avatar's drift (soft), a long
//!   hold adjusts the wand's own offsets (hard). Both share one
//!   threshold-banded geometric procedure - the wand's tilt selects the
//!   action.
//!
//! ## The Tilt Bands
//!
//! `dot` is the wand's raw forward axis against world up:
//!
//! ```text
//! |dot| <= 0.25   held level      -> yaw reset
//! dot   >= 0.75   pointed up      -> position reset
//! otherwise       ambiguous tilt  -> explicitly nothing
//! ```
//!
//! The dead zone between the bands is deliberate: it keeps a sloppy
//! gesture from firing the wrong reset.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::input::buttons;
use crate::pose::{yaw_of, UP};
use crate::properties::keys;
use crate::simulation::{self, SimConfig};
use crate::world::World;

/// Below this |dot| the wand counts as held level: yaw reset.
pub const YAW_BAND: f32 = 0.25;
/// Above this dot the wand counts as pointed up: position reset.
pub const POSITION_BAND: f32 = 0.75;

/// Tuning knobs for the calibration machine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seconds SELECT must be held to fire a hard recalibration.
    pub hold_threshold: f32,
    /// Scale nudge per SQUARE/CROSS press.
    pub scale_step: f32,
    /// Multiplier on the nudge while the trigger is held.
    pub trigger_factor: f32,
    /// How far in front of the avatar a position reset parks the wand.
    pub face_distance: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            hold_threshold: 1.0,
            scale_step: 0.01,
            trigger_factor: 5.0,
            face_distance: 0.15,
        }
    }
}

/// Runs the per-update button machine for one controller.
///
/// Expects the controller's [`crate::input::ButtonState`] to have been fed
/// this update's mask already. Controllers without an assigned avatar do
/// nothing - there is no one to calibrate or act for.
pub fn process_buttons(
    world: &mut World,
    controller_slot: u32,
    calib: &CalibrationConfig,
    sim: &SimConfig,
) {
    let controller_id = EntityId::Slot(controller_slot);
    let Some(entity) = world.registry.get(&controller_id) else {
        return;
    };
    let Some(controller) = entity.as_controller() else {
        return;
    };
    let state = controller.buttons;
    let guard = controller.hard_reset_guard;
    let color = controller.color_value;
    let muzzle = entity.position;
    let aim = entity.orientation * Vec3::NEG_Z;
    let Some(player_key) = controller.player_id.clone() else {
        return;
    };
    let player_id = EntityId::remote(player_key);

    // Mode toggle and movement flag live on the avatar.
    let calibrating = {
        let Some(avatar) = world.registry.get_mut(&player_id) else {
            tracing::debug!(%player_id, "buttons for a controller whose avatar is gone");
            return;
        };
        let Some(player) = avatar.as_player_mut() else {
            return;
        };
        if state.just_pressed(buttons::START) {
            player.calibration_mode = !player.calibration_mode;
            world.sync.mark(&player_id, &[keys::CALIBRATION_MODE]);
        }
        let moving = state.held(buttons::MOVE);
        if player.is_moving != moving {
            player.is_moving = moving;
            world.sync.mark(&player_id, &[keys::IS_MOVING]);
        }
        player.calibration_mode
    };

    if calibrating {
        let mut delta = if state.just_pressed(buttons::SQUARE) {
            calib.scale_step
        } else if state.just_pressed(buttons::CROSS) {
            -calib.scale_step
        } else {
            0.0
        };
        if state.held(buttons::TRIGGER) {
            delta *= calib.trigger_factor;
        }
        if delta != 0.0 {
            let parent = world.registry.get(&player_id).map(|p| p.position);
            if let Some(entity) = world.registry.get_mut(&controller_id) {
                if let Some(pose) = entity.pose_mut() {
                    pose.scale += delta;
                }
                entity.recompose(parent);
                world.sync.mark(&controller_id, &[keys::SCALE]);
            }
        }
    } else {
        if state.just_pressed(buttons::TRIGGER) {
            simulation::spawn_projectile(world, muzzle, aim, color);
        }
        if state.just_pressed(buttons::CIRCLE) {
            if let Some(avatar) = world.registry.get(&player_id) {
                let heading = Quat::from_rotation_y(yaw_of(avatar.orientation)) * Vec3::NEG_Z;
                let spawn_at = avatar.position + heading * sim.enemy_spawn_distance;
                simulation::spawn_enemy(world, spawn_at);
            }
        }
    }

    // SELECT recalibration works in either mode.
    if state.just_pressed(buttons::SELECT) {
        recalibrate(world, controller_slot, false, calib);
    }
    if state.time_pressed(buttons::SELECT) > calib.hold_threshold && !guard {
        recalibrate(world, controller_slot, true, calib);
        set_guard(world, &controller_id, true);
    }
    if state.just_released(buttons::SELECT) {
        set_guard(world, &controller_id, false);
    }
}

fn set_guard(world: &mut World, controller_id: &EntityId, value: bool) {
    if let Some(controller) = world
        .registry
        .get_mut(controller_id)
        .and_then(|e| e.as_controller_mut())
    {
        controller.hard_reset_guard = value;
    }
}

/// The threshold-banded recalibration procedure.
///
/// `hard` selects the target of a yaw reset: the avatar for a soft reset,
/// the controller itself for a hard one. Position resets always move the
/// controller. Ambiguous tilts do nothing by design.
pub fn recalibrate(world: &mut World, controller_slot: u32, hard: bool, calib: &CalibrationConfig) {
    let controller_id = EntityId::Slot(controller_slot);
    let Some(entity) = world.registry.get(&controller_id) else {
        return;
    };
    let Some(controller) = entity.as_controller() else {
        return;
    };
    let Some(player_key) = controller.player_id.clone() else {
        return;
    };
    let player_id = EntityId::remote(player_key);
    let dot = controller.pose.raw_forward().dot(UP);

    if dot.abs() <= YAW_BAND {
        // Held level: cancel the target's yaw drift so its raw heading
        // reads as forward again.
        let (target_id, parent) = if hard {
            let parent = world.registry.get(&player_id).map(|p| p.position);
            (controller_id, parent)
        } else {
            (player_id, None)
        };
        if let Some(target) = world.registry.get_mut(&target_id) {
            if let Some(pose) = target.pose_mut() {
                pose.yaw_offset = -yaw_of(pose.raw_orientation);
            }
            target.recompose(parent);
            world.sync.mark(&target_id, &[keys::QUATERNION, keys::YAW_OFFSET]);
        }
    } else if dot >= POSITION_BAND {
        // Pointed up: park the wand just in front of the avatar's face.
        let Some(avatar) = world.registry.get(&player_id) else {
            return;
        };
        let heading = Quat::from_rotation_y(yaw_of(avatar.orientation)) * Vec3::NEG_Z;
        let target_point = avatar.position + heading * calib.face_distance;
        let parent = avatar.position;
        if let Some(entity) = world.registry.get_mut(&controller_id) {
            if let Some(pose) = entity.pose_mut() {
                let scaled_raw = pose.raw_position * pose.scale;
                pose.offset_position = target_point - scaled_raw - parent;
            }
            entity.recompose(Some(parent));
            world
                .sync
                .mark(&controller_id, &[keys::POSITION, keys::OFFSET_POSITION]);
        }
    }
    // 0.25 < |dot| < 0.75: ambiguous tilt, explicitly nothing.
}
