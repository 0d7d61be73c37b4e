//! # Replicated Property Dispatch
//!
//! The wire protocol addresses entity state by property name. This module
//! is the explicit, per-kind table of those properties: [`read`] extracts
//! the current value for a flush, [`apply`] is the receiving side -
//! resolving by kind tag and name, never by walking an inheritance chain.
//!
//! The server reads; viewers apply. [`apply`] lives here anyway as the
//! reference implementation of the protocol and is exercised by the
//! replication tests.
//!
//! ## Wire Shapes
//!
//! Positions and directions travel as `{x, y, z}` objects, quaternions as
//! `[x, y, z, w]` arrays, everything else as plain JSON scalars.

use glam::{Quat, Vec3};
use serde_json::{json, Value};

use crate::entity::{Entity, EntityBody};
use crate::error::WorldError;

/// Property names as they appear on the wire.
pub mod keys {
    /// Derived in-game position, all kinds.
    pub const POSITION: &str = "position";
    /// Derived in-game orientation, all kinds.
    pub const QUATERNION: &str = "quaternion";
    /// Remaining life, all kinds; `<= 0` means the entity is gone.
    pub const LIFE: &str = "life";
    /// Avatar calibration mode flag.
    pub const CALIBRATION_MODE: &str = "calibrationMode";
    /// Avatar movement flag.
    pub const IS_MOVING: &str = "isMoving";
    /// Yaw drift correction, avatars and controllers.
    pub const YAW_OFFSET: &str = "yawOffset";
    /// Position calibration offset, avatars and controllers.
    pub const OFFSET_POSITION: &str = "offsetPosition";
    /// Rig-to-world position scale, controllers.
    pub const SCALE: &str = "scale";
    /// LED / tint color, controllers and ephemerals.
    pub const COLOR_VALUE: &str = "colorValue";
    /// Current button bitmask, controllers.
    pub const BUTTONS: &str = "buttons";
    /// Holding avatar's id, controllers.
    pub const PLAYER_ID: &str = "playerId";
    /// Travel direction, projectiles and particles.
    pub const DIRECTION: &str = "direction";
    /// Travel speed, projectiles and particles.
    pub const SPEED: &str = "speed";
    /// Model asset path, doodads.
    pub const MODEL_PATH: &str = "modelPath";
    /// Model scale, doodads.
    pub const MODEL_SCALE: &str = "modelScale";
}

/// Encodes a vector in wire shape.
#[must_use]
pub fn vec3_to_value(v: Vec3) -> Value {
    json!({ "x": v.x, "y": v.y, "z": v.z })
}

/// Decodes a wire-shaped vector.
#[must_use]
pub fn vec3_from_value(value: &Value) -> Option<Vec3> {
    Some(Vec3::new(
        value.get("x")?.as_f64()? as f32,
        value.get("y")?.as_f64()? as f32,
        value.get("z")?.as_f64()? as f32,
    ))
}

/// Encodes a quaternion in wire shape.
#[must_use]
pub fn quat_to_value(q: Quat) -> Value {
    json!([q.x, q.y, q.z, q.w])
}

/// Decodes a wire-shaped quaternion.
#[must_use]
pub fn quat_from_value(value: &Value) -> Option<Quat> {
    let arr = value.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut parts = [0.0f32; 4];
    for (slot, v) in parts.iter_mut().zip(arr) {
        *slot = v.as_f64()? as f32;
    }
    Some(Quat::from_xyzw(parts[0], parts[1], parts[2], parts[3]))
}

fn f32_from(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

/// Reads the current value of a replicated property.
///
/// `None` means the property does not exist on this entity's kind - the
/// flush treats that as a marking bug and drops the key.
#[must_use]
pub fn read(entity: &Entity, key: &str) -> Option<Value> {
    // Shared header first, then the kind table.
    match key {
        keys::POSITION => return Some(vec3_to_value(entity.position)),
        keys::QUATERNION => return Some(quat_to_value(entity.orientation)),
        keys::LIFE => return Some(json!(entity.life)),
        _ => {}
    }
    match &entity.body {
        EntityBody::Player(p) => match key {
            keys::CALIBRATION_MODE => Some(json!(p.calibration_mode)),
            keys::IS_MOVING => Some(json!(p.is_moving)),
            keys::YAW_OFFSET => Some(json!(p.pose.yaw_offset)),
            keys::OFFSET_POSITION => Some(vec3_to_value(p.pose.offset_position)),
            _ => None,
        },
        EntityBody::Controller(c) => match key {
            keys::SCALE => Some(json!(c.pose.scale)),
            keys::COLOR_VALUE => Some(json!(c.color_value)),
            keys::BUTTONS => Some(json!(c.buttons.buttons)),
            keys::PLAYER_ID => Some(c.player_id.as_ref().map_or(Value::Null, |p| json!(p))),
            keys::YAW_OFFSET => Some(json!(c.pose.yaw_offset)),
            keys::OFFSET_POSITION => Some(vec3_to_value(c.pose.offset_position)),
            _ => None,
        },
        EntityBody::Projectile(b) | EntityBody::Particle(b) => match key {
            keys::DIRECTION => Some(vec3_to_value(b.direction)),
            keys::SPEED => Some(json!(b.speed)),
            keys::COLOR_VALUE => Some(json!(b.color_value)),
            _ => None,
        },
        EntityBody::Enemy => None,
        EntityBody::Doodad(d) => match key {
            keys::MODEL_PATH => Some(json!(d.model_path)),
            keys::MODEL_SCALE => Some(json!(d.model_scale)),
            _ => None,
        },
    }
}

/// Applies a replicated property to an entity - the receiving side of the
/// protocol.
///
/// # Errors
///
/// [`WorldError::BadProperty`] if the key does not exist on this kind,
/// [`WorldError::BadValue`] if the value has the wrong shape. Neither
/// mutates the entity.
pub fn apply(entity: &mut Entity, key: &str, value: &Value) -> Result<(), WorldError> {
    let bad_value = || WorldError::BadValue { key: key.to_owned() };

    match key {
        keys::POSITION => {
            entity.position = vec3_from_value(value).ok_or_else(bad_value)?;
            return Ok(());
        }
        keys::QUATERNION => {
            entity.orientation = quat_from_value(value).ok_or_else(bad_value)?;
            return Ok(());
        }
        keys::LIFE => {
            entity.life = f32_from(value).ok_or_else(bad_value)?;
            return Ok(());
        }
        _ => {}
    }

    let kind = entity.kind().tag();
    match &mut entity.body {
        EntityBody::Player(p) => match key {
            keys::CALIBRATION_MODE => {
                p.calibration_mode = value.as_bool().ok_or_else(bad_value)?;
            }
            keys::IS_MOVING => p.is_moving = value.as_bool().ok_or_else(bad_value)?,
            keys::YAW_OFFSET => p.pose.yaw_offset = f32_from(value).ok_or_else(bad_value)?,
            keys::OFFSET_POSITION => {
                p.pose.offset_position = vec3_from_value(value).ok_or_else(bad_value)?;
            }
            _ => {
                return Err(WorldError::BadProperty { kind, key: key.to_owned() });
            }
        },
        EntityBody::Controller(c) => match key {
            keys::SCALE => c.pose.scale = f32_from(value).ok_or_else(bad_value)?,
            keys::COLOR_VALUE => {
                c.color_value = value.as_u64().ok_or_else(bad_value)? as u32;
            }
            keys::BUTTONS => {
                let mask = value.as_u64().ok_or_else(bad_value)? as u32;
                c.buttons.update(mask, 0.0);
            }
            keys::PLAYER_ID => {
                c.player_id = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    _ => return Err(bad_value()),
                };
            }
            keys::YAW_OFFSET => c.pose.yaw_offset = f32_from(value).ok_or_else(bad_value)?,
            keys::OFFSET_POSITION => {
                c.pose.offset_position = vec3_from_value(value).ok_or_else(bad_value)?;
            }
            _ => {
                return Err(WorldError::BadProperty { kind, key: key.to_owned() });
            }
        },
        EntityBody::Projectile(b) | EntityBody::Particle(b) => match key {
            keys::DIRECTION => b.direction = vec3_from_value(value).ok_or_else(bad_value)?,
            keys::SPEED => b.speed = f32_from(value).ok_or_else(bad_value)?,
            keys::COLOR_VALUE => {
                b.color_value = value.as_u64().ok_or_else(bad_value)? as u32;
            }
            _ => {
                return Err(WorldError::BadProperty { kind, key: key.to_owned() });
            }
        },
        EntityBody::Enemy => {
            return Err(WorldError::BadProperty { kind, key: key.to_owned() });
        }
        EntityBody::Doodad(d) => match key {
            keys::MODEL_PATH => {
                d.model_path = value.as_str().ok_or_else(bad_value)?.to_owned();
            }
            keys::MODEL_SCALE => d.model_scale = f32_from(value).ok_or_else(bad_value)?,
            _ => {
                return Err(WorldError::BadProperty { kind, key: key.to_owned() });
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind};

    #[test]
    fn test_read_apply_roundtrip() {
        let mut source = Entity::new(EntityId::remote("a"), EntityKind::Player);
        source.position = Vec3::new(1.0, 2.0, 3.0);
        source.as_player_mut().unwrap().calibration_mode = true;
        source.as_player_mut().unwrap().pose.yaw_offset = -0.5;

        let mut mirror = Entity::new(EntityId::remote("a"), EntityKind::Player);
        for key in [keys::POSITION, keys::CALIBRATION_MODE, keys::YAW_OFFSET] {
            let value = read(&source, key).unwrap();
            apply(&mut mirror, key, &value).unwrap();
        }
        assert!((mirror.position - source.position).length() < 1e-6);
        assert!(mirror.as_player().unwrap().calibration_mode);
        assert!((mirror.as_player().unwrap().pose.yaw_offset + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_quaternion_wire_shape() {
        let mut entity = Entity::new(EntityId::Slot(0), EntityKind::Controller);
        entity.orientation = Quat::from_rotation_y(0.7);
        let value = read(&entity, keys::QUATERNION).unwrap();
        assert!(value.as_array().is_some_and(|a| a.len() == 4));
        let back = quat_from_value(&value).unwrap();
        assert!(back.angle_between(entity.orientation) < 1e-4);
    }

    #[test]
    fn test_player_id_null_roundtrip() {
        let mut entity = Entity::new(EntityId::Slot(0), EntityKind::Controller);
        assert_eq!(read(&entity, keys::PLAYER_ID), Some(Value::Null));

        apply(&mut entity, keys::PLAYER_ID, &json!("viewer-1")).unwrap();
        assert_eq!(
            entity.as_controller().unwrap().player_id.as_deref(),
            Some("viewer-1")
        );
        apply(&mut entity, keys::PLAYER_ID, &Value::Null).unwrap();
        assert!(entity.as_controller().unwrap().player_id.is_none());
    }

    #[test]
    fn test_unknown_key_refused() {
        let mut enemy = Entity::new(EntityId::Slot(1000), EntityKind::Enemy);
        let err = apply(&mut enemy, "scale", &json!(2.0)).unwrap_err();
        assert!(matches!(err, WorldError::BadProperty { .. }));
        assert!(read(&enemy, "scale").is_none());
    }

    #[test]
    fn test_bad_shape_leaves_state_intact() {
        let mut entity = Entity::new(EntityId::Slot(0), EntityKind::Controller);
        entity.position = Vec3::ONE;
        let err = apply(&mut entity, keys::POSITION, &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, WorldError::BadValue { .. }));
        assert!((entity.position - Vec3::ONE).length() < 1e-6);
    }
}
