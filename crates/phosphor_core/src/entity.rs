//! # Entity Model
//!
//! Everything the server owns is an [`Entity`]: a shared header (id,
//! derived position/orientation, life) plus a kind-specific body.
//!
//! ## Identifier Space
//!
//! The id space is deliberately heterogeneous: trackable wands and
//! ephemeral simulation objects live in numbered slots, avatars are keyed
//! by their connection address. [`EntityId`] is a tagged union rather than
//! a stringly-typed key so the two can share one registry without
//! coercion bugs.
//!
//! ## Ownership
//!
//! A controller stores the id of the avatar holding it; nothing owns
//! anything across entities. Both directions of the avatar <-> controller
//! relationship are value-typed foreign keys resolved through the registry
//! at use time.

use std::fmt;

use glam::{Quat, Vec3};

use crate::input::ButtonState;
use crate::pose::TrackedPose;

/// Identifier for one entity.
///
/// Ordering is derived: all slot ids sort before remote ids, slots
/// ascending, remote ids lexicographic. Registry iteration follows this
/// order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityId {
    /// Slot-addressed: trackable controllers and ephemeral objects.
    Slot(u32),
    /// Connection-addressed: avatars, keyed by the viewer's address.
    Remote(String),
}

impl EntityId {
    /// Builds the remote-id form from a connection address.
    #[must_use]
    pub fn remote(addr: impl Into<String>) -> Self {
        Self::Remote(addr.into())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(n) => write!(f, "{n}"),
            Self::Remote(s) => f.write_str(s),
        }
    }
}

/// The kinds an entity can be, as seen by the replication protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// A connected viewer's avatar.
    Player,
    /// A physical tracked wand.
    Controller,
    /// A fired bolt, decays and collides.
    Projectile,
    /// Explosion debris, decays freely.
    Particle,
    /// A target; inert until hit.
    Enemy,
    /// Static scenery replicated for viewers to construct.
    Doodad,
}

impl EntityKind {
    /// The `_t` tag this kind carries on the wire.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Controller => "Controller",
            Self::Projectile => "Projectile",
            Self::Particle => "Particle",
            Self::Enemy => "Enemy",
            Self::Doodad => "Doodad",
        }
    }

    /// Resolves a wire tag back to a kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Player" => Some(Self::Player),
            "Controller" => Some(Self::Controller),
            "Projectile" => Some(Self::Projectile),
            "Particle" => Some(Self::Particle),
            "Enemy" => Some(Self::Enemy),
            "Doodad" => Some(Self::Doodad),
            _ => None,
        }
    }
}

/// Avatar state beyond the shared header.
#[derive(Clone, Debug, Default)]
pub struct Player {
    /// Raw headset pose plus drift offsets.
    pub pose: TrackedPose,
    /// While set, wand buttons adjust calibration instead of acting.
    pub calibration_mode: bool,
    /// Derived from the MOVE button; drives terrain-following movement.
    pub is_moving: bool,
    /// Set once the viewer entered VR presentation.
    pub vr_active: bool,
}

/// Tracked-wand state beyond the shared header.
#[derive(Clone, Debug)]
pub struct Controller {
    /// Raw rig pose plus drift offsets and rig-to-world scale.
    pub pose: TrackedPose,
    /// Edge-detected button state.
    pub buttons: ButtonState,
    /// Analog trigger value, 0-255.
    pub trigger: u8,
    /// Id of the avatar holding this wand, if assigned.
    pub player_id: Option<String>,
    /// LED tint, `0xRRGGBB`.
    pub color_value: u32,
    /// Prevents a held SELECT from re-firing the hard reset every update.
    pub hard_reset_guard: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            pose: TrackedPose::new(),
            buttons: ButtonState::new(),
            trigger: 0,
            player_id: None,
            color_value: 0xff_ff_ff,
            hard_reset_guard: false,
        }
    }
}

/// Shared state of the self-propelled ephemerals.
#[derive(Clone, Copy, Debug)]
pub struct Ballistic {
    /// Unit travel direction.
    pub direction: Vec3,
    /// Units per second.
    pub speed: f32,
    /// Tint, `0xRRGGBB`; projectiles pass it on to their explosion.
    pub color_value: u32,
}

/// Static scenery description.
#[derive(Clone, Debug)]
pub struct Doodad {
    /// Asset path the viewer loads the model from.
    pub model_path: String,
    /// Uniform model scale.
    pub model_scale: f32,
}

/// Kind-specific entity body.
#[derive(Clone, Debug)]
pub enum EntityBody {
    /// See [`Player`].
    Player(Player),
    /// See [`Controller`].
    Controller(Controller),
    /// Bolt in flight.
    Projectile(Ballistic),
    /// Explosion debris.
    Particle(Ballistic),
    /// Inert target.
    Enemy,
    /// See [`Doodad`].
    Doodad(Doodad),
}

/// Default projectile muzzle speed, units per second.
pub const PROJECTILE_SPEED: f32 = 20.0;
/// Default projectile lifetime, seconds.
pub const PROJECTILE_LIFE: f32 = 2.0;
/// Default particle drift speed, units per second.
pub const PARTICLE_SPEED: f32 = 1.0;
/// Default doodad model scale.
pub const DOODAD_SCALE: f32 = 0.01;

/// One game object.
#[derive(Clone, Debug)]
pub struct Entity {
    /// Registry key.
    pub id: EntityId,
    /// Derived in-game position. Never assigned by external input.
    pub position: Vec3,
    /// Derived in-game orientation, unit quaternion.
    pub orientation: Quat,
    /// Remaining life; `<= 0` marks the entity for removal.
    pub life: f32,
    /// Kind-specific state.
    pub body: EntityBody,
}

impl Entity {
    /// Creates an entity with the full default state for `kind`.
    ///
    /// This is the only place defaults are established; no partially
    /// constructed entity is ever visible to other components.
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        let (life, body) = match kind {
            EntityKind::Player => (1.0, EntityBody::Player(Player::default())),
            EntityKind::Controller => (1.0, EntityBody::Controller(Controller::default())),
            EntityKind::Projectile => (
                PROJECTILE_LIFE,
                EntityBody::Projectile(Ballistic {
                    direction: Vec3::NEG_Z,
                    speed: PROJECTILE_SPEED,
                    color_value: 0xff_00_00,
                }),
            ),
            EntityKind::Particle => (
                1.0,
                EntityBody::Particle(Ballistic {
                    direction: Vec3::Y,
                    speed: PARTICLE_SPEED,
                    color_value: 0xff_ff_00,
                }),
            ),
            EntityKind::Enemy => (1.0, EntityBody::Enemy),
            EntityKind::Doodad => (
                1.0,
                EntityBody::Doodad(Doodad {
                    model_path: String::new(),
                    model_scale: DOODAD_SCALE,
                }),
            ),
        };
        Self {
            id,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            life,
            body,
        }
    }

    /// The kind tag of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self.body {
            EntityBody::Player(_) => EntityKind::Player,
            EntityBody::Controller(_) => EntityKind::Controller,
            EntityBody::Projectile(_) => EntityKind::Projectile,
            EntityBody::Particle(_) => EntityKind::Particle,
            EntityBody::Enemy => EntityKind::Enemy,
            EntityBody::Doodad(_) => EntityKind::Doodad,
        }
    }

    /// The tracked pose, for the physical kinds.
    #[must_use]
    pub fn pose(&self) -> Option<&TrackedPose> {
        match &self.body {
            EntityBody::Player(p) => Some(&p.pose),
            EntityBody::Controller(c) => Some(&c.pose),
            _ => None,
        }
    }

    /// Mutable tracked pose, for the physical kinds.
    pub fn pose_mut(&mut self) -> Option<&mut TrackedPose> {
        match &mut self.body {
            EntityBody::Player(p) => Some(&mut p.pose),
            EntityBody::Controller(c) => Some(&mut c.pose),
            _ => None,
        }
    }

    /// Recomputes the derived position/orientation from the tracked pose.
    ///
    /// `parent` is the carrying avatar's position for attached wands;
    /// no-op for kinds without a pose.
    pub fn recompose(&mut self, parent: Option<Vec3>) {
        if let Some(pose) = self.pose().copied() {
            self.position = pose.compose_position(parent);
            self.orientation = pose.compose_orientation();
        }
    }

    /// Player body accessor.
    #[must_use]
    pub fn as_player(&self) -> Option<&Player> {
        match &self.body {
            EntityBody::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable player body accessor.
    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.body {
            EntityBody::Player(p) => Some(p),
            _ => None,
        }
    }

    /// Controller body accessor.
    #[must_use]
    pub fn as_controller(&self) -> Option<&Controller> {
        match &self.body {
            EntityBody::Controller(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable controller body accessor.
    pub fn as_controller_mut(&mut self) -> Option<&mut Controller> {
        match &mut self.body {
            EntityBody::Controller(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering_slots_before_remotes() {
        let mut ids = vec![
            EntityId::remote("b"),
            EntityId::Slot(7),
            EntityId::remote("a"),
            EntityId::Slot(0),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                EntityId::Slot(0),
                EntityId::Slot(7),
                EntityId::remote("a"),
                EntityId::remote("b"),
            ]
        );
    }

    #[test]
    fn test_id_display() {
        assert_eq!(EntityId::Slot(3).to_string(), "3");
        assert_eq!(EntityId::remote("10.0.0.2:4120").to_string(), "10.0.0.2:4120");
    }

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in [
            EntityKind::Player,
            EntityKind::Controller,
            EntityKind::Projectile,
            EntityKind::Particle,
            EntityKind::Enemy,
            EntityKind::Doodad,
        ] {
            assert_eq!(EntityKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EntityKind::from_tag("Dragon"), None);
    }

    #[test]
    fn test_defaults_per_kind() {
        let projectile = Entity::new(EntityId::Slot(1000), EntityKind::Projectile);
        assert!((projectile.life - PROJECTILE_LIFE).abs() < f32::EPSILON);

        let enemy = Entity::new(EntityId::Slot(1001), EntityKind::Enemy);
        assert!((enemy.life - 1.0).abs() < f32::EPSILON);

        let controller = Entity::new(EntityId::Slot(0), EntityKind::Controller);
        let body = controller.as_controller().unwrap();
        assert_eq!(body.color_value, 0xff_ff_ff);
        assert!(body.player_id.is_none());
    }

    #[test]
    fn test_recompose_updates_derived_fields() {
        let mut entity = Entity::new(EntityId::Slot(0), EntityKind::Controller);
        {
            let pose = entity.pose_mut().unwrap();
            pose.raw_position = glam::Vec3::new(1.0, 0.0, 0.0);
            pose.scale = 2.0;
            pose.offset_position = glam::Vec3::new(0.0, 1.0, 0.0);
        }
        entity.recompose(Some(glam::Vec3::new(0.0, 0.0, -1.0)));
        assert!((entity.position - glam::Vec3::new(2.0, 1.0, -1.0)).length() < 1e-6);
    }
}
