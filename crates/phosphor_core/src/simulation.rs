//! # Simulation Tick
//!
//! Advances the ephemeral side of the world at a fixed rate: projectile
//! and particle motion, lifetime decay, terrain and enemy collision, and
//! terrain-following avatar movement.
//!
//! ## Tick Order
//!
//! 1. Every entity whose `life` is already `<= 0` is removed and skipped -
//!    its terminal `life` was flushed to viewers on the tick it died.
//! 2. Survivors are processed by kind, in registry order.
//!
//! Collision scans take the first qualifying enemy in registry order and
//! stop - exactly one kill per projectile per tick, whatever order the
//! enemies were spawned in.

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityBody, EntityId, EntityKind};
use crate::pose::yaw_of;
use crate::properties::keys;
use crate::world::World;
use crate::TICK_RATE;

/// Terrain height query, supplied by the asset-owning collaborator.
///
/// The core never loads heightmaps; it only asks.
pub trait HeightField {
    /// Ground height at the given horizontal coordinates.
    fn height_at(&self, x: f32, z: f32) -> f32;
}

/// Constant-height terrain. The default floor, and handy under test.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatTerrain(pub f32);

impl HeightField for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }
}

/// Tuning knobs for the tick.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Avatar movement speed, units per second.
    pub avatar_speed: f32,
    /// Projectile-to-enemy kill distance.
    pub hit_radius: f32,
    /// A projectile this close above the ground counts as a terrain hit.
    pub ground_clearance: f32,
    /// Particles per explosion burst.
    pub burst_count: u32,
    /// Burst spawn scatter radius.
    pub burst_radius: f32,
    /// Base particle speed of a burst.
    pub burst_speed: f32,
    /// How far ahead of the avatar spawned enemies appear.
    pub enemy_spawn_distance: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            avatar_speed: 3.0,
            hit_radius: 0.55,
            ground_clearance: 0.05,
            burst_count: 12,
            burst_radius: 0.25,
            burst_speed: 1.5,
            enemy_spawn_distance: 2.0,
        }
    }
}

impl SimConfig {
    /// Seconds per tick.
    #[inline]
    #[must_use]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

/// Runs one fixed tick over the whole world.
pub fn step<R: Rng>(
    world: &mut World,
    terrain: &dyn HeightField,
    rng: &mut R,
    dt: f32,
    cfg: &SimConfig,
) {
    let ids = world.registry.ids();

    // Removal first: entities that died last tick leave before anything
    // can observe them again.
    for id in &ids {
        if world.registry.get(id).is_some_and(|e| e.life <= 0.0) {
            world.registry.remove(id);
        }
    }

    for id in &ids {
        let Some(entity) = world.registry.get(id) else {
            continue;
        };
        match entity.kind() {
            EntityKind::Projectile => step_projectile(world, terrain, rng, id, dt, cfg),
            EntityKind::Particle => step_particle(world, id, dt),
            EntityKind::Player => step_avatar(world, terrain, id, dt, cfg),
            // Enemies are inert; controllers and doodads move only
            // through telemetry and calibration.
            EntityKind::Enemy | EntityKind::Controller | EntityKind::Doodad => {}
        }
    }
}

fn step_projectile<R: Rng>(
    world: &mut World,
    terrain: &dyn HeightField,
    rng: &mut R,
    id: &EntityId,
    dt: f32,
    cfg: &SimConfig,
) {
    let (position, color) = {
        let Some(entity) = world.registry.get_mut(id) else {
            return;
        };
        let EntityBody::Projectile(ballistic) = &entity.body else {
            return;
        };
        let ballistic = *ballistic;
        entity.life -= dt;
        entity.position += ballistic.direction * ballistic.speed * dt;

        let grounded = terrain.height_at(entity.position.x, entity.position.z)
            > entity.position.y - cfg.ground_clearance;
        if grounded {
            entity.life = 0.0;
        }
        (entity.position, ballistic.color_value)
    };
    world.sync.mark(id, &[keys::POSITION, keys::LIFE]);

    if world.registry.get(id).is_some_and(|e| e.life <= 0.0) {
        spawn_particles(world, rng, position, color, cfg);
    }

    // Enemy scan runs even for a projectile that just expired or hit the
    // ground: a bolt detonating next to a target still takes it out.
    let hit = world
        .registry
        .iter()
        .find(|(_, e)| {
            matches!(e.body, EntityBody::Enemy)
                && e.life > 0.0
                && e.position.distance(position) < cfg.hit_radius
        })
        .map(|(enemy_id, _)| enemy_id.clone());

    if let Some(enemy_id) = hit {
        if let Some(enemy) = world.registry.get_mut(&enemy_id) {
            enemy.life = 0.0;
        }
        world.sync.mark(&enemy_id, &[keys::LIFE]);
        if let Some(projectile) = world.registry.get_mut(id) {
            projectile.life = 0.0;
        }
        world.sync.mark(id, &[keys::LIFE]);
        spawn_particles(world, rng, position, color, cfg);
    }
}

fn step_particle(world: &mut World, id: &EntityId, dt: f32) {
    let Some(entity) = world.registry.get_mut(id) else {
        return;
    };
    let EntityBody::Particle(ballistic) = &entity.body else {
        return;
    };
    let ballistic = *ballistic;
    entity.life -= dt;
    entity.position += ballistic.direction * ballistic.speed * dt;
    world.sync.mark(id, &[keys::POSITION, keys::LIFE]);
}

fn step_avatar(
    world: &mut World,
    terrain: &dyn HeightField,
    id: &EntityId,
    dt: f32,
    cfg: &SimConfig,
) {
    let player_position = {
        let Some(entity) = world.registry.get_mut(id) else {
            return;
        };
        if !entity.as_player().is_some_and(|p| p.is_moving) {
            return;
        }
        let heading = Quat::from_rotation_y(yaw_of(entity.orientation)) * Vec3::NEG_Z;
        let Some(player) = entity.as_player_mut() else {
            return;
        };
        player.pose.offset_position += heading * cfg.avatar_speed * dt;
        // The composed y tracks the ground at the new horizontal spot.
        let planned = player.pose.compose_position(None);
        let ground = terrain.height_at(planned.x, planned.z);
        player.pose.offset_position.y += ground - planned.y;
        entity.recompose(None);
        entity.position
    };
    world.sync.mark(id, &[keys::POSITION, keys::OFFSET_POSITION]);

    // A carried wand's absolute position depends on the avatar's: its own
    // offsets are untouched but the composition moved.
    let EntityId::Remote(player_key) = id else {
        return;
    };
    let carried = world
        .registry
        .iter()
        .find(|(_, e)| {
            e.as_controller()
                .is_some_and(|c| c.player_id.as_deref() == Some(player_key.as_str()))
        })
        .map(|(controller_id, _)| controller_id.clone());
    if let Some(controller_id) = carried {
        if let Some(controller) = world.registry.get_mut(&controller_id) {
            controller.recompose(Some(player_position));
        }
        world.sync.mark(&controller_id, &[keys::POSITION]);
    }
}

/// Fires a projectile. Returns its id.
pub fn spawn_projectile(
    world: &mut World,
    position: Vec3,
    direction: Vec3,
    color_value: u32,
) -> EntityId {
    let id = world.registry.alloc_ephemeral();
    let entity = world
        .registry
        .get_or_create(id.clone(), EntityKind::Projectile);
    entity.position = position;
    if let EntityBody::Projectile(ballistic) = &mut entity.body {
        ballistic.direction = direction.normalize_or_zero();
        ballistic.color_value = color_value;
    }
    world.sync.mark(
        &id,
        &[
            keys::POSITION,
            keys::DIRECTION,
            keys::SPEED,
            keys::LIFE,
            keys::COLOR_VALUE,
        ],
    );
    id
}

/// Spawns an inert enemy. Returns its id.
pub fn spawn_enemy(world: &mut World, position: Vec3) -> EntityId {
    let id = world.registry.alloc_ephemeral();
    let entity = world.registry.get_or_create(id.clone(), EntityKind::Enemy);
    entity.position = position;
    world.sync.mark(&id, &[keys::POSITION, keys::LIFE]);
    id
}

/// Registers a piece of static scenery for viewers to construct.
pub fn spawn_doodad(
    world: &mut World,
    position: Vec3,
    model_path: &str,
    model_scale: f32,
) -> EntityId {
    let id = world.registry.alloc_ephemeral();
    let entity = world.registry.get_or_create(id.clone(), EntityKind::Doodad);
    entity.position = position;
    if let EntityBody::Doodad(doodad) = &mut entity.body {
        doodad.model_path = model_path.to_owned();
        doodad.model_scale = model_scale;
    }
    world.sync.mark(
        &id,
        &[keys::POSITION, keys::MODEL_PATH, keys::MODEL_SCALE],
    );
    id
}

/// Sprays an explosion burst of short-lived particles around `position`.
pub fn spawn_particles<R: Rng>(
    world: &mut World,
    rng: &mut R,
    position: Vec3,
    color_value: u32,
    cfg: &SimConfig,
) {
    for _ in 0..cfg.burst_count {
        let direction = random_unit(rng);
        let id = world.registry.alloc_ephemeral();
        let entity = world.registry.get_or_create(id.clone(), EntityKind::Particle);
        entity.position = position + direction * rng.gen_range(0.0..cfg.burst_radius);
        entity.life = rng.gen_range(0.3..0.8);
        if let EntityBody::Particle(ballistic) = &mut entity.body {
            ballistic.direction = direction;
            ballistic.speed = cfg.burst_speed * rng.gen_range(0.5..1.5);
            ballistic.color_value = color_value;
        }
        world.sync.mark(
            &id,
            &[
                keys::POSITION,
                keys::DIRECTION,
                keys::SPEED,
                keys::LIFE,
                keys::COLOR_VALUE,
            ],
        );
    }
}

fn random_unit<R: Rng>(rng: &mut R) -> Vec3 {
    // Rejection-sample the unit ball; keeps the distribution uniform.
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-4 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rig() -> (World, StdRng, SimConfig) {
        (World::new(), StdRng::seed_from_u64(7), SimConfig::default())
    }

    fn set_projectile_speed(world: &mut World, id: &EntityId, speed: f32) {
        if let Some(entity) = world.registry.get_mut(id) {
            if let EntityBody::Projectile(b) = &mut entity.body {
                b.speed = speed;
            }
        }
    }

    #[test]
    fn test_projectile_flight() {
        let (mut world, mut rng, cfg) = rig();
        let id = spawn_projectile(&mut world, Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z, 0xff_00_00);
        set_projectile_speed(&mut world, &id, 10.0);
        world.flush_sync();

        let terrain = FlatTerrain(0.0);
        for _ in 0..10 {
            step(&mut world, &terrain, &mut rng, 0.05, &cfg);
        }

        let entity = world.registry.get(&id).unwrap();
        assert!((entity.position - Vec3::new(0.0, 1.0, -5.0)).length() < 1e-3);
        assert!(entity.life > 0.0);
    }

    #[test]
    fn test_terrain_hit_detonates() {
        let (mut world, mut rng, cfg) = rig();
        let id = spawn_projectile(&mut world, Vec3::new(0.0, 0.02, 0.0), Vec3::NEG_Z, 0x00_ff_00);
        world.flush_sync();

        step(&mut world, &FlatTerrain(0.0), &mut rng, 0.05, &cfg);

        let entity = world.registry.get(&id).unwrap();
        assert!(entity.life <= 0.0);
        // The explosion burst arrived.
        let particles = world
            .registry
            .iter()
            .filter(|(_, e)| matches!(e.body, EntityBody::Particle(_)))
            .count();
        assert_eq!(particles, cfg.burst_count as usize);

        let payload = world.flush_sync();
        let entry = payload.get(&id.to_string()).unwrap();
        assert!((entry.get(keys::LIFE).unwrap().as_f64().unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_mutual_kill() {
        let (mut world, mut rng, cfg) = rig();
        let enemy = spawn_enemy(&mut world, Vec3::ZERO);
        let projectile =
            spawn_projectile(&mut world, Vec3::new(0.0, 0.0, 0.3), Vec3::NEG_Z, 0xff_00_00);
        set_projectile_speed(&mut world, &projectile, 10.0);
        world.flush_sync();

        step(&mut world, &FlatTerrain(-10.0), &mut rng, 0.05, &cfg);

        assert!(world.registry.get(&enemy).unwrap().life <= 0.0);
        assert!(world.registry.get(&projectile).unwrap().life <= 0.0);

        let payload = world.flush_sync();
        for id in [&enemy, &projectile] {
            let entry = payload.get(&id.to_string()).unwrap();
            assert!((entry.get(keys::LIFE).unwrap().as_f64().unwrap()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_first_enemy_wins_only_once() {
        let (mut world, mut rng, cfg) = rig();
        let first = spawn_enemy(&mut world, Vec3::new(0.0, 0.0, 0.0));
        let second = spawn_enemy(&mut world, Vec3::new(0.0, 0.0, -0.1));
        let projectile =
            spawn_projectile(&mut world, Vec3::new(0.0, 0.0, 0.2), Vec3::NEG_Z, 0xff_00_00);
        set_projectile_speed(&mut world, &projectile, 1.0);

        step(&mut world, &FlatTerrain(-10.0), &mut rng, 0.05, &cfg);

        let dead: Vec<bool> = [&first, &second]
            .iter()
            .map(|id| world.registry.get(id).unwrap().life <= 0.0)
            .collect();
        // Exactly one kill per projectile per tick, and it is the first
        // in registry order.
        assert_eq!(dead, vec![true, false]);
    }

    #[test]
    fn test_dead_entities_removed_next_tick() {
        let (mut world, mut rng, cfg) = rig();
        let enemy = spawn_enemy(&mut world, Vec3::ZERO);
        world.registry.get_mut(&enemy).unwrap().life = 0.0;

        step(&mut world, &FlatTerrain(0.0), &mut rng, cfg.dt(), &cfg);
        assert!(!world.registry.contains(&enemy));
    }

    #[test]
    fn test_avatar_movement_follows_terrain() {
        let (mut world, mut rng, cfg) = rig();
        let id = EntityId::remote("walker");
        {
            let entity = world.registry.get_or_create(id.clone(), EntityKind::Player);
            entity.as_player_mut().unwrap().is_moving = true;
            entity.recompose(None);
        }
        let controller_id = EntityId::Slot(0);
        {
            let entity = world
                .registry
                .get_or_create(controller_id.clone(), EntityKind::Controller);
            entity.as_controller_mut().unwrap().player_id = Some("walker".into());
        }

        step(&mut world, &FlatTerrain(2.0), &mut rng, 0.5, &cfg);

        let player = world.registry.get(&id).unwrap();
        // Yaw 0 means heading -Z at avatar_speed.
        assert!((player.position.z + cfg.avatar_speed * 0.5).abs() < 1e-4);
        assert!((player.position.y - 2.0).abs() < 1e-4);

        // The carried wand recomposed against the new avatar position.
        let controller = world.registry.get(&controller_id).unwrap();
        assert!((controller.position - player.position).length() < 1e-4);
    }

    #[test]
    fn test_doodad_replicates_its_model() {
        let (mut world, mut rng, cfg) = rig();
        let id = spawn_doodad(&mut world, Vec3::new(4.0, 0.0, -3.0), "models/torus.fbx", 0.01);

        let payload = world.flush_sync();
        let entry = payload.get(&id.to_string()).unwrap();
        assert_eq!(entry["_t"], "Doodad");
        assert_eq!(entry[keys::MODEL_PATH], "models/torus.fbx");

        // Scenery sits out the tick entirely.
        step(&mut world, &FlatTerrain(0.0), &mut rng, cfg.dt(), &cfg);
        assert!(world.registry.contains(&id));
        assert!(world.flush_sync().get(&id.to_string()).is_none());
    }

    #[test]
    fn test_idle_avatar_does_not_move() {
        let (mut world, mut rng, cfg) = rig();
        let id = EntityId::remote("idle");
        world.registry.get_or_create(id.clone(), EntityKind::Player);
        world.flush_sync();

        step(&mut world, &FlatTerrain(0.0), &mut rng, cfg.dt(), &cfg);

        assert!((world.registry.get(&id).unwrap().position).length() < 1e-6);
        // Nothing about an idle avatar is dirty.
        assert!(world.flush_sync().get("idle").is_none());
    }
}
