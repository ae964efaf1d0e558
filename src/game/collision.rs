//! Collision Detection
//!
//! Deterministic AABB collision between the runner's hitbox and world
//! entities. Resolution order within a tick is fixed:
//!
//! 1. One-way platform landing (may move the body)
//! 2. Coins and power-ups
//! 3. Obstacles (first lethal overlap ends processing)
//! 4. Flight boundary
//!
//! The resolver only reports outcomes; applying effects and scoring is the
//! tick's job.

use serde::{Serialize, Deserialize};

use crate::game::physics::{Gravity, MovementMode, PhysicsBody, PhysicsConfig};
use crate::game::state::{ObstacleKind, PickupKind, Platform, PlatformSupport, WorldEntities};

/// Collision tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Platforms are shrunk by this much on each side for landing tests
    pub platform_edge_margin: f32,
    /// Float slack when checking where the feet were before this tick's move
    pub landing_epsilon: f32,
    /// Bonus for smashing an obstacle while invincible
    pub smash_bonus: f64,
    /// Bonus per coin
    pub coin_value: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            platform_edge_margin: 8.0,
            landing_epsilon: 0.01,
            smash_bonus: 50.0,
            coin_value: 10.0,
        }
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationCause {
    /// Hit an obstacle
    Obstacle(ObstacleKind),
    /// Touched the fatal surface while flying
    FlightBoundary,
}

/// A single collision outcome.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollisionOutcome {
    /// Landed on a platform
    Landed {
        /// Platform id
        platform_id: u32,
    },
    /// Picked up a coin or power-up
    Collected {
        /// Pickup id
        pickup_id: u32,
        /// What it was
        kind: PickupKind,
    },
    /// Destroyed an obstacle while invincible
    Smashed {
        /// Obstacle id
        obstacle_id: u32,
        /// Obstacle type
        kind: ObstacleKind,
    },
    /// Entered a vortex for the first time
    VortexTriggered {
        /// Obstacle id
        obstacle_id: u32,
    },
    /// Run over
    Eliminated {
        /// Cause
        cause: EliminationCause,
    },
}

impl CollisionOutcome {
    /// Does this outcome end the run?
    pub fn is_elimination(&self) -> bool {
        matches!(self, CollisionOutcome::Eliminated { .. })
    }
}

// =============================================================================
// PLATFORMS
// =============================================================================

/// Surface coordinate of a platform for a body under `gravity`: the face the
/// body's feet would rest on.
#[inline]
pub fn platform_surface(platform: &Platform, gravity: Gravity) -> f32 {
    match gravity {
        Gravity::Down => platform.bounds.top(),
        Gravity::Up => platform.bounds.y,
    }
}

/// Would the body land on this platform this tick?
///
/// A body resting on a platform falls by one tick of gravity and lands again
/// every tick, which is what keeps it supported.
///
/// Requires falling in the gravity direction, horizontal overlap with the
/// platform shrunk by the edge margin, and feet that were on or above the
/// surface before this tick's move and are on or past it now. A body whose
/// arc peaks just short of the surface never lands on it.
pub fn lands_on(body: &PhysicsBody, platform: &Platform, config: &CollisionConfig) -> bool {
    if platform.support == PlatformSupport::Limiter || !body.is_falling() {
        return false;
    }
    if body.mode == MovementMode::Flight {
        return false;
    }

    let inner = platform.bounds.inset(config.platform_edge_margin, 0.0);
    if !body.bounds().overlaps_x(&inner) {
        return false;
    }

    let surface = platform_surface(platform, body.gravity);
    let feet = body.feet();
    let before = feet - body.vy;
    let eps = config.landing_epsilon;
    match body.gravity {
        Gravity::Down => feet <= surface && before >= surface - eps,
        Gravity::Up => feet >= surface && before <= surface + eps,
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolve all collisions for one tick.
///
/// `invincible` turns lethal obstacle hits into smashes. At most one
/// `Eliminated` outcome is ever returned and it is always last.
pub fn resolve_collisions(
    body: &mut PhysicsBody,
    world: &mut WorldEntities,
    invincible: bool,
    config: &CollisionConfig,
    physics: &PhysicsConfig,
) -> Vec<CollisionOutcome> {
    let mut outcomes = Vec::new();

    // 1. Platforms
    let landing = world.platforms.iter().find(|p| lands_on(body, p, config));
    if let Some(platform) = landing {
        let surface = platform_surface(platform, body.gravity);
        let platform_id = platform.id;
        body.land_at(surface, physics);
        outcomes.push(CollisionOutcome::Landed { platform_id });
    }

    let hitbox = body.hitbox(physics);

    // 2. Pickups
    for pickup in &mut world.pickups {
        if pickup.collected || !hitbox.overlaps(&pickup.bounds) {
            continue;
        }
        if pickup.collect() {
            outcomes.push(CollisionOutcome::Collected { pickup_id: pickup.id, kind: pickup.kind });
        }
    }

    // 3. Obstacles
    let mut smashed = Vec::new();
    for obstacle in &mut world.obstacles {
        if !hitbox.overlaps(&obstacle.bounds) {
            continue;
        }
        if obstacle.kind == ObstacleKind::Vortex {
            if !obstacle.triggered {
                obstacle.triggered = true;
                outcomes.push(CollisionOutcome::VortexTriggered { obstacle_id: obstacle.id });
            }
            continue;
        }
        if invincible {
            smashed.push(obstacle.id);
            outcomes.push(CollisionOutcome::Smashed { obstacle_id: obstacle.id, kind: obstacle.kind });
            continue;
        }
        outcomes.push(CollisionOutcome::Eliminated {
            cause: EliminationCause::Obstacle(obstacle.kind),
        });
        return outcomes;
    }
    world.obstacles.retain(|o| !smashed.contains(&o.id));

    // 4. Flight boundary
    if check_flight_boundary(body, invincible, physics) {
        outcomes.push(CollisionOutcome::Eliminated { cause: EliminationCause::FlightBoundary });
    }

    outcomes
}

/// Flying into the gravity surface is fatal unless invincible.
pub fn check_flight_boundary(body: &PhysicsBody, invincible: bool, physics: &PhysicsConfig) -> bool {
    body.mode == MovementMode::Flight && !invincible && body.touches_gravity_surface(physics)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geom::Aabb;
    use crate::game::effects::EffectKind;
    use crate::game::input::InputFrame;
    use crate::game::state::{Anchor, Obstacle, Pickup};
    use proptest::prelude::*;

    fn setup() -> (PhysicsBody, WorldEntities, CollisionConfig, PhysicsConfig) {
        let physics = PhysicsConfig::default();
        (PhysicsBody::new(&physics), WorldEntities::default(), CollisionConfig::default(), physics)
    }

    fn obstacle(id: u32, kind: ObstacleKind, x: f32) -> Obstacle {
        let (w, h) = kind.size();
        Obstacle {
            id,
            bounds: Aabb::new(x, 0.0, w, h),
            anchor: Anchor::Ground,
            kind,
            triggered: false,
        }
    }

    fn platform(id: u32, x: f32, y: f32, support: PlatformSupport) -> Platform {
        Platform { id, bounds: Aabb::new(x, y, 120.0, 14.0), support }
    }

    #[test]
    fn test_obstacle_eliminates() {
        let (mut body, mut world, config, physics) = setup();
        world.obstacles.push(obstacle(1, ObstacleKind::Small, 90.0));

        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(
            outcomes,
            vec![CollisionOutcome::Eliminated { cause: EliminationCause::Obstacle(ObstacleKind::Small) }]
        );
    }

    #[test]
    fn test_two_overlaps_one_elimination() {
        let (mut body, mut world, config, physics) = setup();
        world.obstacles.push(obstacle(1, ObstacleKind::Small, 85.0));
        world.obstacles.push(obstacle(2, ObstacleKind::Medium, 95.0));

        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(outcomes.iter().filter(|o| o.is_elimination()).count(), 1);
    }

    #[test]
    fn test_invincible_smashes() {
        let (mut body, mut world, config, physics) = setup();
        world.obstacles.push(obstacle(1, ObstacleKind::Tall, 90.0));
        world.obstacles.push(obstacle(2, ObstacleKind::Small, 600.0));

        let outcomes = resolve_collisions(&mut body, &mut world, true, &config, &physics);
        assert_eq!(
            outcomes,
            vec![CollisionOutcome::Smashed { obstacle_id: 1, kind: ObstacleKind::Tall }]
        );
        assert_eq!(world.obstacles.len(), 1);
        assert_eq!(world.obstacles[0].id, 2);
    }

    #[test]
    fn test_hitbox_inset_forgives_edges() {
        let (mut body, mut world, config, physics) = setup();
        // Overlaps the 40 px visual box by 4 px, but not the inset hitbox
        world.obstacles.push(obstacle(1, ObstacleKind::Small, 116.0));
        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_vortex_triggers_once() {
        let (mut body, mut world, config, physics) = setup();
        let mut vortex = obstacle(5, ObstacleKind::Vortex, 80.0);
        vortex.bounds.y = 10.0;
        vortex.anchor = Anchor::Floating;
        world.obstacles.push(vortex);

        let first = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(first, vec![CollisionOutcome::VortexTriggered { obstacle_id: 5 }]);
        let second = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert!(second.is_empty());
        assert_eq!(world.obstacles.len(), 1);
    }

    #[test]
    fn test_pickup_collected_once() {
        let (mut body, mut world, config, physics) = setup();
        world.pickups.push(Pickup {
            id: 9,
            bounds: Aabb::new(90.0, 20.0, 20.0, 20.0),
            kind: PickupKind::PowerUp(EffectKind::Tiger),
            collected: false,
        });

        let first = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(
            first,
            vec![CollisionOutcome::Collected { pickup_id: 9, kind: PickupKind::PowerUp(EffectKind::Tiger) }]
        );
        let second = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert!(second.is_empty());
    }

    #[test]
    fn test_lands_only_when_falling() {
        let (mut body, _, config, _) = setup();
        let p = platform(1, 40.0, 100.0, PlatformSupport::Normal);

        body.y = 110.0;
        body.vy = 5.0;
        assert!(!lands_on(&body, &p, &config));

        body.y = 110.0;
        body.vy = -12.0;
        assert!(lands_on(&body, &p, &config));

        // Crossed too far in one tick
        body.y = 90.0;
        body.vy = -3.0;
        assert!(!lands_on(&body, &p, &config));
    }

    #[test]
    fn test_arc_peaking_under_platform_does_not_land() {
        let (mut body, mut world, config, physics) = setup();
        // Top surface at 100
        world.platforms.push(platform(1, 40.0, 86.0, PlatformSupport::Normal));

        body.y = 99.9;
        body.vy = 0.3;
        body.jump_count = 1;
        body.supported = false;
        body.update(InputFrame::new(), &physics);
        assert!(body.is_falling());

        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert!(outcomes.is_empty());
        assert!(body.y < 100.0);
        assert!(!body.supported);

        // Coming down from just above the surface still lands
        body.y = 100.3;
        body.vy = -0.1;
        body.update(InputFrame::new(), &physics);
        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(outcomes, vec![CollisionOutcome::Landed { platform_id: 1 }]);
        assert_eq!(body.y, 100.0);
    }

    #[test]
    fn test_resting_on_platform_stays_supported() {
        let (mut body, mut world, config, physics) = setup();
        world.platforms.push(platform(2, 40.0, 86.0, PlatformSupport::Normal));
        body.land_at(100.0, &physics);

        for _ in 0..120 {
            body.update(InputFrame::new(), &physics);
            let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
            assert_eq!(outcomes, vec![CollisionOutcome::Landed { platform_id: 2 }]);
            assert_eq!(body.y, 100.0);
        }
    }

    #[test]
    fn test_limiter_never_lands() {
        let (mut body, _, config, _) = setup();
        let p = platform(1, 40.0, 100.0, PlatformSupport::Limiter);
        body.y = 112.0;
        body.vy = -4.0;
        assert!(!lands_on(&body, &p, &config));
    }

    #[test]
    fn test_edge_margin() {
        let (mut body, _, config, _) = setup();
        body.y = 112.0;
        body.vy = -4.0;
        // Body spans 80..120; platform inner range starts at 114 + 8
        let p = platform(1, 114.0, 100.0, PlatformSupport::Normal);
        assert!(!lands_on(&body, &p, &config));
        let p = platform(1, 100.0, 100.0, PlatformSupport::Normal);
        assert!(lands_on(&body, &p, &config));
    }

    #[test]
    fn test_landing_moves_body() {
        let (mut body, mut world, config, physics) = setup();
        world.platforms.push(platform(3, 40.0, 100.0, PlatformSupport::Normal));
        body.y = 110.0;
        body.vy = -6.0;
        body.jump_count = 2;
        body.supported = false;

        let outcomes = resolve_collisions(&mut body, &mut world, false, &config, &physics);
        assert_eq!(outcomes, vec![CollisionOutcome::Landed { platform_id: 3 }]);
        assert_eq!(body.y, 114.0);
        assert_eq!(body.vy, 0.0);
        assert_eq!(body.jump_count, 0);
        assert!(body.supported);
    }

    #[test]
    fn test_inverted_landing() {
        let physics = PhysicsConfig::default();
        let config = CollisionConfig::default();
        let mut body = PhysicsBody::new(&physics);
        body.set_mode(MovementMode::Inverted, Gravity::Up, &physics);
        let p = platform(1, 40.0, 200.0, PlatformSupport::Normal);

        // Feet (top edge) just past the platform's underside, moving up
        body.y = 145.0;
        body.vy = 8.0;
        assert!(lands_on(&body, &p, &config));
        body.vy = -8.0;
        assert!(!lands_on(&body, &p, &config));
    }

    #[test]
    fn test_flight_boundary() {
        let physics = PhysicsConfig::default();
        let mut body = PhysicsBody::new(&physics);
        body.set_mode(MovementMode::Flight, Gravity::Down, &physics);
        body.y = 0.0;
        assert!(check_flight_boundary(&body, false, &physics));
        assert!(!check_flight_boundary(&body, true, &physics));
        body.y = 100.0;
        assert!(!check_flight_boundary(&body, false, &physics));
    }

    proptest! {
        #[test]
        fn prop_invincible_never_eliminated(
            xs in proptest::collection::vec(0.0f32..200.0, 0..8),
            y in 0.0f32..340.0,
        ) {
            let (mut body, mut world, config, physics) = setup();
            body.y = y;
            for (i, x) in xs.iter().enumerate() {
                world.obstacles.push(obstacle(i as u32, ObstacleKind::Medium, *x));
            }
            let outcomes = resolve_collisions(&mut body, &mut world, true, &config, &physics);
            prop_assert!(outcomes.iter().all(|o| !o.is_elimination()));
        }
    }
}
