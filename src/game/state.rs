//! Simulation State Definitions
//!
//! All state owned by one running simulation. Entities live in `Vec`s in
//! spawn order, so iteration order is deterministic.

use serde::{Serialize, Deserialize};

use crate::core::geom::Aabb;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::biome::Biome;
use crate::game::effects::{EffectKind, EffectScheduler};
use crate::game::events::GameEvent;
use crate::game::physics::{MovementMode, PhysicsBody};
use crate::game::tick::SimConfig;
use crate::game::world::WorldGenerator;

// =============================================================================
// OBSTACLES
// =============================================================================

/// Obstacle type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObstacleKind {
    /// Short block, easy jump
    Small = 0,
    /// Medium block
    Medium = 1,
    /// Tall block, needs a double jump or a platform
    Tall = 2,
    /// Floating portal; flips gravity once instead of killing
    Vortex = 3,
    /// Sky pillar, paired with one on the opposite surface
    Pillar = 4,
}

impl ObstacleKind {
    /// Default (width, height) for the fixed-size kinds. Pillars are sized at
    /// spawn time.
    pub fn size(self) -> (f32, f32) {
        match self {
            ObstacleKind::Small => (30.0, 40.0),
            ObstacleKind::Medium => (40.0, 60.0),
            ObstacleKind::Tall => (30.0, 90.0),
            ObstacleKind::Vortex => (46.0, 46.0),
            ObstacleKind::Pillar => (50.0, 0.0),
        }
    }

    /// Does touching this kind end the run?
    pub fn is_lethal(self) -> bool {
        self != ObstacleKind::Vortex
    }
}

/// Which surface an obstacle is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    /// Stands on the floor
    Ground,
    /// Hangs from the ceiling
    Ceiling,
    /// Floats (vortex)
    Floating,
}

/// An obstacle scrolling toward the runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Unique entity id (monotonic counter)
    pub id: u32,
    /// Bounds
    pub bounds: Aabb,
    /// Attachment surface
    pub anchor: Anchor,
    /// Type tag
    pub kind: ObstacleKind,
    /// One-shot effect already fired (vortex)
    pub triggered: bool,
}

// =============================================================================
// PLATFORMS
// =============================================================================

/// Platform variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlatformSupport {
    /// One-way landable surface
    Normal = 0,
    /// Decorative, never landable
    Limiter = 1,
}

/// A one-way platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Unique entity id
    pub id: u32,
    /// Bounds
    pub bounds: Aabb,
    /// Variant
    pub support: PlatformSupport,
}

// =============================================================================
// PICKUPS
// =============================================================================

/// What a pickup gives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupKind {
    /// Bonus points
    Coin,
    /// Timed effect
    PowerUp(EffectKind),
}

/// A coin or power-up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    /// Unique entity id
    pub id: u32,
    /// Bounds
    pub bounds: Aabb,
    /// Type tag
    pub kind: PickupKind,
    /// Write-once collected flag
    pub collected: bool,
}

impl Pickup {
    /// Mark collected. Returns false if it already was.
    pub fn collect(&mut self) -> bool {
        !std::mem::replace(&mut self.collected, true)
    }
}

/// Every entity currently in the world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldEntities {
    /// Active obstacles
    pub obstacles: Vec<Obstacle>,
    /// Active platforms
    pub platforms: Vec<Platform>,
    /// Active coins and power-ups
    pub pickups: Vec<Pickup>,
}

impl WorldEntities {
    /// Move everything left by `dx` and drop entities that are fully off
    /// screen or consumed.
    pub fn scroll(&mut self, dx: f32) {
        for o in &mut self.obstacles {
            o.bounds.x -= dx;
        }
        for p in &mut self.platforms {
            p.bounds.x -= dx;
        }
        for p in &mut self.pickups {
            p.bounds.x -= dx;
        }
        self.obstacles.retain(|o| o.bounds.right() > 0.0);
        self.platforms.retain(|p| p.bounds.right() > 0.0);
        self.pickups.retain(|p| p.bounds.right() > 0.0 && !p.collected);
    }

    /// Remove an obstacle by id.
    pub fn remove_obstacle(&mut self, id: u32) -> Option<Obstacle> {
        let idx = self.obstacles.iter().position(|o| o.id == id)?;
        Some(self.obstacles.remove(idx))
    }

    /// Total entity count.
    pub fn len(&self) -> usize {
        self.obstacles.len() + self.platforms.len() + self.pickups.len()
    }

    /// No entities at all?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        for o in &self.obstacles {
            hasher.update_u32(o.id);
            hash_aabb(hasher, &o.bounds);
            hasher.update_u8(o.kind as u8);
            hasher.update_bool(o.triggered);
        }
        for p in &self.platforms {
            hasher.update_u32(p.id);
            hash_aabb(hasher, &p.bounds);
            hasher.update_u8(p.support as u8);
        }
        for p in &self.pickups {
            hasher.update_u32(p.id);
            hash_aabb(hasher, &p.bounds);
            hasher.update_bool(p.collected);
        }
    }
}

fn hash_aabb(hasher: &mut StateHasher, b: &Aabb) {
    hasher.update_f32(b.x);
    hasher.update_f32(b.y);
    hasher.update_f32(b.w);
    hasher.update_f32(b.h);
}

// =============================================================================
// SIMULATION STATE
// =============================================================================

/// Run-level state. Mutated only by `tick`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Elapsed ticks
    pub tick: u64,
    /// Distance points (pure function of elapsed ticks)
    pub distance: f64,
    /// Bonus points from coins and smashed obstacles
    pub bonus: f64,
    /// Current scroll speed in pixels per tick
    pub speed: f32,
    /// Active movement mode
    pub mode: MovementMode,
    /// Active biome
    pub biome: Biome,
    /// Simulation advancing
    pub running: bool,
    /// Runner eliminated
    pub game_over: bool,
}

impl SimulationState {
    /// Fresh state at tick 0.
    pub fn new(initial_speed: f32) -> Self {
        Self {
            tick: 0,
            distance: 0.0,
            bonus: 0.0,
            speed: initial_speed,
            mode: MovementMode::Normal,
            biome: Biome::Plains,
            running: true,
            game_over: false,
        }
    }

    /// Displayed score: distance plus bonuses. Never decreases.
    #[inline]
    pub fn score(&self) -> f64 {
        self.distance + self.bonus
    }

    /// Score rounded down for persistence.
    #[inline]
    pub fn whole_score(&self) -> u64 {
        self.score().max(0.0).floor() as u64
    }
}

/// One complete simulation instance.
///
/// Owns every piece of mutable state, so several simulations can run side by
/// side (tests, the demo's two clients) with nothing shared.
pub struct Simulation {
    /// Run-level state
    pub state: SimulationState,
    /// Runner body
    pub body: PhysicsBody,
    /// World entities
    pub world: WorldEntities,
    /// Timed power-up windows
    pub effects: EffectScheduler,
    /// Procedural spawner
    pub generator: WorldGenerator,
    /// Events generated this tick (cleared each tick)
    pending_events: Vec<GameEvent>,
}

impl Simulation {
    /// Single-player simulation using local randomness.
    pub fn local(config: &SimConfig) -> Self {
        Self::with_generator(config, WorldGenerator::local(config))
    }

    /// Single-player simulation with a fixed local seed (reproducible tests).
    pub fn local_with_seed(config: &SimConfig, seed: u64) -> Self {
        Self::with_generator(config, WorldGenerator::local_with_seed(config, seed))
    }

    /// Multiplayer simulation seeded from a join code.
    pub fn seeded(join_code: &str, config: &SimConfig) -> Self {
        Self::with_generator(config, WorldGenerator::seeded(join_code, config))
    }

    fn with_generator(config: &SimConfig, generator: WorldGenerator) -> Self {
        Self {
            state: SimulationState::new(config.world.base_speed),
            body: PhysicsBody::new(&config.physics),
            world: WorldEntities::default(),
            effects: EffectScheduler::new(),
            generator,
            pending_events: Vec::new(),
        }
    }

    /// Pause/unpause the run (ticks become no-ops while paused).
    pub fn set_running(&mut self, running: bool) {
        if !self.state.game_over {
            self.state.running = running;
        }
    }

    /// Seed used by the generator, if seeded.
    pub fn seed(&self) -> Option<u64> {
        self.generator.seed()
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.state.tick, self.seed().unwrap_or(0), |hasher| {
            hasher.update_f64(self.state.distance);
            hasher.update_f64(self.state.bonus);
            hasher.update_f32(self.state.speed);
            hasher.update_u8(self.state.mode as u8);
            hasher.update_u8(self.state.biome as u8);
            hasher.update_bool(self.state.game_over);

            hasher.update_f32(self.body.y);
            hasher.update_f32(self.body.vy);
            hasher.update_u8(self.body.jump_count);
            hasher.update_bool(self.body.sliding);

            self.world.hash_into(hasher);
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
