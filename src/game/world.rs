//! Procedural World Generation
//!
//! The generator decides when and what to spawn. All randomness goes through
//! a [`SpawnSource`]:
//!
//! - [`SeededSource`] reseeds from `(seed, tick)` at the start of every tick,
//!   so two clients with the same join code produce the same entities even
//!   if one of them has drifted in frame timing.
//! - [`LocalSource`] wraps a `rand` generator for single-player runs.
//!
//! Spawning reads only the tick-derived distance and speed, never the bonus
//! score, so coins and smashed obstacles on one client cannot desynchronise
//! another client's world.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Deserialize};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::core::geom::Aabb;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::{DeterministicRng, join_code_seed};
use crate::game::biome::{Biome, BiomeSchedule, pick_weighted};
use crate::game::clock::clamp_tick_rate;
use crate::game::effects::EffectKind;
use crate::game::physics::Gravity;
use crate::game::state::{
    Anchor, Obstacle, ObstacleKind, Pickup, PickupKind, Platform, PlatformSupport, WorldEntities,
};
use crate::game::tick::SimConfig;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// World generation tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// X coordinate where new entities appear
    pub spawn_x: f32,
    /// Scroll speed at distance zero (px per tick)
    pub base_speed: f32,
    /// Speed gained per distance point
    pub speed_per_distance: f32,
    /// Speed cap
    pub max_speed: f32,
    /// Distance points per scrolled pixel
    pub distance_per_px: f64,
    /// Random extra gap added to every spawn (px)
    pub gap_jitter: f32,
    /// Local-mode reaction scale reached at `adaptive_distance`
    pub adaptive_floor: f32,
    /// Distance over which the local reaction scale eases down
    pub adaptive_distance: f64,
    /// Empty run-up before the first spawn (px)
    pub initial_gap: f32,
    /// Coins only appear past this distance
    pub coin_min_distance: f64,
    /// Minimum distance between two coins
    pub coin_spacing: f64,
    /// Chance of a coin above a freshly spawned platform
    pub coin_over_platform_chance: f32,
    /// Chance of a coin above a low obstacle
    pub coin_over_obstacle_chance: f32,
    /// Tallest obstacle that may carry a coin
    pub coin_max_obstacle_height: f32,
    /// Clearance between a coin and what it floats over
    pub coin_clearance: f32,
    /// Coin edge length
    pub coin_size: f32,
    /// Power-ups only appear past this distance
    pub powerup_min_distance: f64,
    /// Power-up edge length
    pub powerup_size: f32,
    /// Platform width
    pub platform_width: f32,
    /// Platform thickness
    pub platform_thickness: f32,
    /// Lowest platform altitude above the gravity surface
    pub platform_min_altitude: f32,
    /// Highest platform altitude above the gravity surface
    pub platform_max_altitude: f32,
    /// Share of platforms that are decorative limiters
    pub limiter_chance: f32,
    /// Altitude of a vortex above the gravity surface
    pub vortex_altitude: f32,
    /// Opening between a pair of sky pillars
    pub pillar_gap: f32,
    /// Minimum pillar length
    pub pillar_min_height: f32,
    /// Biome rotation
    pub schedule: BiomeSchedule,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            spawn_x: 900.0,
            base_speed: 6.0,
            speed_per_distance: 0.004,
            max_speed: 14.0,
            distance_per_px: 0.1,
            gap_jitter: 120.0,
            adaptive_floor: 0.8,
            adaptive_distance: 5000.0,
            initial_gap: 600.0,
            coin_min_distance: 600.0,
            coin_spacing: 40.0,
            coin_over_platform_chance: 0.8,
            coin_over_obstacle_chance: 0.2,
            coin_max_obstacle_height: 60.0,
            coin_clearance: 30.0,
            coin_size: 20.0,
            powerup_min_distance: 300.0,
            powerup_size: 28.0,
            platform_width: 120.0,
            platform_thickness: 14.0,
            platform_min_altitude: 100.0,
            platform_max_altitude: 150.0,
            limiter_chance: 0.15,
            vortex_altitude: 90.0,
            pillar_gap: 150.0,
            pillar_min_height: 60.0,
            schedule: BiomeSchedule::default(),
        }
    }
}

impl WorldConfig {
    /// Scroll speed at a given distance.
    pub fn speed_at(&self, distance: f64) -> f32 {
        (self.base_speed + distance as f32 * self.speed_per_distance).min(self.max_speed)
    }
}

/// Is a coin allowed at `distance` given where the previous coin was placed?
pub fn coin_eligible(distance: f64, last_coin_distance: f64, config: &WorldConfig) -> bool {
    distance >= config.coin_min_distance && distance - last_coin_distance >= config.coin_spacing
}

// =============================================================================
// SPAWN SOURCES
// =============================================================================

/// Source of spawn randomness.
pub trait SpawnSource: Send {
    /// Called once at the start of every tick.
    fn begin_tick(&mut self, tick: u64);

    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f32;

    /// Seed of a deterministic source.
    fn seed(&self) -> Option<u64> {
        None
    }

    /// Uniform value in `[min, max)`.
    fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_unit() * (max - min)
    }

    /// Weighted coin flip.
    fn next_bool(&mut self, probability: f32) -> bool {
        self.next_unit() < probability
    }
}

/// Join-code seeded source. The stream for a tick depends only on the seed
/// and the tick number.
#[derive(Clone, Debug)]
pub struct SeededSource {
    seed: u64,
    rng: DeterministicRng,
}

impl SeededSource {
    /// Seed from a join code.
    pub fn from_join_code(code: &str) -> Self {
        Self::new(join_code_seed(code))
    }

    /// Seed from a raw value.
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: DeterministicRng::for_tick(seed, 0) }
    }
}

impl SpawnSource for SeededSource {
    fn begin_tick(&mut self, tick: u64) {
        self.rng = DeterministicRng::for_tick(self.seed, tick);
    }

    fn next_unit(&mut self) -> f32 {
        self.rng.next_unit()
    }

    fn seed(&self) -> Option<u64> {
        Some(self.seed)
    }
}

/// Single-player source backed by `rand`.
#[derive(Debug)]
pub struct LocalSource {
    rng: StdRng,
}

impl LocalSource {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Fixed seed (reproducible tests).
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl SpawnSource for LocalSource {
    fn begin_tick(&mut self, _tick: u64) {}

    fn next_unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

// =============================================================================
// SPAWN LOG
// =============================================================================

/// What a spawn produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnKind {
    /// An obstacle
    Obstacle(ObstacleKind),
    /// A platform
    Platform(PlatformSupport),
    /// A coin
    Coin,
    /// A power-up
    PowerUp(EffectKind),
}

/// One entry of the spawn history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    /// Tick the entity appeared on
    pub tick: u64,
    /// Entity id
    pub id: u32,
    /// What was spawned
    pub kind: SpawnKind,
    /// Bounds at spawn time
    pub bounds: Aabb,
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Spawn decisions for one run.
pub struct WorldGenerator {
    config: WorldConfig,
    /// Playfield height, from the physics config
    ceiling: f32,
    /// Gap sizing converts reaction seconds to ticks
    tick_rate: u32,
    source: Box<dyn SpawnSource>,
    adaptive: bool,
    next_id: u32,
    scrolled_since_spawn: f32,
    next_gap: f32,
    last_coin_distance: f64,
    log: Vec<SpawnRecord>,
}

/// Per-spawn context handed to the placement helpers.
struct SpawnCtx {
    tick: u64,
    gravity: Gravity,
}

impl WorldGenerator {
    /// Generator for a seeded multiplayer run.
    pub fn seeded(join_code: &str, config: &SimConfig) -> Self {
        Self::new(Box::new(SeededSource::from_join_code(join_code)), config, false)
    }

    /// Generator for a single-player run with OS randomness.
    pub fn local(config: &SimConfig) -> Self {
        Self::new(Box::new(LocalSource::from_entropy()), config, true)
    }

    /// Generator for a single-player run with a fixed seed.
    pub fn local_with_seed(config: &SimConfig, seed: u64) -> Self {
        Self::new(Box::new(LocalSource::with_seed(seed)), config, true)
    }

    /// Generator over any source. `adaptive` enables the local-mode gap
    /// tightening; seeded runs must leave it off.
    pub fn new(source: Box<dyn SpawnSource>, config: &SimConfig, adaptive: bool) -> Self {
        let next_gap = config.world.initial_gap;
        Self {
            config: config.world.clone(),
            ceiling: config.physics.ceiling,
            tick_rate: clamp_tick_rate(config.tick_rate),
            source,
            adaptive,
            next_id: 0,
            scrolled_since_spawn: 0.0,
            next_gap,
            last_coin_distance: 0.0,
            log: Vec::new(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Playfield height used for ceiling anchoring.
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Ticks per second used for gap sizing.
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Seed of a deterministic source.
    pub fn seed(&self) -> Option<u64> {
        self.source.seed()
    }

    /// Every spawn so far, in order.
    pub fn spawn_log(&self) -> &[SpawnRecord] {
        &self.log
    }

    /// Digest of the spawn history. Equal digests mean two clients built the
    /// same world.
    pub fn spawn_digest(&self) -> StateHash {
        let mut hasher = StateHasher::for_spawn_log();
        for record in &self.log {
            hasher.update_u64(record.tick);
            hasher.update_u32(record.id);
            let tag = match record.kind {
                SpawnKind::Obstacle(k) => [0, k as u8],
                SpawnKind::Platform(s) => [1, s as u8],
                SpawnKind::Coin => [2, 0],
                SpawnKind::PowerUp(e) => [3, e as u8],
            };
            hasher.update_bytes(&tag);
            hasher.update_f32(record.bounds.x);
            hasher.update_f32(record.bounds.y);
            hasher.update_f32(record.bounds.w);
            hasher.update_f32(record.bounds.h);
        }
        hasher.finalize()
    }

    /// Distance of the most recent coin.
    pub fn last_coin_distance(&self) -> f64 {
        self.last_coin_distance
    }

    /// Minimum gap in pixels before the next spawn at this speed and biome.
    pub fn min_gap(&self, speed: f32, biome: Biome, distance: f64) -> f32 {
        let reaction = biome.reaction_secs() * self.reaction_scale(distance);
        speed * reaction * self.tick_rate as f32
    }

    /// Local runs ease reaction time down as the run goes on.
    fn reaction_scale(&self, distance: f64) -> f32 {
        if !self.adaptive || self.config.adaptive_distance <= 0.0 {
            return 1.0;
        }
        let t = (distance / self.config.adaptive_distance).clamp(0.0, 1.0) as f32;
        1.0 - (1.0 - self.config.adaptive_floor) * t
    }

    /// Advance one tick: account for `speed` pixels of scroll and spawn if
    /// the gap is used up. New entities are appended to `world`.
    pub fn step(
        &mut self,
        tick: u64,
        distance: f64,
        speed: f32,
        biome: Biome,
        gravity: Gravity,
        world: &mut WorldEntities,
    ) {
        self.source.begin_tick(tick);
        self.scrolled_since_spawn += speed;
        if self.scrolled_since_spawn < self.next_gap {
            return;
        }

        let ctx = SpawnCtx { tick, gravity };
        let table = biome.spawn_table();

        let spawned_width = if biome == Biome::Sky {
            self.spawn_pillars(&ctx, world)
        } else {
            let roll = self.source.next_unit();
            let kind = pick_weighted(roll, table.obstacles).unwrap_or(ObstacleKind::Small);
            self.spawn_obstacle(&ctx, kind, world)
        };

        let platform_roll = self.source.next_unit();
        let platform = if platform_roll < table.platform_chance {
            Some(self.spawn_platform(&ctx, world))
        } else {
            None
        };

        self.maybe_spawn_coin(&ctx, distance, platform, world);

        if distance >= self.config.powerup_min_distance && self.source.next_bool(table.powerup_chance) {
            let roll = self.source.next_unit();
            if let Some(effect) = pick_weighted(roll, table.powerups) {
                self.spawn_powerup(&ctx, effect, world);
            }
        }

        let jitter = self.source.next_range(0.0, self.config.gap_jitter);
        self.next_gap = self.min_gap(speed, biome, distance) + jitter + spawned_width;
        self.scrolled_since_spawn = 0.0;

        #[cfg(feature = "debug-tracing")]
        trace!(tick, distance, next_gap = self.next_gap, biome = biome.tag(), "Spawned");
    }

    // =========================================================================
    // PLACEMENT
    // =========================================================================

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn record(&mut self, tick: u64, id: u32, kind: SpawnKind, bounds: Aabb) {
        self.log.push(SpawnRecord { tick, id, kind, bounds });
    }

    /// Bottom edge for a box of height `h` whose near side sits `altitude`
    /// above the gravity surface.
    fn place_y(&self, gravity: Gravity, altitude: f32, h: f32) -> f32 {
        match gravity {
            Gravity::Down => altitude,
            Gravity::Up => self.ceiling - altitude - h,
        }
    }

    fn spawn_obstacle(
        &mut self,
        ctx: &SpawnCtx,
        kind: ObstacleKind,
        world: &mut WorldEntities,
    ) -> f32 {
        let (w, h) = kind.size();
        let (altitude, anchor) = match (kind, ctx.gravity) {
            (ObstacleKind::Vortex, _) => (self.config.vortex_altitude, Anchor::Floating),
            (_, Gravity::Down) => (0.0, Anchor::Ground),
            (_, Gravity::Up) => (0.0, Anchor::Ceiling),
        };
        let bounds = Aabb::new(self.config.spawn_x, self.place_y(ctx.gravity, altitude, h), w, h);
        let id = self.alloc_id();
        world.obstacles.push(Obstacle { id, bounds, anchor, kind, triggered: false });
        self.record(ctx.tick, id, SpawnKind::Obstacle(kind), bounds);
        w
    }

    /// A floor pillar and a ceiling pillar with a flyable opening between.
    fn spawn_pillars(&mut self, ctx: &SpawnCtx, world: &mut WorldEntities) -> f32 {
        let (w, _) = ObstacleKind::Pillar.size();
        let ceiling = self.ceiling;
        let min = self.config.pillar_min_height;
        let max_bottom = (ceiling - self.config.pillar_gap - min).max(min);
        let bottom_h = self.source.next_range(min, max_bottom);
        let top_y = bottom_h + self.config.pillar_gap;

        let lower = Aabb::new(self.config.spawn_x, 0.0, w, bottom_h);
        let upper = Aabb::new(self.config.spawn_x, top_y, w, ceiling - top_y);

        for (bounds, anchor) in [(lower, Anchor::Ground), (upper, Anchor::Ceiling)] {
            let id = self.alloc_id();
            world.obstacles.push(Obstacle {
                id,
                bounds,
                anchor,
                kind: ObstacleKind::Pillar,
                triggered: false,
            });
            self.record(ctx.tick, id, SpawnKind::Obstacle(ObstacleKind::Pillar), bounds);
        }
        w
    }

    fn spawn_platform(&mut self, ctx: &SpawnCtx, world: &mut WorldEntities) -> Aabb {
        let altitude = self
            .source
            .next_range(self.config.platform_min_altitude, self.config.platform_max_altitude);
        let support = if self.source.next_bool(self.config.limiter_chance) {
            PlatformSupport::Limiter
        } else {
            PlatformSupport::Normal
        };
        let h = self.config.platform_thickness;
        let x = self.config.spawn_x - self.config.platform_width / 4.0;
        let bounds = Aabb::new(x, self.place_y(ctx.gravity, altitude, h), self.config.platform_width, h);
        let id = self.alloc_id();
        world.platforms.push(Platform { id, bounds, support });
        self.record(ctx.tick, id, SpawnKind::Platform(support), bounds);
        bounds
    }

    fn maybe_spawn_coin(
        &mut self,
        ctx: &SpawnCtx,
        distance: f64,
        platform: Option<Aabb>,
        world: &mut WorldEntities,
    ) {
        if !coin_eligible(distance, self.last_coin_distance, &self.config) {
            return;
        }
        let size = self.config.coin_size;
        let clearance = self.config.coin_clearance;

        let anchor = match platform {
            Some(p) if self.source.next_bool(self.config.coin_over_platform_chance) => {
                let near = match ctx.gravity {
                    Gravity::Down => p.top(),
                    Gravity::Up => self.ceiling - p.y,
                };
                Some((p.x + (p.w - size) / 2.0, near + clearance))
            }
            _ => {
                let low = world.obstacles.last().filter(|o| {
                    o.anchor != Anchor::Floating
                        && o.bounds.h <= self.config.coin_max_obstacle_height
                });
                match low.map(|o| o.bounds) {
                    Some(o) if self.source.next_bool(self.config.coin_over_obstacle_chance) => {
                        Some((o.x + (o.w - size) / 2.0, o.h + clearance))
                    }
                    _ => None,
                }
            }
        };

        if let Some((x, altitude)) = anchor {
            let bounds = Aabb::new(x, self.place_y(ctx.gravity, altitude, size), size, size);
            let id = self.alloc_id();
            world.pickups.push(Pickup { id, bounds, kind: PickupKind::Coin, collected: false });
            self.record(ctx.tick, id, SpawnKind::Coin, bounds);
            self.last_coin_distance = distance;
        }
    }

    fn spawn_powerup(&mut self, ctx: &SpawnCtx, effect: EffectKind, world: &mut WorldEntities) {
        let size = self.config.powerup_size;
        let altitude = self.source.next_range(80.0, 200.0);
        let x = self.config.spawn_x + self.next_gap.max(self.config.gap_jitter) / 2.0;
        let bounds = Aabb::new(x, self.place_y(ctx.gravity, altitude, size), size, size);
        let id = self.alloc_id();
        world.pickups.push(Pickup {
            id,
            bounds,
            kind: PickupKind::PowerUp(effect),
            collected: false,
        });
        self.record(ctx.tick, id, SpawnKind::PowerUp(effect), bounds);
    }
}

// =============================================================================
// TESTS
// =============================================================================
