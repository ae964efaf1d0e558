//! Simulation Tick
//!
//! The per-step game loop. Given the same simulation, input and time it
//! always produces the same result.
//!
//! Only world generation has to agree across clients, and it reads nothing
//! but the tick number and the tick-derived distance. Effects use the
//! injected clock and may differ between clients without desynchronising
//! the world.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::TICK_RATE;
use crate::core::time::Millis;
use crate::game::clock::clamp_tick_rate;
use crate::game::collision::{CollisionConfig, CollisionOutcome, EliminationCause, resolve_collisions};
use crate::game::effects::{EffectConfig, EffectKind};
use crate::game::events::GameEvent;
use crate::game::input::InputFrame;
use crate::game::physics::{MovementMode, PhysicsConfig};
use crate::game::state::{PickupKind, Simulation};
use crate::game::world::WorldConfig;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// The runner was eliminated this tick
    pub eliminated: bool,
    /// Final score (set together with `eliminated`)
    pub final_score: Option<u64>,
}

/// Configuration for one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation steps per second, shared by the clock and the spawner
    pub tick_rate: u32,
    /// Body physics (also owns the playfield height)
    pub physics: PhysicsConfig,
    /// World generation
    pub world: WorldConfig,
    /// Effect durations
    pub effects: EffectConfig,
    /// Collision tuning
    pub collision: CollisionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            physics: PhysicsConfig::default(),
            world: WorldConfig::default(),
            effects: EffectConfig::default(),
            collision: CollisionConfig::default(),
        }
    }
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `sim` - The simulation (will be mutated)
/// * `input` - Input for this tick
/// * `now` - Current time from the injected clock, for effect windows
/// * `config` - Simulation configuration
///
/// Does nothing once the run is over or while it is paused.
pub fn tick(sim: &mut Simulation, input: InputFrame, now: Millis, config: &SimConfig) -> TickResult {
    let mut result = TickResult::default();
    if sim.state.game_over || !sim.state.running {
        return result;
    }

    // 0. Advance tick counter
    sim.state.tick += 1;
    let tick = sim.state.tick;

    // 1. Expire effect windows
    for effect in sim.effects.expire(now, &config.effects) {
        sim.push_event(GameEvent::effect_expired(tick, effect));
    }

    // 2. Biome and movement mode
    let biome = config.world.schedule.biome_at(sim.state.distance);
    if biome != sim.state.biome {
        debug!(tick, from = sim.state.biome.tag(), to = biome.tag(), "Biome changed");
        sim.push_event(GameEvent::biome_changed(tick, sim.state.biome, biome));
        sim.state.biome = biome;
    }
    update_movement_mode(sim, tick, now, config);

    // 3. Body physics
    let was_supported = sim.body.supported;
    sim.body.update(input, &config.physics);

    // 4. Scroll
    let speed = config.world.speed_at(sim.state.distance);
    sim.state.speed = speed;
    sim.state.distance += speed as f64 * config.world.distance_per_px;
    sim.world.scroll(speed);

    // 5. Spawn (distance and biome only, never effects or bonus)
    sim.generator.step(
        tick,
        sim.state.distance,
        speed,
        biome,
        biome.gravity(),
        &mut sim.world,
    );

    // 6. Collisions
    let invincible = sim.effects.is_invincible(now, &config.effects);
    let outcomes = resolve_collisions(
        &mut sim.body,
        &mut sim.world,
        invincible,
        &config.collision,
        &config.physics,
    );
    for outcome in outcomes {
        apply_outcome(sim, outcome, was_supported, now, config, &mut result);
    }

    result.events = sim.take_events();
    result
}

/// Pick mode and gravity from biome and active effects; switching teleports
/// the body.
fn update_movement_mode(sim: &mut Simulation, tick: u64, now: Millis, config: &SimConfig) {
    let biome = sim.state.biome;
    let gravity = if sim.effects.is_active(EffectKind::GravityFlip, now) {
        biome.gravity().flipped()
    } else {
        biome.gravity()
    };
    let mode = if sim.effects.is_active(EffectKind::Flight, now) || biome.mode() == MovementMode::Flight {
        MovementMode::Flight
    } else {
        MovementMode::walking(gravity)
    };

    if mode != sim.body.mode {
        sim.push_event(GameEvent::mode_changed(tick, sim.body.mode, mode));
    }
    sim.body.set_mode(mode, gravity, &config.physics);
    sim.state.mode = mode;
}

fn apply_outcome(
    sim: &mut Simulation,
    outcome: CollisionOutcome,
    was_supported: bool,
    now: Millis,
    config: &SimConfig,
    result: &mut TickResult,
) {
    // Nothing after elimination counts
    if sim.state.game_over {
        return;
    }
    let tick = sim.state.tick;

    match outcome {
        CollisionOutcome::Landed { platform_id } => {
            if !was_supported {
                sim.push_event(GameEvent::platform_landed(tick, platform_id));
            }
        }
        CollisionOutcome::Collected { pickup_id, kind: PickupKind::Coin } => {
            sim.state.bonus += config.collision.coin_value;
            sim.push_event(GameEvent::coin_collected(tick, pickup_id, config.collision.coin_value));
        }
        CollisionOutcome::Collected { pickup_id, kind: PickupKind::PowerUp(effect) } => {
            let expires_at = sim.effects.apply(effect, now, &config.effects);
            sim.push_event(GameEvent::powerup_collected(tick, pickup_id, effect, expires_at));
        }
        CollisionOutcome::Smashed { obstacle_id, kind } => {
            sim.state.bonus += config.collision.smash_bonus;
            sim.push_event(GameEvent::obstacle_smashed(tick, obstacle_id, kind, config.collision.smash_bonus));
        }
        CollisionOutcome::VortexTriggered { obstacle_id } => {
            sim.effects.apply(EffectKind::GravityFlip, now, &config.effects);
            sim.push_event(GameEvent::vortex_triggered(tick, obstacle_id));
        }
        CollisionOutcome::Eliminated { cause } => eliminate(sim, cause, result),
    }
}

/// End the run. Idempotent: only the first call has any effect.
fn eliminate(sim: &mut Simulation, cause: EliminationCause, result: &mut TickResult) {
    if sim.state.game_over {
        return;
    }
    sim.state.game_over = true;
    sim.state.running = false;

    let final_score = sim.state.whole_score();
    debug!(tick = sim.state.tick, ?cause, final_score, "Runner eliminated");
    sim.push_event(GameEvent::eliminated(sim.state.tick, cause, final_score));
    result.eliminated = true;
    result.final_score = Some(final_score);
}

/// Simulated clock reading for a tick, used when no real clock exists.
pub fn tick_time_ms(tick: u64, tick_rate: u32) -> Millis {
    tick * 1000 / u64::from(clamp_tick_rate(tick_rate))
}

/// Replay a seeded run from recorded inputs.
///
/// Time is derived from the tick number, so the result depends only on the
/// join code and the inputs. Missing inputs count as idle.
pub fn replay_run(
    join_code: &str,
    inputs: &[InputFrame],
    tick_count: u64,
    config: &SimConfig,
) -> (Simulation, Vec<GameEvent>) {
    let mut sim = Simulation::seeded(join_code, config);
    let mut all_events = Vec::new();

    for t in 0..tick_count {
        let input = inputs.get(t as usize).copied().unwrap_or_default();
        let now = tick_time_ms(t + 1, config.tick_rate);
        let result = tick(&mut sim, input, now, config);
        all_events.extend(result.events);

        if result.eliminated {
            break;
        }
    }

    (sim, all_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geom::Aabb;
    use crate::game::biome::Biome;
    use crate::game::collision::EliminationCause;
    use crate::game::events::GameEventData;
    use crate::game::physics::Gravity;
    use crate::game::state::{Anchor, Obstacle, ObstacleKind, Pickup};

    fn obstacle(id: u32, kind: ObstacleKind, x: f32) -> Obstacle {
        let (w, h) = kind.size();
        Obstacle { id: 1_000 + id, bounds: Aabb::new(x, 0.0, w, h), anchor: Anchor::Ground, kind, triggered: false }
    }

    fn jump_pattern(t: usize) -> InputFrame {
        if t % 45 == 0 {
            InputFrame::activate()
        } else {
            InputFrame::new()
        }
    }

    #[test]
    fn test_tick_determinism() {
        let config = SimConfig::default();
        let mut a = Simulation::seeded("ABCD", &config);
        let mut b = Simulation::seeded("ABCD", &config);

        for t in 0..600 {
            let now = tick_time_ms(t as u64, 60);
            tick(&mut a, jump_pattern(t), now, &config);
            tick(&mut b, jump_pattern(t), now, &config);
        }

        assert_eq!(a.state.tick, b.state.tick);
        assert_eq!(a.compute_hash(), b.compute_hash());
        assert_eq!(a.generator.spawn_digest(), b.generator.spawn_digest());
    }

    #[test]
    fn test_world_independent_of_frame_timing_and_bonus() {
        // Same ticks, different wall-clock readings and bonuses: same world
        let config = SimConfig::default();
        let mut a = Simulation::seeded("ABCD", &config);
        let mut b = Simulation::seeded("ABCD", &config);
        b.state.bonus = 500.0;
        b.effects.apply(EffectKind::Tiger, 0, &config.effects);

        for t in 0..400u64 {
            tick(&mut a, InputFrame::new(), t * 16, &config);
            tick(&mut b, InputFrame::new(), t * 40, &config);
            a.state.game_over = false;
            a.state.running = true;
            b.state.game_over = false;
            b.state.running = true;
        }

        let kinds = |s: &Simulation| -> Vec<_> { s.generator.spawn_log().iter().map(|r| (r.tick, r.kind)).collect() };
        assert_eq!(kinds(&a), kinds(&b));
    }

    #[test]
    fn test_two_overlaps_single_elimination() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.world.obstacles.push(obstacle(1, ObstacleKind::Small, 90.0));
        sim.world.obstacles.push(obstacle(2, ObstacleKind::Medium, 95.0));

        let result = tick(&mut sim, InputFrame::new(), 16, &config);
        assert!(result.eliminated);
        assert_eq!(result.events.iter().filter(|e| e.is_elimination()).count(), 1);
        assert!(sim.state.game_over);

        // Game-over guard: nothing further happens
        let tick_before = sim.state.tick;
        let again = tick(&mut sim, InputFrame::new(), 33, &config);
        assert!(!again.eliminated);
        assert!(again.events.is_empty());
        assert_eq!(sim.state.tick, tick_before);
    }

    #[test]
    fn test_tiger_smashes_for_bonus() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.effects.apply(EffectKind::Tiger, 0, &config.effects);
        sim.world.obstacles.push(obstacle(1, ObstacleKind::Tall, 90.0));

        let result = tick(&mut sim, InputFrame::new(), 100, &config);
        assert!(!result.eliminated);
        assert_eq!(sim.state.bonus, 50.0);
        assert!(sim.world.obstacles.iter().all(|o| o.id != 1_001));
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::ObstacleSmashed { .. })));
    }

    #[test]
    fn test_flight_grace_protects_after_powerup() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.effects.apply(EffectKind::Flight, 0, &config.effects);
        sim.world.obstacles.push(obstacle(1, ObstacleKind::Small, 90.0));

        // Nominal flight ended at 5000, grace lasts until 6000
        let result = tick(&mut sim, InputFrame::new(), 5_500, &config);
        assert!(!result.eliminated);
        assert_eq!(sim.state.mode, MovementMode::Normal);
    }

    #[test]
    fn test_powerup_switches_mode_next_tick() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.world.pickups.push(Pickup {
            id: 500,
            bounds: Aabb::new(90.0, 10.0, 28.0, 28.0),
            kind: PickupKind::PowerUp(EffectKind::Flight),
            collected: false,
        });

        let first = tick(&mut sim, InputFrame::new(), 10, &config);
        assert!(first
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::PowerUpCollected { effect: EffectKind::Flight, expires_at: 5_010, .. })));

        let second = tick(&mut sim, InputFrame::hold(), 26, &config);
        assert_eq!(sim.state.mode, MovementMode::Flight);
        assert!(second.events.iter().any(|e| matches!(
            e.data,
            GameEventData::ModeChanged { from: MovementMode::Normal, to: MovementMode::Flight }
        )));
    }

    #[test]
    fn test_coin_adds_bonus() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.world.pickups.push(Pickup {
            id: 501,
            bounds: Aabb::new(90.0, 10.0, 20.0, 20.0),
            kind: PickupKind::Coin,
            collected: false,
        });
        tick(&mut sim, InputFrame::new(), 10, &config);
        assert_eq!(sim.state.bonus, 10.0);
        assert!(sim.state.score() > 10.0);
    }

    #[test]
    fn test_vortex_flips_gravity() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.world.obstacles.push(Obstacle {
            id: 77,
            bounds: Aabb::new(90.0, 10.0, 46.0, 46.0),
            anchor: Anchor::Floating,
            kind: ObstacleKind::Vortex,
            triggered: false,
        });

        let result = tick(&mut sim, InputFrame::new(), 10, &config);
        assert!(!result.eliminated);
        assert!(sim.effects.is_active(EffectKind::GravityFlip, 11));

        tick(&mut sim, InputFrame::new(), 26, &config);
        assert_eq!(sim.body.gravity, Gravity::Up);
        assert_eq!(sim.state.mode, MovementMode::Inverted);
    }

    #[test]
    fn test_biome_change_switches_gravity() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.state.distance = 1_000.0;

        let result = tick(&mut sim, InputFrame::new(), 10, &config);
        assert_eq!(sim.state.biome, Biome::Mirror);
        assert_eq!(sim.body.gravity, Gravity::Up);
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::BiomeChanged { from: Biome::Plains, to: Biome::Mirror }
        )));
    }

    #[test]
    fn test_sky_floor_is_fatal() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.state.distance = 2_450.0;

        let mut cause = None;
        for t in 1..200u64 {
            let result = tick(&mut sim, InputFrame::new(), t * 16, &config);
            if result.eliminated {
                cause = result.events.iter().find_map(|e| match e.data {
                    GameEventData::Eliminated { cause, .. } => Some(cause),
                    _ => None,
                });
                break;
            }
        }
        assert_eq!(cause, Some(EliminationCause::FlightBoundary));
    }

    #[test]
    fn test_paused_tick_is_noop() {
        let config = SimConfig::default();
        let mut sim = Simulation::seeded("ABCD", &config);
        sim.set_running(false);
        tick(&mut sim, InputFrame::activate(), 10, &config);
        assert_eq!(sim.state.tick, 0);
        assert_eq!(sim.state.distance, 0.0);
    }

    #[test]
    fn test_score_never_decreases() {
        let config = SimConfig::default();
        let mut sim = Simulation::local_with_seed(&config, 3);
        let mut last = sim.state.score();
        for t in 0..1_000u64 {
            tick(&mut sim, jump_pattern(t as usize), t * 16, &config);
            assert!(sim.state.score() >= last);
            last = sim.state.score();
        }
    }

    #[test]
    fn test_replay_determinism() {
        let config = SimConfig::default();
        let inputs: Vec<InputFrame> = (0..900).map(jump_pattern).collect();

        let (final1, events1) = replay_run("QRST", &inputs, 900, &config);
        let (final2, events2) = replay_run("QRST", &inputs, 900, &config);

        assert_eq!(final1.compute_hash(), final2.compute_hash());
        assert_eq!(events1, events2);
    }
}
