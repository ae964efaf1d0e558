//! Game Logic Module
//!
//! All game simulation code. Deterministic for a given seed, input stream
//! and clock readings.
//!
//! ## Module Structure
//!
//! - `input`: Input frames and press latching
//! - `clock`: Fixed-timestep accumulator
//! - `physics`: Runner body and movement modes
//! - `biome`: Distance-driven biome schedule and spawn tables
//! - `world`: Procedural spawner and spawn sources
//! - `collision`: Collision detection and resolution
//! - `effects`: Timed power-up windows
//! - `state`: Simulation state and entities
//! - `tick`: Per-step simulation loop and replay
//! - `events`: Game events for replay/presentation

pub mod input;
pub mod clock;
pub mod physics;
pub mod biome;
pub mod world;
pub mod collision;
pub mod effects;
pub mod state;
pub mod tick;
pub mod events;

// Re-export key types
pub use input::{InputFrame, InputLatch};
pub use clock::{ClockConfig, FrameSteps, SimulationClock};
pub use physics::{Gravity, MovementMode, PhysicsBody, PhysicsConfig};
pub use biome::{Biome, BiomeSchedule};
pub use world::{SpawnKind, SpawnRecord, SpawnSource, WorldConfig, WorldGenerator};
pub use collision::{CollisionConfig, CollisionOutcome, EliminationCause};
pub use effects::{EffectConfig, EffectKind, EffectScheduler};
pub use state::{Simulation, SimulationState, WorldEntities};
pub use tick::{SimConfig, TickResult, tick, replay_run};
pub use events::{GameEvent, GameEventData};
