//! # Runner Sync
//!
//! Deterministic endless-runner simulation with seed-synchronised multiplayer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RUNNER SYNC                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ PRNG, join-code hash         │
//! │  ├── hash.rs     - State and spawn-log digests               │
//! │  ├── geom.rs     - Axis-aligned boxes                        │
//! │  └── time.rs     - Injected time sources                     │
//! │                                                              │
//! │  game/           - Simulation (deterministic per seed)       │
//! │  ├── clock.rs    - Fixed-timestep accumulator                │
//! │  ├── physics.rs  - Runner body and movement modes            │
//! │  ├── biome.rs    - Distance-driven biome schedule            │
//! │  ├── world.rs    - Procedural spawner                        │
//! │  ├── collision.rs- Collision resolution                      │
//! │  ├── effects.rs  - Timed power-up windows                    │
//! │  └── tick.rs     - Per-step orchestration and replay         │
//! │                                                              │
//! │  network/        - Sessions (non-deterministic)              │
//! │  ├── protocol.rs - Records, snapshots, wire codec            │
//! │  ├── backend.rs  - Persistence and pub/sub seam              │
//! │  ├── bridge.rs   - Per-client broadcast and persistence      │
//! │  └── coordinator.rs - Host lifecycle                         │
//! │                                                              │
//! │  client.rs       - Clock + simulation + bridge, headless     │
//! │  config.rs       - JSON configuration                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Every client of a session seeds its spawner from the join code and reseeds
//! it each tick, so two clients produce the same world regardless of frame
//! timing, input or bonus score:
//! - Spawning reads only tick, distance and biome
//! - No HashMap in game state (BTreeMap for sorted iteration)
//! - Wall time enters only through the injected `TimeSource`
//!
//! Clients never exchange simulation state. Peers appear as read-only ghosts.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod client;
pub mod config;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::time::{Millis, TimeSource, SystemTimeSource, ManualTimeSource};
pub use game::input::{InputFrame, InputLatch};
pub use game::state::{Simulation, SimulationState};
pub use game::tick::{SimConfig, TickResult};
pub use network::protocol::{PlayerId, SessionStatus};
pub use client::{FrameReport, GameClient};
pub use config::{ConfigError, GameConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
