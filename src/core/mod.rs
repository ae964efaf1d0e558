//! Core deterministic primitives.
//!
//! Everything the simulation builds on: the seeded PRNG, world digests,
//! bounding boxes and the injected time source.

pub mod geom;
pub mod rng;
pub mod hash;
pub mod time;

// Re-export core types
pub use geom::Aabb;
pub use rng::{DeterministicRng, join_code_seed};
pub use hash::{StateHash, StateHasher, compute_state_hash};
pub use time::{Millis, TimeSource, SystemTimeSource, ManualTimeSource};
