//! World Digests
//!
//! SHA-256 digests used to compare two clients' worlds and to check that a
//! replay reproduces a run bit for bit.

use sha2::{Sha256, Digest};

/// SHA-256 digest.
pub type StateHash = [u8; 32];

/// Domain tag for whole-simulation digests.
const SIMULATION_DOMAIN: &[u8] = b"RUNNER_SYNC_STATE_V1";
/// Domain tag for spawn-log digests.
const SPAWN_LOG_DOMAIN: &[u8] = b"RUNNER_SYNC_SPAWNS_V1";

/// Field-by-field SHA-256 over simulation values.
///
/// Integers are fed little-endian and floats by bit pattern, so the digest
/// only matches when values are bit-identical. Feed fields in a fixed order.
pub struct StateHasher {
    inner: Sha256,
}

macro_rules! le_update {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Feed a `", stringify!($ty), "`.")]
            #[inline]
            pub fn $name(&mut self, value: $ty) {
                self.inner.update(value.to_le_bytes());
            }
        )*
    };
}

impl StateHasher {
    /// Hasher prefixed with a domain tag.
    pub fn new(domain: &[u8]) -> Self {
        Self { inner: Sha256::new_with_prefix(domain) }
    }

    /// Hasher for [`crate::game::state::Simulation::compute_hash`].
    pub fn for_simulation() -> Self {
        Self::new(SIMULATION_DOMAIN)
    }

    /// Hasher for a spawn history.
    pub fn for_spawn_log() -> Self {
        Self::new(SPAWN_LOG_DOMAIN)
    }

    le_update!(update_u8: u8, update_u32: u32, update_u64: u64);

    /// Feed raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Feed an `f32` by bit pattern.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// Feed an `f64` by bit pattern.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.update_u64(value.to_bits());
    }

    /// Feed a flag as one byte.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(u8::from(value));
    }

    /// Finish the digest.
    pub fn finalize(self) -> StateHash {
        self.inner.finalize().into()
    }
}

/// Simulation digest: tick and seed first, then whatever `add_state` feeds.
pub fn compute_state_hash<F>(tick: u64, seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_simulation();
    hasher.update_u64(tick);
    hasher.update_u64(seed);
    add_state(&mut hasher);
    hasher.finalize()
}

/// First 12 hex digits of a digest, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

// =============================================================================
// TESTS
// =============================================================================
