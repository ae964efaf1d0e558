//! Seeded Random Streams
//!
//! Xorshift128+ seeded through SplitMix64. The simulation never keeps one
//! long-lived stream: [`DeterministicRng::for_tick`] derives a fresh stream
//! from `(seed, tick)`, so two clients that agree on the join code and the
//! tick number draw the same values no matter what happened on earlier ticks.

use serde::{Serialize, Deserialize};

/// Odd multiplier that spreads tick numbers across the seed space.
const TICK_MIX: u64 = 0xD1B5_4A32_D192_ED03;

/// Xorshift128+ generator.
///
/// ```
/// use runner_sync::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::for_tick(42, 7);
/// let mut b = DeterministicRng::for_tick(42, 7);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    s0: u64,
    s1: u64,
}

impl DeterministicRng {
    /// Stream for a raw seed. Weak seeds (small hashes) are expanded by
    /// SplitMix64; the all-zero state is never produced.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let s0 = splitmix64(&mut sm);
        let s1 = splitmix64(&mut sm);
        if s0 | s1 == 0 {
            Self { s0: 1, s1: 1 }
        } else {
            Self { s0, s1 }
        }
    }

    /// Stream for one simulation tick.
    pub fn for_tick(seed: u64, tick: u64) -> Self {
        let mut sm = seed ^ tick.wrapping_mul(TICK_MIX);
        Self::new(splitmix64(&mut sm))
    }

    /// Stream seeded from a join code.
    pub fn from_join_code(code: &str) -> Self {
        Self::new(join_code_seed(code))
    }

    /// Next raw value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let (a, b) = (self.s0, self.s1);
        let out = a.wrapping_add(b);
        let x = a ^ b;
        self.s0 = a.rotate_left(24) ^ x ^ (x << 16);
        self.s1 = x.rotate_left(37);
        out
    }

    /// Uniform `f32` in `[0, 1)` from the top 24 bits, so every value is
    /// exactly representable.
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u32 << 24) as f32;
        (self.next_u64() >> 40) as f32 * SCALE
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Numeric seed for a join code.
///
/// `h = h * 31 + c` over wrapping `i32`, then the magnitude. Any string is
/// accepted; the empty code seeds 0.
pub fn join_code_seed(code: &str) -> u64 {
    let hash = code
        .chars()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32));
    u64::from(hash.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DeterministicRng::new(12345);
        let mut b = DeterministicRng::new(12345);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(DeterministicRng::new(1).next_u64(), DeterministicRng::new(2).next_u64());
    }

    #[test]
    fn test_tick_stream_ignores_history() {
        let mut first = DeterministicRng::for_tick(77, 500);
        for t in 0..500 {
            DeterministicRng::for_tick(77, t).next_u64();
        }
        let mut again = DeterministicRng::for_tick(77, 500);
        assert_eq!(first.next_u64(), again.next_u64());

        let t1 = DeterministicRng::for_tick(77, 1).next_u64();
        let t2 = DeterministicRng::for_tick(77, 2).next_u64();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_unit_interval() {
        let mut rng = DeterministicRng::new(9999);
        for _ in 0..1000 {
            assert!((0.0..1.0).contains(&rng.next_unit()));
        }
    }

    #[test]
    fn test_join_code_seed() {
        assert_eq!(join_code_seed("A"), 65);
        assert_eq!(join_code_seed("AB"), 65 * 31 + 66);
        assert_eq!(join_code_seed(""), 0);
        assert_ne!(join_code_seed("ABCD"), join_code_seed("ABCE"));

        // Overflowing and non-ASCII input still hashes
        let long = "ZZZZ".repeat(500);
        let _ = join_code_seed(&long);
        let _ = join_code_seed("çà-🦀");
    }

    proptest! {
        #[test]
        fn prop_any_code_yields_usable_stream(code in ".{0,16}") {
            let mut a = DeterministicRng::from_join_code(&code);
            let mut b = DeterministicRng::from_join_code(&code);
            for _ in 0..8 {
                prop_assert_eq!(a.next_u64(), b.next_u64());
            }
        }
    }
}
