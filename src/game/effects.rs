//! Timed Power-Up Effects
//!
//! Each effect category has at most one window, stored as an absolute expiry
//! time read from the injected clock. Re-collecting an active effect can only
//! move its expiry later, never earlier.
//!
//! Flight carries a grace period after its nominal end during which the
//! runner is still invincible, so dropping out of flight next to an obstacle
//! is survivable.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::core::time::Millis;

/// Effect category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EffectKind {
    /// Free flight, invincible
    Flight = 0,
    /// Smash through obstacles for bonus points
    Tiger = 1,
    /// Gravity reversed
    GravityFlip = 2,
}

/// Effect durations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Flight duration
    pub flight_ms: Millis,
    /// Invincibility after flight's nominal end
    pub flight_grace_ms: Millis,
    /// Tiger duration
    pub tiger_ms: Millis,
    /// Gravity flip duration
    pub gravity_flip_ms: Millis,
    /// Remaining time under which an effect is shown as expiring
    pub warning_ms: Millis,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            flight_ms: 5_000,
            flight_grace_ms: 1_000,
            tiger_ms: 6_000,
            gravity_flip_ms: 8_000,
            warning_ms: 1_500,
        }
    }
}

impl EffectConfig {
    /// Nominal duration of an effect.
    pub fn duration(&self, kind: EffectKind) -> Millis {
        match kind {
            EffectKind::Flight => self.flight_ms,
            EffectKind::Tiger => self.tiger_ms,
            EffectKind::GravityFlip => self.gravity_flip_ms,
        }
    }

    /// How long an expired window is kept around before being dropped.
    fn linger(&self, kind: EffectKind) -> Millis {
        match kind {
            EffectKind::Flight => self.flight_grace_ms,
            _ => 0,
        }
    }
}

/// Presentation view of one active effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectStatus {
    /// Category
    pub kind: EffectKind,
    /// Time until nominal expiry
    pub remaining_ms: Millis,
    /// About to run out
    pub warning: bool,
}

/// Per-category expiry windows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectScheduler {
    expiries: BTreeMap<EffectKind, Millis>,
}

impl EffectScheduler {
    /// No active effects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or extend an effect. Returns the resulting expiry.
    pub fn apply(&mut self, kind: EffectKind, now: Millis, config: &EffectConfig) -> Millis {
        let candidate = now.saturating_add(config.duration(kind));
        let expiry = self.expiries.entry(kind).or_insert(candidate);
        *expiry = (*expiry).max(candidate);
        *expiry
    }

    /// Absolute nominal expiry, if the category has a window.
    pub fn expiry(&self, kind: EffectKind) -> Option<Millis> {
        self.expiries.get(&kind).copied()
    }

    /// Is the effect within its nominal window?
    pub fn is_active(&self, kind: EffectKind, now: Millis) -> bool {
        self.expiry(kind).is_some_and(|t| now < t)
    }

    /// Time left in the nominal window.
    pub fn remaining(&self, kind: EffectKind, now: Millis) -> Option<Millis> {
        self.expiry(kind).filter(|t| now < *t).map(|t| t - now)
    }

    /// Active and close to running out?
    pub fn is_warning(&self, kind: EffectKind, now: Millis, config: &EffectConfig) -> bool {
        self.remaining(kind, now).is_some_and(|r| r <= config.warning_ms)
    }

    /// Obstacles cannot eliminate the runner.
    ///
    /// True while tiger or flight is active, and through flight's grace
    /// period after its nominal end.
    pub fn is_invincible(&self, now: Millis, config: &EffectConfig) -> bool {
        if self.is_active(EffectKind::Tiger, now) {
            return true;
        }
        self.expiry(EffectKind::Flight)
            .is_some_and(|t| now < t.saturating_add(config.flight_grace_ms))
    }

    /// Drop windows that are fully over and report which nominal windows
    /// ended.
    pub fn expire(&mut self, now: Millis, config: &EffectConfig) -> Vec<EffectKind> {
        let mut ended = Vec::new();
        self.expiries.retain(|kind, expiry| {
            let keep = now < expiry.saturating_add(config.linger(*kind));
            if !keep {
                ended.push(*kind);
            }
            keep
        });
        ended
    }

    /// Active effects in category order.
    pub fn status(&self, now: Millis, config: &EffectConfig) -> Vec<EffectStatus> {
        self.expiries
            .keys()
            .filter_map(|kind| {
                self.remaining(*kind, now).map(|remaining_ms| EffectStatus {
                    kind: *kind,
                    remaining_ms,
                    warning: remaining_ms <= config.warning_ms,
                })
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_apply_and_expire() {
        let config = EffectConfig::default();
        let mut effects = EffectScheduler::new();
        effects.apply(EffectKind::Tiger, 1_000, &config);

        assert!(effects.is_active(EffectKind::Tiger, 6_999));
        assert!(!effects.is_active(EffectKind::Tiger, 7_000));
        assert_eq!(effects.expire(7_000, &config), vec![EffectKind::Tiger]);
        assert_eq!(effects.expiry(EffectKind::Tiger), None);
    }

    #[test]
    fn test_recollect_never_shortens() {
        let config = EffectConfig { tiger_ms: 6_000, ..Default::default() };
        let mut effects = EffectScheduler::new();
        assert_eq!(effects.apply(EffectKind::Tiger, 0, &config), 6_000);
        assert_eq!(effects.apply(EffectKind::Tiger, 2_000, &config), 8_000);

        let shorter = EffectConfig { tiger_ms: 1_000, ..Default::default() };
        assert_eq!(effects.apply(EffectKind::Tiger, 3_000, &shorter), 8_000);
    }

    #[test]
    fn test_flight_grace_keeps_invincibility() {
        let config = EffectConfig::default();
        let mut effects = EffectScheduler::new();
        effects.apply(EffectKind::Flight, 0, &config);

        assert!(effects.is_active(EffectKind::Flight, 4_999));
        assert!(!effects.is_active(EffectKind::Flight, 5_000));
        assert!(effects.is_invincible(5_500, &config));
        assert!(!effects.is_invincible(6_000, &config));

        // Window lingers through grace, then is reported once
        assert!(effects.expire(5_500, &config).is_empty());
        assert_eq!(effects.expire(6_000, &config), vec![EffectKind::Flight]);
        assert!(effects.expire(6_001, &config).is_empty());
    }

    #[test]
    fn test_warning() {
        let config = EffectConfig::default();
        let mut effects = EffectScheduler::new();
        effects.apply(EffectKind::GravityFlip, 0, &config);

        assert!(!effects.is_warning(EffectKind::GravityFlip, 6_000, &config));
        assert!(effects.is_warning(EffectKind::GravityFlip, 6_500, &config));

        let status = effects.status(7_000, &config);
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].remaining_ms, 1_000);
        assert!(status[0].warning);
    }

    #[test]
    fn test_gravity_flip_not_invincible() {
        let config = EffectConfig::default();
        let mut effects = EffectScheduler::new();
        effects.apply(EffectKind::GravityFlip, 0, &config);
        assert!(!effects.is_invincible(10, &config));
    }

    proptest! {
        #[test]
        fn prop_expiry_monotonic(
            pickups in proptest::collection::vec((0u8..3, 0u64..20_000), 1..30)
        ) {
            let config = EffectConfig::default();
            let mut effects = EffectScheduler::new();
            let mut now = 0;
            let mut last = BTreeMap::new();
            for (kind, dt) in pickups {
                now += dt;
                let kind = match kind {
                    0 => EffectKind::Flight,
                    1 => EffectKind::Tiger,
                    _ => EffectKind::GravityFlip,
                };
                let expiry = effects.apply(kind, now, &config);
                prop_assert!(expiry >= now + config.duration(kind));
                if let Some(prev) = last.insert(kind, expiry) {
                    prop_assert!(expiry >= prev);
                }
            }
        }
    }
}
