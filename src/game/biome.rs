//! Biome Schedule
//!
//! Biomes are a pure function of distance travelled, so every client with the
//! same distance agrees on the biome. Each biome fixes the movement mode and
//! gravity, the reaction time used to size spawn gaps, and a spawn table.

use serde::{Serialize, Deserialize};

use crate::game::effects::EffectKind;
use crate::game::physics::{Gravity, MovementMode};
use crate::game::state::ObstacleKind;

/// Visual and rule theme for a stretch of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    /// Floor gravity, standard obstacles and platforms
    #[default]
    Plains = 0,
    /// Ceiling gravity, everything mirrored
    Mirror = 1,
    /// Forced flight through paired pillars
    Sky = 2,
}

impl Biome {
    /// Movement mode this biome imposes.
    pub fn mode(self) -> MovementMode {
        match self {
            Biome::Plains => MovementMode::Normal,
            Biome::Mirror => MovementMode::Inverted,
            Biome::Sky => MovementMode::Flight,
        }
    }

    /// Base gravity direction (before any gravity-flip effect).
    pub fn gravity(self) -> Gravity {
        match self {
            Biome::Mirror => Gravity::Up,
            Biome::Plains | Biome::Sky => Gravity::Down,
        }
    }

    /// Reaction time in seconds used for the minimum spawn gap.
    pub fn reaction_secs(self) -> f32 {
        match self {
            Biome::Plains => 0.45,
            Biome::Mirror => 0.6,
            Biome::Sky => 0.7,
        }
    }

    /// Spawn table for this biome.
    pub fn spawn_table(self) -> &'static SpawnTable {
        match self {
            Biome::Plains => &PLAINS_TABLE,
            Biome::Mirror => &MIRROR_TABLE,
            Biome::Sky => &SKY_TABLE,
        }
    }

    /// Short tag for logs.
    pub fn tag(self) -> &'static str {
        match self {
            Biome::Plains => "plains",
            Biome::Mirror => "mirror",
            Biome::Sky => "sky",
        }
    }
}

// =============================================================================
// SPAWN TABLES
// =============================================================================

/// Weighted spawn choices for one biome.
#[derive(Debug)]
pub struct SpawnTable {
    /// Obstacle kinds and their weights
    pub obstacles: &'static [(ObstacleKind, u32)],
    /// Chance that a platform accompanies a spawn
    pub platform_chance: f32,
    /// Chance that a power-up accompanies a spawn
    pub powerup_chance: f32,
    /// Power-up kinds and their weights
    pub powerups: &'static [(EffectKind, u32)],
}

static PLAINS_TABLE: SpawnTable = SpawnTable {
    obstacles: &[
        (ObstacleKind::Small, 5),
        (ObstacleKind::Medium, 4),
        (ObstacleKind::Tall, 2),
        (ObstacleKind::Vortex, 1),
    ],
    platform_chance: 0.35,
    powerup_chance: 0.12,
    powerups: &[
        (EffectKind::Flight, 3),
        (EffectKind::Tiger, 3),
        (EffectKind::GravityFlip, 2),
    ],
};

static MIRROR_TABLE: SpawnTable = SpawnTable {
    obstacles: &[
        (ObstacleKind::Small, 5),
        (ObstacleKind::Medium, 4),
        (ObstacleKind::Tall, 1),
        (ObstacleKind::Vortex, 1),
    ],
    platform_chance: 0.3,
    powerup_chance: 0.1,
    powerups: &[
        (EffectKind::Flight, 2),
        (EffectKind::Tiger, 3),
    ],
};

static SKY_TABLE: SpawnTable = SpawnTable {
    obstacles: &[(ObstacleKind::Pillar, 1)],
    platform_chance: 0.0,
    powerup_chance: 0.08,
    powerups: &[(EffectKind::Tiger, 1)],
};

/// Pick from a weighted table with a roll in `[0, 1)`.
///
/// Returns `None` only for an empty or zero-weight table.
pub fn pick_weighted<T: Copy>(roll: f32, table: &[(T, u32)]) -> Option<T> {
    let total: u32 = table.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return None;
    }
    let target = ((roll.clamp(0.0, 1.0) * total as f32) as u32).min(total - 1);
    let mut acc = 0;
    for (item, weight) in table {
        acc += weight;
        if target < acc {
            return Some(*item);
        }
    }
    table.last().map(|(item, _)| *item)
}

// =============================================================================
// SCHEDULE
// =============================================================================

/// Distance-driven biome rotation.
///
/// The first `intro_distance` is always Plains. After that the run walks
/// through `cycle` in fixed-length segments, wrapping around.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeSchedule {
    /// Plains-only opening stretch
    pub intro_distance: f64,
    /// Length of each following segment
    pub segment_distance: f64,
    /// Segment rotation
    pub cycle: Vec<Biome>,
}

impl Default for BiomeSchedule {
    fn default() -> Self {
        Self {
            intro_distance: 1000.0,
            segment_distance: 700.0,
            cycle: vec![Biome::Mirror, Biome::Plains, Biome::Sky, Biome::Plains],
        }
    }
}

impl BiomeSchedule {
    /// Biome at a given distance.
    pub fn biome_at(&self, distance: f64) -> Biome {
        if distance < self.intro_distance || self.cycle.is_empty() || self.segment_distance <= 0.0 {
            return Biome::Plains;
        }
        let segment = ((distance - self.intro_distance) / self.segment_distance) as usize;
        self.cycle[segment % self.cycle.len()]
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_progression() {
        let schedule = BiomeSchedule::default();
        assert_eq!(schedule.biome_at(0.0), Biome::Plains);
        assert_eq!(schedule.biome_at(999.0), Biome::Plains);
        assert_eq!(schedule.biome_at(1000.0), Biome::Mirror);
        assert_eq!(schedule.biome_at(1699.0), Biome::Mirror);
        assert_eq!(schedule.biome_at(1700.0), Biome::Plains);
        assert_eq!(schedule.biome_at(2400.0), Biome::Sky);
        assert_eq!(schedule.biome_at(3100.0), Biome::Plains);
        assert_eq!(schedule.biome_at(3800.0), Biome::Mirror);
    }

    #[test]
    fn test_empty_cycle_stays_plains() {
        let schedule = BiomeSchedule { cycle: vec![], ..Default::default() };
        assert_eq!(schedule.biome_at(50_000.0), Biome::Plains);
    }

    #[test]
    fn test_biome_rules() {
        assert_eq!(Biome::Mirror.mode(), MovementMode::Inverted);
        assert_eq!(Biome::Mirror.gravity(), Gravity::Up);
        assert_eq!(Biome::Sky.mode(), MovementMode::Flight);
        assert!(Biome::Sky.reaction_secs() > Biome::Plains.reaction_secs());
        assert_eq!(Biome::Sky.spawn_table().platform_chance, 0.0);
    }

    #[test]
    fn test_pick_weighted() {
        let table = [("a", 1), ("b", 3)];
        assert_eq!(pick_weighted(0.0, &table), Some("a"));
        assert_eq!(pick_weighted(0.24, &table), Some("a"));
        assert_eq!(pick_weighted(0.26, &table), Some("b"));
        assert_eq!(pick_weighted(0.9999, &table), Some("b"));
        assert_eq!(pick_weighted(1.0, &table), Some("b"));

        let empty: [(u8, u32); 0] = [];
        assert_eq!(pick_weighted(0.5, &empty), None);
    }
}
