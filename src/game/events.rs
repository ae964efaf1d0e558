//! Game Events
//!
//! Events generated during simulation for replay, presentation and the
//! network bridge.

use serde::{Serialize, Deserialize};

use crate::game::biome::Biome;
use crate::game::collision::EliminationCause;
use crate::game::effects::EffectKind;
use crate::game::physics::MovementMode;
use crate::game::state::ObstacleKind;

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Elimination first
    Elimination = 0,
    /// Then pickups and smashes
    Collection = 1,
    /// Then effect changes
    Effect = 2,
    /// Then biome/mode transitions
    Transition = 3,
    /// Lowest priority
    Other = 255,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Run ended
    Eliminated {
        /// What killed the runner
        cause: EliminationCause,
        /// Final score
        final_score: u64,
    },

    /// Coin picked up
    CoinCollected {
        /// Pickup id
        pickup_id: u32,
        /// Points granted
        points: f64,
    },

    /// Power-up picked up
    PowerUpCollected {
        /// Pickup id
        pickup_id: u32,
        /// Effect applied
        effect: EffectKind,
        /// Resulting absolute expiry
        expires_at: u64,
    },

    /// Obstacle destroyed while invincible
    ObstacleSmashed {
        /// Obstacle id
        obstacle_id: u32,
        /// Obstacle type
        kind: ObstacleKind,
        /// Points granted
        points: f64,
    },

    /// Vortex entered, gravity flip applied
    VortexTriggered {
        /// Obstacle id
        obstacle_id: u32,
    },

    /// Effect window ended
    EffectExpired {
        /// Effect category
        effect: EffectKind,
    },

    /// Landed on a platform from the air
    PlatformLanded {
        /// Platform id
        platform_id: u32,
    },

    /// Biome changed
    BiomeChanged {
        /// Previous biome
        from: Biome,
        /// New biome
        to: Biome,
    },

    /// Movement mode changed
    ModeChanged {
        /// Previous mode
        from: MovementMode,
        /// New mode
        to: MovementMode,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: GameEventData) -> Self {
        Self { tick, priority, data }
    }

    /// Create eliminated event.
    pub fn eliminated(tick: u64, cause: EliminationCause, final_score: u64) -> Self {
        Self::new(tick, EventPriority::Elimination, GameEventData::Eliminated { cause, final_score })
    }

    /// Create coin collected event.
    pub fn coin_collected(tick: u64, pickup_id: u32, points: f64) -> Self {
        Self::new(tick, EventPriority::Collection, GameEventData::CoinCollected { pickup_id, points })
    }

    /// Create power-up collected event.
    pub fn powerup_collected(tick: u64, pickup_id: u32, effect: EffectKind, expires_at: u64) -> Self {
        Self::new(
            tick,
            EventPriority::Collection,
            GameEventData::PowerUpCollected { pickup_id, effect, expires_at },
        )
    }

    /// Create obstacle smashed event.
    pub fn obstacle_smashed(tick: u64, obstacle_id: u32, kind: ObstacleKind, points: f64) -> Self {
        Self::new(
            tick,
            EventPriority::Collection,
            GameEventData::ObstacleSmashed { obstacle_id, kind, points },
        )
    }

    /// Create vortex triggered event.
    pub fn vortex_triggered(tick: u64, obstacle_id: u32) -> Self {
        Self::new(tick, EventPriority::Effect, GameEventData::VortexTriggered { obstacle_id })
    }

    /// Create effect expired event.
    pub fn effect_expired(tick: u64, effect: EffectKind) -> Self {
        Self::new(tick, EventPriority::Effect, GameEventData::EffectExpired { effect })
    }

    /// Create platform landed event.
    pub fn platform_landed(tick: u64, platform_id: u32) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::PlatformLanded { platform_id })
    }

    /// Create biome changed event.
    pub fn biome_changed(tick: u64, from: Biome, to: Biome) -> Self {
        Self::new(tick, EventPriority::Transition, GameEventData::BiomeChanged { from, to })
    }

    /// Create mode changed event.
    pub fn mode_changed(tick: u64, from: MovementMode, to: MovementMode) -> Self {
        Self::new(tick, EventPriority::Transition, GameEventData::ModeChanged { from, to })
    }

    /// Is this the run-ending event?
    pub fn is_elimination(&self) -> bool {
        matches!(self.data, GameEventData::Eliminated { .. })
    }
}

/// Sort events by tick, then priority. Stable, so insertion order breaks
/// remaining ties.
pub fn sort_events(events: &mut [GameEvent]) {
    events.sort_by_key(|e| (e.tick, e.priority));
}
