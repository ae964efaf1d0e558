//! Game Configuration
//!
//! Every tunable in one serde aggregate. All sections default, so a partial
//! JSON file only needs the values it overrides:
//!
//! ```json
//! { "sim": { "tick_rate": 60, "physics": { "jump_velocity": 14.0 } }, "net": { "wire_format": "binary" } }
//! ```

use std::path::Path;

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::game::clock::ClockConfig;
use crate::game::tick::SimConfig;
use crate::network::bridge::NetConfig;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "RUNNER_CONFIG";

/// Complete client configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Simulation (physics, world, effects, collision)
    pub sim: SimConfig,
    /// Fixed-step clock
    pub clock: ClockConfig,
    /// Network bridge and session
    pub net: NetConfig,
}

impl GameConfig {
    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from `RUNNER_CONFIG` if set, otherwise defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Config loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Invalid JSON or field types.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::clock::SimulationClock;
    use crate::game::state::Simulation;
    use crate::network::protocol::WireFormat;

    #[test]
    fn test_partial_override() {
        let config = GameConfig::from_json(
            r#"{ "clock": { "max_frame_ms": 50 }, "net": { "wire_format": "binary" } }"#,
        )
        .unwrap();
        assert_eq!(config.clock.max_frame_ms, 50);
        assert_eq!(config.sim.tick_rate, 60);
        assert_eq!(config.net.wire_format, WireFormat::Binary);
        assert_eq!(config.net.broadcast_interval_ticks, 6);
        assert_eq!(config.sim, SimConfig::default());
    }

    #[test]
    fn test_shared_values_set_once() {
        let config = GameConfig::from_json(
            r#"{ "sim": { "tick_rate": 30, "physics": { "ceiling": 300.0 } } }"#,
        )
        .unwrap();
        let clock = SimulationClock::new(config.clock.clone(), config.sim.tick_rate);
        assert_eq!(clock.step_us(), 33_333);

        let sim = Simulation::seeded("ABCD", &config.sim);
        assert_eq!(sim.generator.ceiling(), 300.0);
        assert_eq!(sim.generator.tick_rate(), 30);

        // The old per-section copies are gone
        let json = config.to_json().unwrap();
        assert_eq!(json.matches("tick_rate").count(), 1);
        assert_eq!(json.matches("ceiling").count(), 1);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(GameConfig::from_json("{}").unwrap(), GameConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = GameConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(GameConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(GameConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            GameConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
