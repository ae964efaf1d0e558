//! Protocol Types
//!
//! Persisted records, broadcast snapshots and change notifications exchanged
//! with the backend. Snapshots are JSON by default for debugging ease, with
//! an optional compact binary (bincode) encoding.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Unique player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// From raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// First 8 hex chars, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique session identifier.
pub type SessionId = Uuid;

// =============================================================================
// PERSISTED RECORDS
// =============================================================================

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Lobby; players may join
    Waiting,
    /// Round in progress
    Playing,
}

/// Persisted session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier
    pub id: SessionId,
    /// Join code (also the world seed)
    pub code: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Player that created the session
    pub host_id: PlayerId,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Persisted player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Player identifier
    pub id: PlayerId,
    /// Owning session
    pub session_id: SessionId,
    /// Display name
    pub pseudo: String,
    /// Avatar tag
    pub avatar: String,
    /// Last persisted score
    pub score: u64,
    /// Still running this round
    pub is_alive: bool,
    /// Join time
    pub joined_at: DateTime<Utc>,
}

impl PlayerRecord {
    /// New alive player with zero score.
    pub fn new(id: PlayerId, session_id: SessionId, pseudo: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id,
            session_id,
            pseudo: pseudo.into(),
            avatar: avatar.into(),
            score: 0,
            is_alive: true,
            joined_at: Utc::now(),
        }
    }
}

/// Partial player update. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    /// New score
    pub score: Option<u64>,
    /// New alive flag
    pub is_alive: Option<bool>,
}

impl PlayerUpdate {
    /// Periodic score write.
    pub fn score(score: u64) -> Self {
        Self { score: Some(score), is_alive: None }
    }

    /// Final write on elimination.
    pub fn eliminated(final_score: u64) -> Self {
        Self { score: Some(final_score), is_alive: Some(false) }
    }

    /// Apply onto a record.
    pub fn apply_to(&self, record: &mut PlayerRecord) {
        if let Some(score) = self.score {
            record.score = score;
        }
        if let Some(alive) = self.is_alive {
            record.is_alive = alive;
        }
    }
}

/// Row-level change pushed to subscribers of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeNotification {
    /// Session row changed
    SessionUpdated {
        /// New row
        session: SessionRecord,
    },
    /// Player joined
    PlayerInserted {
        /// New row
        player: PlayerRecord,
    },
    /// Player row changed
    PlayerUpdated {
        /// New row
        player: PlayerRecord,
    },
    /// Player left
    PlayerDeleted {
        /// Removed player
        player_id: PlayerId,
    },
}

// =============================================================================
// BROADCAST SNAPSHOT
// =============================================================================

/// Snapshot encoding on the broadcast channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// camelCase JSON
    #[default]
    Json,
    /// Compact bincode
    Binary,
}

/// Lightweight per-player state shared with peers for ghost rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSnapshot {
    /// Sender
    pub id: PlayerId,
    /// Display name
    pub pseudo: String,
    /// Avatar tag
    pub avatar: String,
    /// Vertical position
    pub y: f32,
    /// Airborne
    pub is_jumping: bool,
    /// Gravity currently toward the ceiling
    pub is_gravity_inverted: bool,
    /// Eliminated
    pub is_dead: bool,
    /// Sender's simulation tick, used only for divergence logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
}

/// Fixed-layout binary form. Flags are packed into one byte.
#[derive(Serialize, Deserialize)]
struct CompactSnapshot {
    id: [u8; 16],
    pseudo: String,
    avatar: String,
    y: f32,
    flags: u8,
    tick: Option<u64>,
}

const FLAG_JUMPING: u8 = 0x01;
const FLAG_INVERTED: u8 = 0x02;
const FLAG_DEAD: u8 = 0x04;

impl BroadcastSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut flags = 0;
        if self.is_jumping {
            flags |= FLAG_JUMPING;
        }
        if self.is_gravity_inverted {
            flags |= FLAG_INVERTED;
        }
        if self.is_dead {
            flags |= FLAG_DEAD;
        }
        bincode::serialize(&CompactSnapshot {
            id: *self.id.as_bytes(),
            pseudo: self.pseudo.clone(),
            avatar: self.avatar.clone(),
            y: self.y,
            flags,
            tick: self.tick,
        })
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        let c: CompactSnapshot = bincode::deserialize(data)?;
        Ok(Self {
            id: PlayerId::from_bytes(c.id),
            pseudo: c.pseudo,
            avatar: c.avatar,
            y: c.y,
            is_jumping: c.flags & FLAG_JUMPING != 0,
            is_gravity_inverted: c.flags & FLAG_INVERTED != 0,
            is_dead: c.flags & FLAG_DEAD != 0,
            tick: c.tick,
        })
    }

    /// Encode in the given wire format.
    pub fn encode(&self, format: WireFormat) -> Result<Vec<u8>, WireError> {
        match format {
            WireFormat::Json => Ok(self.to_json()?.into_bytes()),
            WireFormat::Binary => Ok(self.to_bytes()?),
        }
    }

    /// Decode from the given wire format.
    pub fn decode(data: &[u8], format: WireFormat) -> Result<Self, WireError> {
        match format {
            WireFormat::Json => Ok(serde_json::from_slice(data)?),
            WireFormat::Binary => Ok(Self::from_bytes(data)?),
        }
    }
}

/// Snapshot codec errors.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// JSON failure.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary failure.
    #[error("Binary codec error: {0}")]
    Binary(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BroadcastSnapshot {
        BroadcastSnapshot {
            id: PlayerId::from_bytes([7; 16]),
            pseudo: "ada".into(),
            avatar: "fox".into(),
            y: 42.5,
            is_jumping: true,
            is_gravity_inverted: false,
            is_dead: false,
            tick: None,
        }
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let json = snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["avatar", "id", "isDead", "isGravityInverted", "isJumping", "pseudo", "y"]
        );
        assert_eq!(obj["isJumping"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_snapshot_tick_optional() {
        let mut s = snapshot();
        s.tick = Some(360);
        let json = s.to_json().unwrap();
        assert!(json.contains("\"tick\":360"));

        // Peers that never send a tick still parse
        let legacy = r#"{"id":"07070707-0707-0707-0707-070707070707","pseudo":"ada","avatar":"fox","y":1.0,"isJumping":false,"isGravityInverted":true,"isDead":false}"#;
        let parsed = BroadcastSnapshot::from_json(legacy).unwrap();
        assert_eq!(parsed.tick, None);
        assert!(parsed.is_gravity_inverted);
    }

    #[test]
    fn test_binary_snapshot() {
        let mut s = snapshot();
        s.is_dead = true;
        s.tick = Some(12);
        let bytes = s.encode(WireFormat::Binary).unwrap();
        assert_eq!(BroadcastSnapshot::decode(&bytes, WireFormat::Binary).unwrap(), s);
        assert!(bytes.len() < s.encode(WireFormat::Json).unwrap().len());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            BroadcastSnapshot::decode(b"not json", WireFormat::Json),
            Err(WireError::Json(_))
        ));
        assert!(BroadcastSnapshot::decode(&[1, 2], WireFormat::Binary).is_err());
    }

    #[test]
    fn test_session_status_wire_names() {
        assert_eq!(serde_json::to_string(&SessionStatus::Waiting).unwrap(), "\"WAITING\"");
        assert_eq!(serde_json::to_string(&SessionStatus::Playing).unwrap(), "\"PLAYING\"");
    }

    #[test]
    fn test_player_update_apply() {
        let mut record = PlayerRecord::new(PlayerId::new_v4(), Uuid::new_v4(), "bo", "cat");
        PlayerUpdate::score(120).apply_to(&mut record);
        assert_eq!(record.score, 120);
        assert!(record.is_alive);

        PlayerUpdate::eliminated(150).apply_to(&mut record);
        assert_eq!(record.score, 150);
        assert!(!record.is_alive);
    }
}
