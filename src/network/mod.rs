//! Network Layer
//!
//! Session lifecycle, persistence and peer snapshots.
//! This layer is **non-deterministic** - all game logic runs through `game/`.
//! Nothing received here is ever fed back into a simulation.

pub mod protocol;
pub mod backend;
pub mod bridge;
pub mod coordinator;

pub use protocol::{
    BroadcastSnapshot, ChangeNotification, PlayerId, PlayerRecord, PlayerUpdate,
    SessionId, SessionRecord, SessionStatus, WireError, WireFormat,
};
pub use backend::{Backend, BackendError, InMemoryBackend};
pub use bridge::{BridgeEvent, ClientPhase, LocalPlayer, NetConfig, NetworkBridge, OpponentGhost};
pub use coordinator::{generate_join_code, SessionCoordinator, SessionError, JOIN_CODE_ALPHABET};
