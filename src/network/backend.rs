//! Backend Abstraction
//!
//! The shared persistence + pub/sub service every client talks to. Sessions
//! and players are rows; each session has a change-notification stream and
//! a best-effort broadcast channel keyed by join code.
//!
//! [`InMemoryBackend`] implements the trait on tokio primitives for tests and
//! the demo binary.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::network::protocol::{
    ChangeNotification, PlayerId, PlayerRecord, PlayerUpdate, SessionId, SessionRecord,
    SessionStatus,
};

/// Backend errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No session with that id or code.
    #[error("Session not found")]
    SessionNotFound,

    /// No player with that id.
    #[error("Player not found")]
    PlayerNotFound,

    /// Join code already used by another session.
    #[error("Join code already in use: {0}")]
    DuplicateCode(String),

    /// Service unreachable or rejected the request.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Persistence and pub/sub service.
///
/// Write methods return the row as stored. Every write publishes a
/// [`ChangeNotification`] to the session's subscribers.
pub trait Backend: Send + Sync + 'static {
    /// Create a session in `WAITING` with the given join code.
    fn create_session(
        &self,
        code: &str,
        host_id: PlayerId,
    ) -> impl Future<Output = Result<SessionRecord, BackendError>> + Send;

    /// Look up a session by join code.
    fn find_session(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, BackendError>> + Send;

    /// Change a session's status.
    fn set_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> impl Future<Output = Result<SessionRecord, BackendError>> + Send;

    /// Add a player row.
    fn insert_player(
        &self,
        player: PlayerRecord,
    ) -> impl Future<Output = Result<PlayerRecord, BackendError>> + Send;

    /// Partially update a player row.
    fn update_player(
        &self,
        player_id: PlayerId,
        update: PlayerUpdate,
    ) -> impl Future<Output = Result<PlayerRecord, BackendError>> + Send;

    /// Set every player of a session alive with zero score.
    fn reset_players(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<PlayerRecord>, BackendError>> + Send;

    /// Remove a player row.
    fn delete_player(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// All players of a session, in id order.
    fn list_players(
        &self,
        session_id: SessionId,
    ) -> impl Future<Output = Result<Vec<PlayerRecord>, BackendError>> + Send;

    /// Subscribe to row changes of a session.
    fn subscribe_changes(&self, session_id: SessionId) -> broadcast::Receiver<ChangeNotification>;

    /// Sender half of a session's broadcast channel. Delivery is best effort.
    fn channel(&self, code: &str) -> broadcast::Sender<Vec<u8>>;
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Process-local backend.
pub struct InMemoryBackend {
    sessions: RwLock<BTreeMap<SessionId, SessionRecord>>,
    players: RwLock<BTreeMap<PlayerId, PlayerRecord>>,
    changes: Mutex<BTreeMap<SessionId, broadcast::Sender<ChangeNotification>>>,
    channels: Mutex<BTreeMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
    offline: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend. `capacity` bounds each broadcast queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            players: RwLock::new(BTreeMap::new()),
            changes: Mutex::new(BTreeMap::new()),
            channels: Mutex::new(BTreeMap::new()),
            capacity: capacity.max(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every read and write fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("offline".into()));
        }
        Ok(())
    }

    fn change_sender(&self, session_id: SessionId) -> broadcast::Sender<ChangeNotification> {
        let mut changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        changes
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn publish(&self, session_id: SessionId, change: ChangeNotification) {
        // No subscribers is fine
        let _ = self.change_sender(session_id).send(change);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Backend for InMemoryBackend {
    async fn create_session(&self, code: &str, host_id: PlayerId) -> Result<SessionRecord, BackendError> {
        self.check_online()?;
        let mut sessions = self.sessions.write().await;
        if sessions.values().any(|s| s.code == code) {
            return Err(BackendError::DuplicateCode(code.to_string()));
        }
        let record = SessionRecord {
            id: Uuid::new_v4(),
            code: code.to_string(),
            status: SessionStatus::Waiting,
            host_id,
            created_at: Utc::now(),
        };
        sessions.insert(record.id, record.clone());
        debug!(code, session = %record.id, "Session created");
        Ok(record)
    }

    async fn find_session(&self, code: &str) -> Result<Option<SessionRecord>, BackendError> {
        self.check_online()?;
        let sessions = self.sessions.read().await;
        Ok(sessions.values().find(|s| s.code == code).cloned())
    }

    async fn set_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<SessionRecord, BackendError> {
        self.check_online()?;
        let record = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(&session_id).ok_or(BackendError::SessionNotFound)?;
            session.status = status;
            session.clone()
        };
        self.publish(session_id, ChangeNotification::SessionUpdated { session: record.clone() });
        Ok(record)
    }

    async fn insert_player(&self, player: PlayerRecord) -> Result<PlayerRecord, BackendError> {
        self.check_online()?;
        if !self.sessions.read().await.contains_key(&player.session_id) {
            return Err(BackendError::SessionNotFound);
        }
        self.players.write().await.insert(player.id, player.clone());
        self.publish(player.session_id, ChangeNotification::PlayerInserted { player: player.clone() });
        Ok(player)
    }

    async fn update_player(&self, player_id: PlayerId, update: PlayerUpdate) -> Result<PlayerRecord, BackendError> {
        self.check_online()?;
        let record = {
            let mut players = self.players.write().await;
            let player = players.get_mut(&player_id).ok_or(BackendError::PlayerNotFound)?;
            update.apply_to(player);
            player.clone()
        };
        self.publish(record.session_id, ChangeNotification::PlayerUpdated { player: record.clone() });
        Ok(record)
    }

    async fn reset_players(&self, session_id: SessionId) -> Result<Vec<PlayerRecord>, BackendError> {
        self.check_online()?;
        let reset: Vec<PlayerRecord> = {
            let mut players = self.players.write().await;
            players
                .values_mut()
                .filter(|p| p.session_id == session_id)
                .map(|p| {
                    p.score = 0;
                    p.is_alive = true;
                    p.clone()
                })
                .collect()
        };
        for player in &reset {
            self.publish(session_id, ChangeNotification::PlayerUpdated { player: player.clone() });
        }
        Ok(reset)
    }

    async fn delete_player(&self, player_id: PlayerId) -> Result<(), BackendError> {
        self.check_online()?;
        let removed = self.players.write().await.remove(&player_id);
        match removed {
            Some(record) => {
                self.publish(record.session_id, ChangeNotification::PlayerDeleted { player_id });
                Ok(())
            }
            None => Err(BackendError::PlayerNotFound),
        }
    }

    async fn list_players(&self, session_id: SessionId) -> Result<Vec<PlayerRecord>, BackendError> {
        self.check_online()?;
        let players = self.players.read().await;
        Ok(players.values().filter(|p| p.session_id == session_id).cloned().collect())
    }

    fn subscribe_changes(&self, session_id: SessionId) -> broadcast::Receiver<ChangeNotification> {
        self.change_sender(session_id).subscribe()
    }

    fn channel(&self, code: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(code.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}
