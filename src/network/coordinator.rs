//! Session Coordinator
//!
//! Host-side session lifecycle:
//!
//! 1. **Create**: pick a free join code, session starts WAITING
//! 2. **Start**: WAITING -> PLAYING once at least one player has joined
//! 3. **Round over**: every player row reports `is_alive == false`
//! 4. **Reset**: revive every player with score 0, then PLAYING -> WAITING
//!
//! The coordinator keeps a local mirror of the player rows, fed by the
//! backend's change stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::network::backend::{Backend, BackendError};
use crate::network::bridge::{LocalPlayer, NetConfig};
use crate::network::protocol::{ChangeNotification, PlayerId, PlayerRecord, SessionRecord, SessionStatus};

/// Join code characters. Ambiguous glyphs (0/O, 1/I) are left out.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Attempts to find an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Random join code of `len` characters.
pub fn generate_join_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Host-side lifecycle driver for one session.
pub struct SessionCoordinator<B: Backend> {
    backend: Arc<B>,
    host: LocalPlayer,
    config: NetConfig,
    session: Option<SessionRecord>,
    players: BTreeMap<PlayerId, PlayerRecord>,
    changes_rx: Option<broadcast::Receiver<ChangeNotification>>,
    stale: bool,
}

impl<B: Backend> SessionCoordinator<B> {
    /// Create a coordinator for `host`.
    pub fn new(backend: Arc<B>, host: LocalPlayer, config: NetConfig) -> Self {
        Self {
            backend,
            host,
            config,
            session: None,
            players: BTreeMap::new(),
            changes_rx: None,
            stale: false,
        }
    }

    /// Create a WAITING session under a fresh join code.
    pub async fn create_session(&mut self) -> Result<SessionRecord, SessionError> {
        for attempt in 0..MAX_CODE_ATTEMPTS {
            let code = generate_join_code(&mut rand::thread_rng(), self.config.join_code_length);
            match self.backend.create_session(&code, self.host.id).await {
                Ok(session) => {
                    self.changes_rx = Some(self.backend.subscribe_changes(session.id));
                    self.players.clear();
                    self.stale = false;
                    info!(code = %session.code, host = %self.host.id.short(), "Session created");
                    self.session = Some(session.clone());
                    return Ok(session);
                }
                Err(BackendError::DuplicateCode(code)) => {
                    debug!(%code, attempt, "Join code taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SessionError::CodeSpaceExhausted)
    }

    /// Apply pending change notifications to the local mirror.
    /// Returns how many were applied.
    pub fn apply_changes(&mut self) -> usize {
        let Some(rx) = self.changes_rx.as_mut() else {
            return 0;
        };
        let mut changes = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(change) => changes.push(change),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Coordinator missed changes; will refresh");
                    self.stale = true;
                }
            }
        }

        let applied = changes.len();
        for change in changes {
            match change {
                ChangeNotification::PlayerInserted { player } | ChangeNotification::PlayerUpdated { player } => {
                    self.players.insert(player.id, player);
                }
                ChangeNotification::PlayerDeleted { player_id } => {
                    self.players.remove(&player_id);
                }
                ChangeNotification::SessionUpdated { session } => {
                    self.session = Some(session);
                }
            }
        }
        applied
    }

    /// Reload player rows from the backend.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let session_id = self.session.as_ref().ok_or(SessionError::NoSession)?.id;
        let rows = self.backend.list_players(session_id).await?;
        self.players = rows.into_iter().map(|p| (p.id, p)).collect();
        self.stale = false;
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), SessionError> {
        self.apply_changes();
        if self.stale {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Start the round.
    pub async fn start(&mut self) -> Result<SessionRecord, SessionError> {
        self.sync().await?;
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if session.status != SessionStatus::Waiting {
            return Err(SessionError::InvalidTransition { from: session.status, to: SessionStatus::Playing });
        }
        if self.players.is_empty() {
            return Err(SessionError::NoPlayers);
        }

        let updated = self.backend.set_session_status(session.id, SessionStatus::Playing).await?;
        info!(code = %updated.code, players = self.players.len(), "Round started");
        self.session = Some(updated.clone());
        Ok(updated)
    }

    /// Reset a finished round back to the lobby.
    pub async fn reset(&mut self) -> Result<SessionRecord, SessionError> {
        self.sync().await?;
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if session.status != SessionStatus::Playing {
            return Err(SessionError::InvalidTransition { from: session.status, to: SessionStatus::Waiting });
        }
        if !self.round_over() {
            return Err(SessionError::RoundInProgress { alive: self.alive_count() });
        }

        let session_id = session.id;
        let revived = self.backend.reset_players(session_id).await?;
        self.players = revived.into_iter().map(|p| (p.id, p)).collect();
        let updated = self.backend.set_session_status(session_id, SessionStatus::Waiting).await?;
        info!(code = %updated.code, "Round reset");
        self.session = Some(updated.clone());
        Ok(updated)
    }

    /// Every player has been eliminated.
    pub fn round_over(&self) -> bool {
        matches!(&self.session, Some(s) if s.status == SessionStatus::Playing)
            && !self.players.is_empty()
            && self.alive_count() == 0
    }

    /// Players still running.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive).count()
    }

    /// Player rows ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }

    /// Current session.
    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No session with that code.
    #[error("Session not found")]
    SessionNotFound,

    /// Coordinator has not created a session.
    #[error("No active session")]
    NoSession,

    /// Session already playing.
    #[error("Match already in progress")]
    MatchInProgress,

    /// Status change not allowed.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status
        from: SessionStatus,
        /// Requested status
        to: SessionStatus,
    },

    /// Some players are still alive.
    #[error("Round still in progress ({alive} alive)")]
    RoundInProgress {
        /// Players alive
        alive: usize,
    },

    /// Nobody has joined.
    #[error("No players in session")]
    NoPlayers,

    /// Could not find an unused code.
    #[error("No free join code found")]
    CodeSpaceExhausted,

    /// Backend failure.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::backend::InMemoryBackend;
    use crate::network::bridge::NetworkBridge;
    use crate::network::protocol::PlayerUpdate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn coordinator(backend: &Arc<InMemoryBackend>) -> SessionCoordinator<InMemoryBackend> {
        SessionCoordinator::new(backend.clone(), LocalPlayer::new("host", "owl"), NetConfig::default())
    }

    #[test]
    fn test_join_code_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_join_code(&mut rng, 4);
            assert_eq!(code.len(), 4);
            assert!(code.bytes().all(|c| JOIN_CODE_ALPHABET.contains(&c)));
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('I') && !code.contains('1'));
        }
    }

    #[tokio::test]
    async fn test_start_requires_players() {
        let backend = Arc::new(InMemoryBackend::default());
        let mut host = coordinator(&backend);
        host.create_session().await.unwrap();

        assert!(matches!(host.start().await, Err(SessionError::NoPlayers)));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let backend = Arc::new(InMemoryBackend::default());
        let mut host = coordinator(&backend);
        let session = host.create_session().await.unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);

        let mut a = NetworkBridge::new(backend.clone(), LocalPlayer::new("a", "fox"), NetConfig::default());
        let mut b = NetworkBridge::new(backend.clone(), LocalPlayer::new("b", "cat"), NetConfig::default());
        a.join(&session.code).await.unwrap();
        b.join(&session.code).await.unwrap();

        host.start().await.unwrap();
        assert_eq!(host.players().count(), 2);
        assert!(!host.round_over());

        // Cannot start twice
        assert!(matches!(host.start().await, Err(SessionError::InvalidTransition { .. })));

        // Reset refused while someone is alive
        backend.update_player(a.player().id, PlayerUpdate::eliminated(300)).await.unwrap();
        assert!(matches!(host.reset().await, Err(SessionError::RoundInProgress { alive: 1 })));

        backend.update_player(b.player().id, PlayerUpdate::eliminated(500)).await.unwrap();
        host.apply_changes();
        assert!(host.round_over());
        assert_eq!(host.players().map(|p| p.score).max(), Some(500));

        let reset = host.reset().await.unwrap();
        assert_eq!(reset.status, SessionStatus::Waiting);
        assert!(host.players().all(|p| p.is_alive && p.score == 0));
        assert!(!host.round_over());
    }

    #[tokio::test]
    async fn test_join_code_collision_retries() {
        let backend = Arc::new(InMemoryBackend::default());
        let mut first = coordinator(&backend);
        let mut second = coordinator(&backend);
        let a = first.create_session().await.unwrap();
        let b = second.create_session().await.unwrap();
        assert_ne!(a.code, b.code);
    }

    #[tokio::test]
    async fn test_backend_offline() {
        let backend = Arc::new(InMemoryBackend::default());
        backend.set_offline(true);
        let mut host = coordinator(&backend);
        assert!(matches!(host.create_session().await, Err(SessionError::Backend(_))));
    }

    #[tokio::test]
    async fn test_reset_without_session() {
        let backend = Arc::new(InMemoryBackend::default());
        let mut host = coordinator(&backend);
        assert!(matches!(host.reset().await, Err(SessionError::NoSession)));
    }
}
