//! Network Bridge
//!
//! Connects one local simulation to a shared session. This layer is
//! **non-deterministic** and never feeds back into the simulation:
//!
//! - Publishes a lightweight snapshot every few ticks (fire-and-forget)
//! - Queues score writes periodically and once on elimination
//! - Turns peer snapshots into read-only ghosts
//! - Follows session status changes to start and reset rounds
//!
//! Nothing here awaits inside the tick path. Queued writes go out in
//! [`NetworkBridge::flush`], and every backend failure is logged and
//! swallowed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::core::time::Millis;
use crate::game::physics::Gravity;
use crate::game::state::Simulation;
use crate::game::tick::TickResult;
use crate::network::backend::Backend;
use crate::network::coordinator::SessionError;
use crate::network::protocol::{
    BroadcastSnapshot, ChangeNotification, PlayerId, PlayerRecord, PlayerUpdate, SessionRecord,
    SessionStatus, WireFormat,
};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Network tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Ticks between snapshot broadcasts
    pub broadcast_interval_ticks: u64,
    /// Ticks between periodic score writes
    pub persist_interval_ticks: u64,
    /// Delay before an eliminated client returns to the lobby
    pub lobby_return_delay_ms: Millis,
    /// Snapshot encoding
    pub wire_format: WireFormat,
    /// Tick difference to a peer that gets logged as divergence
    pub divergence_tolerance_ticks: u64,
    /// Join code length
    pub join_code_length: usize,
    /// Queue depth of broadcast and change channels
    pub channel_capacity: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ticks: 6,
            persist_interval_ticks: 120,
            lobby_return_delay_ms: 3_000,
            wire_format: WireFormat::Json,
            divergence_tolerance_ticks: 30,
            join_code_length: 4,
            channel_capacity: 256,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Identity of the local player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPlayer {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub pseudo: String,
    /// Avatar tag
    pub avatar: String,
}

impl LocalPlayer {
    /// New player with a random id.
    pub fn new(pseudo: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self { id: PlayerId::new_v4(), pseudo: pseudo.into(), avatar: avatar.into() }
    }
}

/// Where this client is in the round lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientPhase {
    /// Waiting for the host to start
    Lobby,
    /// Running the simulation
    Playing,
    /// Dead; back to lobby at `return_at`
    Eliminated {
        /// When to return to the lobby
        return_at: Millis,
    },
}

/// Last known state of a remote player. Never used for collision.
#[derive(Clone, Debug, PartialEq)]
pub struct OpponentGhost {
    /// Latest snapshot
    pub snapshot: BroadcastSnapshot,
    /// When it arrived
    pub received_at: Millis,
}

impl OpponentGhost {
    /// Time since the last snapshot.
    pub fn age(&self, now: Millis) -> Millis {
        now.saturating_sub(self.received_at)
    }
}

/// Lifecycle changes observed while polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Host started a round; run a simulation seeded with `code`
    RoundStarted {
        /// Join code
        code: String,
    },
    /// Host reset the session back to the lobby
    RoundReset,
    /// Elimination delay elapsed
    ReturnedToLobby,
}

// =============================================================================
// BRIDGE
// =============================================================================

/// Client-side session link.
pub struct NetworkBridge<B: Backend> {
    backend: Arc<B>,
    config: NetConfig,
    player: LocalPlayer,
    session: Option<SessionRecord>,
    phase: ClientPhase,
    outbox: Vec<PlayerUpdate>,
    channel_tx: Option<broadcast::Sender<Vec<u8>>>,
    channel_rx: Option<broadcast::Receiver<Vec<u8>>>,
    changes_rx: Option<broadcast::Receiver<ChangeNotification>>,
    ghosts: BTreeMap<PlayerId, OpponentGhost>,
    diverged: BTreeSet<PlayerId>,
}

impl<B: Backend> NetworkBridge<B> {
    /// Create a bridge that is not yet in a session.
    pub fn new(backend: Arc<B>, player: LocalPlayer, config: NetConfig) -> Self {
        Self {
            backend,
            config,
            player,
            session: None,
            phase: ClientPhase::Lobby,
            outbox: Vec::new(),
            channel_tx: None,
            channel_rx: None,
            changes_rx: None,
            ghosts: BTreeMap::new(),
            diverged: BTreeSet::new(),
        }
    }

    /// Join a waiting session by code.
    pub async fn join(&mut self, code: &str) -> Result<SessionRecord, SessionError> {
        let session = self
            .backend
            .find_session(code)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        if session.status != SessionStatus::Waiting {
            return Err(SessionError::MatchInProgress);
        }

        // Subscribe before inserting so no change is missed
        let changes_rx = self.backend.subscribe_changes(session.id);
        let record = PlayerRecord::new(
            self.player.id,
            session.id,
            self.player.pseudo.clone(),
            self.player.avatar.clone(),
        );
        self.backend.insert_player(record).await?;

        let tx = self.backend.channel(&session.code);
        self.channel_rx = Some(tx.subscribe());
        self.channel_tx = Some(tx);
        self.changes_rx = Some(changes_rx);
        self.phase = ClientPhase::Lobby;
        self.ghosts.clear();
        self.diverged.clear();
        self.outbox.clear();

        info!(code, player = %self.player.id.short(), "Joined session");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Leave the session. The player row is deleted best effort.
    pub async fn leave(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.backend.delete_player(self.player.id).await {
                warn!(code = %session.code, error = %e, "Failed to delete player on leave");
            }
            info!(code = %session.code, player = %self.player.id.short(), "Left session");
        }
        self.channel_tx = None;
        self.channel_rx = None;
        self.changes_rx = None;
        self.outbox.clear();
        self.ghosts.clear();
        self.diverged.clear();
        self.phase = ClientPhase::Lobby;
    }

    /// Feed the result of one simulation tick. Never awaits.
    pub fn on_tick(&mut self, sim: &Simulation, result: &TickResult, now: Millis) {
        if self.phase != ClientPhase::Playing {
            return;
        }
        let tick = sim.state.tick;

        if result.eliminated {
            let final_score = result.final_score.unwrap_or_else(|| sim.state.whole_score());
            self.outbox.push(PlayerUpdate::eliminated(final_score));
            self.broadcast(self.snapshot(sim, true));
            self.phase = ClientPhase::Eliminated {
                return_at: now.saturating_add(self.config.lobby_return_delay_ms),
            };
            info!(tick, final_score, "Eliminated");
            return;
        }

        if self.config.broadcast_interval_ticks > 0 && tick % self.config.broadcast_interval_ticks == 0 {
            self.broadcast(self.snapshot(sim, false));
        }
        if self.config.persist_interval_ticks > 0 && tick % self.config.persist_interval_ticks == 0 {
            self.outbox.push(PlayerUpdate::score(sim.state.whole_score()));
        }
    }

    /// Build the snapshot peers see.
    pub fn snapshot(&self, sim: &Simulation, dead: bool) -> BroadcastSnapshot {
        BroadcastSnapshot {
            id: self.player.id,
            pseudo: self.player.pseudo.clone(),
            avatar: self.player.avatar.clone(),
            y: sim.body.y,
            is_jumping: sim.body.is_jumping(),
            is_gravity_inverted: sim.body.gravity == Gravity::Up,
            is_dead: dead || sim.state.game_over,
            tick: Some(sim.state.tick),
        }
    }

    fn broadcast(&self, snapshot: BroadcastSnapshot) {
        let Some(tx) = &self.channel_tx else {
            return;
        };
        match snapshot.encode(self.config.wire_format) {
            Ok(bytes) => {
                if tx.send(bytes).is_err() {
                    debug!("Broadcast dropped: no listeners");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode snapshot"),
        }
    }

    /// Drain peer snapshots and session changes.
    ///
    /// `local_tick` is the running simulation's tick, if any; it is only used
    /// to log divergence from peers.
    pub fn poll(&mut self, now: Millis, local_tick: Option<u64>) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        self.drain_snapshots(now, local_tick);
        self.drain_changes(&mut events);

        if let ClientPhase::Eliminated { return_at } = self.phase {
            if now >= return_at {
                self.phase = ClientPhase::Lobby;
                events.push(BridgeEvent::ReturnedToLobby);
            }
        }
        events
    }

    fn drain_snapshots(&mut self, now: Millis, local_tick: Option<u64>) {
        let Some(rx) = self.channel_rx.as_mut() else {
            return;
        };
        loop {
            let bytes = match rx.try_recv() {
                Ok(bytes) => bytes,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Snapshot receiver lagged");
                    continue;
                }
            };
            let snapshot = match BroadcastSnapshot::decode(&bytes, self.config.wire_format) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable snapshot");
                    continue;
                }
            };
            if snapshot.id == self.player.id {
                continue;
            }

            if let (Some(remote), Some(local)) = (snapshot.tick, local_tick) {
                if remote.abs_diff(local) > self.config.divergence_tolerance_ticks
                    && self.diverged.insert(snapshot.id)
                {
                    warn!(
                        peer = %snapshot.id.short(),
                        remote_tick = remote,
                        local_tick = local,
                        "Peer simulation diverged beyond tolerance"
                    );
                }
            }

            self.ghosts.insert(snapshot.id, OpponentGhost { snapshot, received_at: now });
        }
    }

    fn drain_changes(&mut self, events: &mut Vec<BridgeEvent>) {
        let Some(rx) = self.changes_rx.as_mut() else {
            return;
        };
        let mut changes = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(change) => changes.push(change),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change notifications lagged");
                }
            }
        }

        for change in changes {
            match change {
                ChangeNotification::SessionUpdated { session } => self.on_session_update(session, events),
                ChangeNotification::PlayerDeleted { player_id } => {
                    self.ghosts.remove(&player_id);
                }
                ChangeNotification::PlayerInserted { .. } | ChangeNotification::PlayerUpdated { .. } => {}
            }
        }
    }

    fn on_session_update(&mut self, session: SessionRecord, events: &mut Vec<BridgeEvent>) {
        let previous = match &self.session {
            Some(current) if current.id == session.id => current.status,
            _ => return,
        };

        match (previous, session.status) {
            (SessionStatus::Waiting, SessionStatus::Playing) => {
                if self.phase == ClientPhase::Lobby {
                    self.phase = ClientPhase::Playing;
                    self.outbox.clear();
                    events.push(BridgeEvent::RoundStarted { code: session.code.clone() });
                    info!(code = %session.code, "Round started");
                }
            }
            (SessionStatus::Playing, SessionStatus::Waiting) => {
                self.phase = ClientPhase::Lobby;
                self.ghosts.clear();
                self.diverged.clear();
                events.push(BridgeEvent::RoundReset);
                info!(code = %session.code, "Round reset");
            }
            _ => {}
        }
        self.session = Some(session);
    }

    /// Send queued writes. Failures are logged and dropped; returns the
    /// number that succeeded.
    pub async fn flush(&mut self) -> usize {
        let pending = std::mem::take(&mut self.outbox);
        if self.session.is_none() {
            return 0;
        }
        let mut written = 0;
        for update in pending {
            match self.backend.update_player(self.player.id, update).await {
                Ok(_) => written += 1,
                Err(e) => warn!(error = %e, ?update, "Score write failed"),
            }
        }
        written
    }

    /// Queued writes not yet flushed.
    pub fn pending_writes(&self) -> &[PlayerUpdate] {
        &self.outbox
    }

    /// Current phase.
    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Joined session, if any.
    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }

    /// Local identity.
    pub fn player(&self) -> &LocalPlayer {
        &self.player
    }

    /// Remote players' last known state.
    pub fn ghosts(&self) -> &BTreeMap<PlayerId, OpponentGhost> {
        &self.ghosts
    }

    /// Network configuration.
    pub fn config(&self) -> &NetConfig {
        &self.config
    }
}

// =============================================================================
// TESTS
// =============================================================================
