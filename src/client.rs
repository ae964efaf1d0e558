//! Game Client
//!
//! One player's client without rendering: a fixed-step clock driving a
//! simulation, an input latch and a network bridge. Call [`GameClient::frame`]
//! once per render frame and [`GameClient::flush`] from an async context
//! whenever convenient; the frame path itself never awaits.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::time::TimeSource;
use crate::game::clock::SimulationClock;
use crate::game::events::{GameEvent, sort_events};
use crate::game::input::InputLatch;
use crate::game::state::Simulation;
use crate::game::tick::tick;
use crate::config::GameConfig;
use crate::network::backend::Backend;
use crate::network::bridge::{BridgeEvent, ClientPhase, LocalPlayer, NetworkBridge, OpponentGhost};
use crate::network::coordinator::SessionError;
use crate::network::protocol::{PlayerId, SessionRecord};

/// What happened during one render frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Simulation steps executed
    pub steps: u32,
    /// Interpolation fraction for rendering
    pub alpha: f32,
    /// Game events from those steps, by tick then priority
    pub events: Vec<GameEvent>,
    /// Session lifecycle changes seen this frame
    pub lifecycle: Vec<BridgeEvent>,
    /// The runner was eliminated this frame
    pub eliminated: bool,
}

/// A headless game client.
pub struct GameClient<B: Backend, T: TimeSource> {
    config: GameConfig,
    time: T,
    clock: SimulationClock,
    latch: InputLatch,
    sim: Option<Simulation>,
    bridge: NetworkBridge<B>,
}

impl<B: Backend, T: TimeSource> GameClient<B, T> {
    /// Create a client in the lobby.
    pub fn new(backend: Arc<B>, player: LocalPlayer, config: GameConfig, time: T) -> Self {
        let bridge = NetworkBridge::new(backend, player, config.net.clone());
        let mut clock = SimulationClock::new(config.clock.clone(), config.sim.tick_rate);
        clock.stop();
        Self {
            config,
            time,
            clock,
            latch: InputLatch::new(),
            sim: None,
            bridge,
        }
    }

    /// Start a single-player run with locally random spawns.
    pub fn start_solo(&mut self) {
        self.sim = Some(Simulation::local(&self.config.sim));
        self.latch = InputLatch::new();
        self.clock.restart();
        info!("Solo run started");
    }

    /// Join a session; the run starts when the host starts the round.
    pub async fn join(&mut self, code: &str) -> Result<SessionRecord, SessionError> {
        self.sim = None;
        self.clock.stop();
        self.bridge.join(code).await
    }

    /// Leave the session and stop the clock.
    pub async fn leave(&mut self) {
        self.clock.stop();
        self.bridge.leave().await;
    }

    /// Send queued score writes. Returns how many succeeded.
    pub async fn flush(&mut self) -> usize {
        self.bridge.flush().await
    }

    /// Activate key/touch changed.
    pub fn set_activate(&mut self, down: bool) {
        self.latch.set_activate(down);
    }

    /// Crouch key changed.
    pub fn set_crouch(&mut self, down: bool) {
        self.latch.set_crouch(down);
    }

    /// Freeze the run. Session changes are still observed.
    pub fn pause(&mut self) {
        self.clock.pause();
        if let Some(sim) = self.sim.as_mut() {
            sim.set_running(false);
        }
    }

    /// Unfreeze the run.
    pub fn resume(&mut self) {
        self.clock.resume();
        if let Some(sim) = self.sim.as_mut() {
            sim.set_running(true);
        }
    }

    /// Run one render frame.
    pub fn frame(&mut self) -> FrameReport {
        let now = self.time.now_ms();
        let mut report = FrameReport::default();

        let local_tick = self.sim.as_ref().filter(|s| !s.state.game_over).map(|s| s.state.tick);
        report.lifecycle = self.bridge.poll(now, local_tick);
        for event in &report.lifecycle {
            match event {
                BridgeEvent::RoundStarted { code } => {
                    self.sim = Some(Simulation::seeded(code, &self.config.sim));
                    self.latch = InputLatch::new();
                    self.clock.restart();
                    // Establish the baseline; steps begin next frame
                    self.clock.frame(now);
                    debug!(%code, "Seeded run started");
                }
                BridgeEvent::RoundReset => {
                    self.sim = None;
                    self.clock.stop();
                }
                BridgeEvent::ReturnedToLobby => {
                    self.clock.stop();
                }
            }
        }

        let Some(sim) = self.sim.as_mut() else {
            return report;
        };
        let frame = self.clock.frame(now);
        report.steps = frame.steps;
        report.alpha = frame.alpha;

        for _ in 0..frame.steps {
            let input = self.latch.next_frame();
            let result = tick(sim, input, now, &self.config.sim);
            self.bridge.on_tick(sim, &result, now);
            report.events.extend(result.events);
            if result.eliminated {
                report.eliminated = true;
                break;
            }
        }
        sort_events(&mut report.events);
        report
    }

    /// Current run, if any.
    pub fn sim(&self) -> Option<&Simulation> {
        self.sim.as_ref()
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> ClientPhase {
        self.bridge.phase()
    }

    /// Remote players.
    pub fn ghosts(&self) -> &BTreeMap<PlayerId, OpponentGhost> {
        self.bridge.ghosts()
    }

    /// Network bridge.
    pub fn bridge(&self) -> &NetworkBridge<B> {
        &self.bridge
    }

    /// Is the run frozen?
    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }
}

// =============================================================================
// TESTS
// =============================================================================
