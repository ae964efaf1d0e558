//! Runner Sync Demo
//!
//! Headless seeded round over the in-memory backend: a host creates a
//! session, two clients join and run until both are eliminated, their spawn
//! streams are compared, and the host resets the session.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use runner_sync::{
    GameClient, GameConfig, InputFrame, ManualTimeSource, VERSION, TICK_RATE,
    client::FrameReport,
    core::hash::short_hex,
    game::{events::GameEventData, tick::replay_run},
    network::{
        backend::InMemoryBackend,
        bridge::{ClientPhase, LocalPlayer},
        coordinator::SessionCoordinator,
    },
};

/// Safety cap on simulated frames (about 10 minutes at 60 fps).
const MAX_FRAMES: usize = 36_000;

type DemoClient = GameClient<InMemoryBackend, ManualTimeSource>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Runner Sync v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = GameConfig::from_env().context("loading configuration")?;

    let code = demo_round(&config).await?;
    verify_replay(&code, &config);
    Ok(())
}

/// Host plus two clients playing one seeded round.
async fn demo_round(config: &GameConfig) -> Result<String> {
    info!("=== Starting Demo Round ===");

    let backend = Arc::new(InMemoryBackend::new(config.net.channel_capacity));
    let time = ManualTimeSource::new(0);

    let mut host = SessionCoordinator::new(backend.clone(), LocalPlayer::new("host", "owl"), config.net.clone());
    let session = host.create_session().await?;
    info!("Join code: {}", session.code);

    let mut clients: Vec<DemoClient> = [("ada", "fox"), ("bo", "cat")]
        .into_iter()
        .map(|(pseudo, avatar)| {
            GameClient::new(backend.clone(), LocalPlayer::new(pseudo, avatar), config.clone(), time.clone())
        })
        .collect();
    for client in &mut clients {
        client.join(&session.code).await?;
    }

    host.start().await?;

    let mut frame_count = 0;
    while frame_count < MAX_FRAMES {
        frame_count += 1;
        time.advance(16);

        for (i, client) in clients.iter_mut().enumerate() {
            // Each player taps on its own rhythm
            let period = 40 + i * 13;
            client.set_activate(frame_count % period == 0);
            let report = client.frame();
            log_report(client, &report);
        }

        if frame_count % 120 == 0 {
            for client in &mut clients {
                client.flush().await;
            }
        }

        let started = clients.iter().all(|c| c.sim().is_some());
        if started && clients.iter().all(|c| c.phase() != ClientPhase::Playing) {
            break;
        }
    }

    for client in &mut clients {
        client.flush().await;
    }
    if clients.iter().any(|c| c.phase() == ClientPhase::Playing) {
        bail!("round did not finish within {} frames", MAX_FRAMES);
    }

    // Results
    info!("=== Round Results ===");
    host.apply_changes();
    for player in host.players() {
        info!("{} ({}) - Score: {}", player.pseudo, player.id.short(), player.score);
    }
    info!("Round over: {}", host.round_over());

    // Both clients must have generated the same world up to the shorter run
    info!("=== Verifying Shared World ===");
    let logs: Vec<_> = clients
        .iter()
        .filter_map(|c| c.sim())
        .map(|sim| (sim.generator.spawn_log(), short_hex(&sim.generator.spawn_digest())))
        .collect();
    if let [(a, digest_a), (b, digest_b)] = logs.as_slice() {
        let common = a.len().min(b.len());
        info!("Spawn digests: {} ({} spawns) / {} ({} spawns)", digest_a, a.len(), digest_b, b.len());
        if a[..common] == b[..common] {
            info!("DETERMINISM VERIFIED: {} shared spawns match", common);
        } else {
            warn!("DETERMINISM FAILURE: spawn streams differ");
        }
    }

    // Back to the lobby
    host.reset().await?;
    time.advance(16);
    for client in &mut clients {
        let report = client.frame();
        log_report(client, &report);
    }
    for client in &mut clients {
        client.leave().await;
    }

    Ok(session.code)
}

fn log_report(client: &DemoClient, report: &FrameReport) {
    let name = &client.bridge().player().pseudo;
    for event in &report.lifecycle {
        info!("[{}] {:?}", name, event);
    }
    for event in &report.events {
        match &event.data {
            GameEventData::Eliminated { cause, final_score } => {
                info!("[{}] Eliminated at tick {} by {:?} (score {})", name, event.tick, cause, final_score);
            }
            GameEventData::BiomeChanged { to, .. } => {
                info!("[{}] Entered {:?} at tick {}", name, to, event.tick);
            }
            GameEventData::PowerUpCollected { effect, .. } => {
                info!("[{}] Picked up {:?}", name, effect);
            }
            _ => {}
        }
    }
}

/// Replay the same inputs twice and compare state hashes.
fn verify_replay(code: &str, config: &GameConfig) {
    info!("=== Verifying Replay ===");
    let inputs: Vec<InputFrame> = (0..3_600)
        .map(|t| if t % 45 == 0 { InputFrame::activate() } else { InputFrame::new() })
        .collect();

    let (first, events) = replay_run(code, &inputs, inputs.len() as u64, &config.sim);
    let (second, _) = replay_run(code, &inputs, inputs.len() as u64, &config.sim);
    let hash = first.compute_hash();
    let replay_hash = second.compute_hash();

    info!("Ticks: {}, events: {}", first.state.tick, events.len());
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }
}
