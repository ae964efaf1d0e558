//! Fixed-Timestep Clock
//!
//! Converts irregular render frames into a whole number of fixed simulation
//! steps. Time is accumulated in integer microseconds so the step count for a
//! given frame sequence never depends on float rounding.
//!
//! A frame longer than `max_frame_ms` (tab switch, debugger pause) is clamped
//! so the simulation never tries to catch up on seconds of missed ticks.

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::time::Millis;

/// Highest supported tick rate. A step is never shorter than a millisecond.
pub const MAX_TICK_RATE: u32 = 1_000;

/// Tick rate forced into `1..=MAX_TICK_RATE`.
#[inline]
pub fn clamp_tick_rate(tick_rate: u32) -> u32 {
    tick_rate.clamp(1, MAX_TICK_RATE)
}

/// Duration of one step in microseconds. Never zero.
#[inline]
pub fn step_us(tick_rate: u32) -> u64 {
    1_000_000 / u64::from(clamp_tick_rate(tick_rate))
}

/// Clock tuning. The tick rate itself lives in `SimConfig`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Longest frame credited to the accumulator
    pub max_frame_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { max_frame_ms: 100 }
    }
}

/// Outcome of one render frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameSteps {
    /// Simulation steps to run
    pub steps: u32,
    /// Leftover fraction of a step, for render interpolation
    pub alpha: f32,
    /// The frame was longer than the clamp
    pub clamped: bool,
}

/// Accumulator-based fixed-step driver.
#[derive(Clone, Debug)]
pub struct SimulationClock {
    config: ClockConfig,
    step_us: u64,
    accumulator_us: u64,
    last_frame: Option<Millis>,
    paused: bool,
    stopped: bool,
    total_steps: u64,
}

impl SimulationClock {
    /// Create a running clock stepping `tick_rate` times per second. The
    /// first frame only establishes the baseline.
    pub fn new(config: ClockConfig, tick_rate: u32) -> Self {
        if tick_rate != clamp_tick_rate(tick_rate) {
            warn!(tick_rate, max = MAX_TICK_RATE, "Tick rate out of range, clamped");
        }
        Self {
            config,
            step_us: step_us(tick_rate),
            accumulator_us: 0,
            last_frame: None,
            paused: false,
            stopped: false,
            total_steps: 0,
        }
    }

    /// Register a render frame at `now` and report how many steps to run.
    pub fn frame(&mut self, now: Millis) -> FrameSteps {
        if self.paused || self.stopped {
            return FrameSteps::default();
        }

        let Some(last) = self.last_frame.replace(now) else {
            return FrameSteps::default();
        };

        let elapsed = now.saturating_sub(last);
        let clamped = elapsed > self.config.max_frame_ms;
        if clamped {
            debug!(elapsed_ms = elapsed, "Frame hitch clamped");
        }
        self.accumulator_us += elapsed.min(self.config.max_frame_ms) * 1000;

        let step = self.step_us;
        let steps = (self.accumulator_us / step) as u32;
        self.accumulator_us -= u64::from(steps) * step;
        self.total_steps += u64::from(steps);

        FrameSteps {
            steps,
            alpha: self.accumulator_us as f32 / step as f32,
            clamped,
        }
    }

    /// Register a frame and call `step` once per simulation step. Stops
    /// early if `step` returns `false`.
    pub fn advance<F>(&mut self, now: Millis, mut step: F) -> FrameSteps
    where
        F: FnMut() -> bool,
    {
        let frame = self.frame(now);
        for _ in 0..frame.steps {
            if !step() {
                break;
            }
        }
        frame
    }

    /// Freeze the accumulator.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume. The next frame re-establishes the baseline, so the paused
    /// interval is never credited.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_frame = None;
    }

    /// Stop permanently (client left the session).
    pub fn stop(&mut self) {
        self.stopped = true;
        self.accumulator_us = 0;
    }

    /// Restart from a clean accumulator (new round).
    pub fn restart(&mut self) {
        self.stopped = false;
        self.paused = false;
        self.accumulator_us = 0;
        self.last_frame = None;
    }

    /// Is the clock paused?
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Has the clock been stopped?
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Duration of one step in microseconds.
    pub fn step_us(&self) -> u64 {
        self.step_us
    }

    /// Upper bound on steps produced by a single frame.
    pub fn max_steps_per_frame(&self) -> u32 {
        ((self.config.max_frame_ms * 1000) / self.step_us) as u32
    }

    /// Steps produced since creation.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_baseline() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        assert_eq!(clock.frame(1_000).steps, 0);
        assert_eq!(clock.frame(1_040).steps, 2);
    }

    #[test]
    fn test_accumulates_fractions() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        clock.frame(0);
        let mut steps = 0;
        for i in 1..=60 {
            steps += clock.frame(i * 10).steps;
        }
        // 600 ms at 60 Hz
        assert_eq!(steps, 36);
    }

    #[test]
    fn test_hitch_is_clamped() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        let max = clock.max_steps_per_frame();
        clock.frame(0);
        let frame = clock.frame(5_000);
        assert!(frame.clamped);
        assert_eq!(frame.steps, max);
        assert_eq!(max, 6);
    }

    #[test]
    fn test_pause_freezes_and_resume_resets_baseline() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        clock.frame(0);
        clock.pause();
        assert_eq!(clock.frame(50).steps, 0);
        clock.resume();
        assert_eq!(clock.frame(10_000).steps, 0);
        assert_eq!(clock.frame(10_020).steps, 1);
    }

    #[test]
    fn test_advance_stops_early() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        clock.frame(0);
        let mut calls = 0;
        clock.advance(100, || {
            calls += 1;
            calls < 2
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_extreme_tick_rates_are_clamped() {
        assert_eq!(step_us(0), 1_000_000);
        assert_eq!(step_us(u32::MAX), 1_000);
        assert_eq!(step_us(2_000_000), 1_000);

        let mut clock = SimulationClock::new(ClockConfig::default(), u32::MAX);
        assert_eq!(clock.step_us(), 1_000);
        clock.frame(0);
        let frame = clock.frame(16);
        assert_eq!(frame.steps, 16);
        assert!(frame.alpha.is_finite());
        assert_eq!(clock.max_steps_per_frame(), 100);

        let mut stalled = SimulationClock::new(ClockConfig::default(), 0);
        stalled.frame(0);
        let steps: u32 = (1..=10).map(|i| stalled.frame(i * 100).steps).sum();
        assert_eq!(steps, 1);
    }

    #[test]
    fn test_stop() {
        let mut clock = SimulationClock::new(ClockConfig::default(), 60);
        clock.frame(0);
        clock.stop();
        assert_eq!(clock.frame(100).steps, 0);
        assert!(clock.is_stopped());
        clock.restart();
        clock.frame(200);
        assert_eq!(clock.frame(220).steps, 1);
    }
}
