//! Injected Time Source
//!
//! Effect expiry and the frame clock read time only through [`TimeSource`].
//! Production code uses [`SystemTimeSource`]; tests and the demo drive a
//! [`ManualTimeSource`] forward explicitly instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Milliseconds since the time source's origin.
pub type Millis = u64;

/// Monotonic clock abstraction.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since this source's origin.
    fn now_ms(&self) -> Millis;
}

/// Wall-clock time source backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    /// Start a new clock at zero.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven time source. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<AtomicU64>,
}

impl ManualTimeSource {
    /// Create a source starting at `start` milliseconds.
    pub fn new(start: Millis) -> Self {
        Self { now: Arc::new(AtomicU64::new(start)) }
    }

    /// Move time forward.
    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time. Going backwards is ignored.
    pub fn set(&self, ms: Millis) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_source_shared_between_clones() {
        let a = ManualTimeSource::new(100);
        let b = a.clone();
        a.advance(50);
        assert_eq!(b.now_ms(), 150);
    }

    #[test]
    fn test_manual_source_never_goes_back() {
        let a = ManualTimeSource::new(100);
        a.set(40);
        assert_eq!(a.now_ms(), 100);
        a.set(400);
        assert_eq!(a.now_ms(), 400);
    }

    #[test]
    fn test_system_source_monotonic() {
        let s = SystemTimeSource::new();
        let t1 = s.now_ms();
        let t2 = s.now_ms();
        assert!(t2 >= t1);
    }
}
