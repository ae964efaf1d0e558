//! Input Capture
//!
//! The simulation consumes a single abstract "activate" intent plus a crouch
//! hold. Whether it came from a key, a tap or a replay file is invisible here.

use serde::{Serialize, Deserialize};

/// Input state for a single tick.
///
/// Packed into one byte so recorded runs stay small.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Action flags (packed bits):
    /// - Bit 0: Activate pressed this tick (edge)
    /// - Bit 1: Activate held (drives flight thrust)
    /// - Bit 2: Crouch held
    /// - Bit 3-7: Reserved
    pub flags: u8,
}

impl InputFrame {
    /// Activate edge flag bit
    pub const FLAG_ACTIVATE: u8 = 0x01;

    /// Activate held flag bit
    pub const FLAG_HOLD: u8 = 0x02;

    /// Crouch held flag bit
    pub const FLAG_CROUCH: u8 = 0x04;

    /// Create a new empty input frame.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Activate pressed this tick (and therefore held).
    pub const fn activate() -> Self {
        Self { flags: Self::FLAG_ACTIVATE | Self::FLAG_HOLD }
    }

    /// Activate held without a fresh press.
    pub const fn hold() -> Self {
        Self { flags: Self::FLAG_HOLD }
    }

    /// Crouch held.
    pub const fn crouch() -> Self {
        Self { flags: Self::FLAG_CROUCH }
    }

    /// Was activate pressed this tick?
    #[inline]
    pub fn activate_pressed(&self) -> bool {
        self.flags & Self::FLAG_ACTIVATE != 0
    }

    /// Is activate currently held?
    #[inline]
    pub fn activate_held(&self) -> bool {
        self.flags & (Self::FLAG_HOLD | Self::FLAG_ACTIVATE) != 0
    }

    /// Is crouch held?
    #[inline]
    pub fn crouch_held(&self) -> bool {
        self.flags & Self::FLAG_CROUCH != 0
    }
}

/// Turns raw "is the button down" samples into per-tick frames.
///
/// The activate edge is reported on exactly one tick per press, even when a
/// render frame runs several simulation steps.
#[derive(Clone, Debug, Default)]
pub struct InputLatch {
    held: bool,
    pending_press: bool,
    crouch: bool,
}

impl InputLatch {
    /// Create a released latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the activate button state (key or touch).
    pub fn set_activate(&mut self, down: bool) {
        if down && !self.held {
            self.pending_press = true;
        }
        self.held = down;
    }

    /// Record the crouch button state.
    pub fn set_crouch(&mut self, down: bool) {
        self.crouch = down;
    }

    /// Produce the frame for the next tick, consuming any pending press.
    pub fn next_frame(&mut self) -> InputFrame {
        let mut flags = 0;
        if std::mem::take(&mut self.pending_press) {
            flags |= InputFrame::FLAG_ACTIVATE;
        }
        if self.held {
            flags |= InputFrame::FLAG_HOLD;
        }
        if self.crouch {
            flags |= InputFrame::FLAG_CROUCH;
        }
        InputFrame { flags }
    }
}
