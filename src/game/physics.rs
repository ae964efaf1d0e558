//! Vertical Body Physics
//!
//! The runner only moves vertically; the world scrolls past it. A closed set
//! of movement modes selects the per-tick update through [`MODE_UPDATES`]:
//!
//! - `Normal`: gravity pulls to the floor, activate jumps (double jump allowed)
//! - `Inverted`: mirror image, gravity pulls to the ceiling
//! - `Flight`: holding activate thrusts away from the gravity surface
//!
//! Every update ends by clamping the body into the playfield, so
//! `0 <= y <= ceiling - height` holds after every tick in every mode.

use serde::{Serialize, Deserialize};

use crate::core::geom::Aabb;
use crate::game::input::InputFrame;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Physics tuning. Units are pixels and ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Playfield height; the floor is y = 0
    pub ceiling: f32,
    /// Fixed horizontal position of the runner
    pub body_x: f32,
    /// Runner width
    pub body_width: f32,
    /// Standing height (halved while sliding)
    pub body_height: f32,
    /// Gravity acceleration per tick
    pub gravity: f32,
    /// Initial speed of a jump
    pub jump_velocity: f32,
    /// Jumps allowed before touching a surface again
    pub max_jumps: u8,
    /// Flight acceleration while activate is held
    pub flight_thrust: f32,
    /// Flight acceleration toward the gravity surface while released
    pub flight_sink: f32,
    /// Flight speed cap in either direction
    pub flight_max_speed: f32,
    /// Horizontal hitbox inset on each side
    pub hitbox_inset_x: f32,
    /// Vertical hitbox inset on each side
    pub hitbox_inset_y: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            ceiling: 400.0,
            body_x: 80.0,
            body_width: 40.0,
            body_height: 60.0,
            gravity: 0.8,
            jump_velocity: 15.0,
            max_jumps: 2,
            flight_thrust: 0.6,
            flight_sink: 0.45,
            flight_max_speed: 7.0,
            hitbox_inset_x: 6.0,
            hitbox_inset_y: 4.0,
        }
    }
}

// =============================================================================
// MODES
// =============================================================================

/// Which surface gravity pulls toward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gravity {
    /// Toward the floor (y = 0)
    #[default]
    Down,
    /// Toward the ceiling
    Up,
}

impl Gravity {
    /// Sign of velocity when falling toward the gravity surface.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Gravity::Down => -1.0,
            Gravity::Up => 1.0,
        }
    }

    /// The other direction.
    #[inline]
    pub fn flipped(self) -> Gravity {
        match self {
            Gravity::Down => Gravity::Up,
            Gravity::Up => Gravity::Down,
        }
    }
}

/// Movement mode of the runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovementMode {
    /// Floor gravity, jumping
    #[default]
    Normal = 0,
    /// Ceiling gravity, jumping toward the floor
    Inverted = 1,
    /// Continuous thrust
    Flight = 2,
}

impl MovementMode {
    /// Gravity direction implied by a walking mode. Flight keeps whatever
    /// direction it is given.
    pub fn walking(gravity: Gravity) -> Self {
        match gravity {
            Gravity::Down => MovementMode::Normal,
            Gravity::Up => MovementMode::Inverted,
        }
    }
}

/// Per-mode update function.
pub type ModeUpdate = fn(&mut PhysicsBody, InputFrame, &PhysicsConfig);

/// Update table indexed by `MovementMode as usize`.
pub const MODE_UPDATES: [ModeUpdate; 3] = [update_normal, update_inverted, update_flight];

// =============================================================================
// BODY
// =============================================================================

/// Vertical state of the runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    /// Fixed left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Vertical velocity (positive = up)
    pub vy: f32,
    /// Jumps used since last touching a surface
    pub jump_count: u8,
    /// Crouch/slide active
    pub sliding: bool,
    /// Current height (halved while sliding)
    pub height: f32,
    /// Width
    pub width: f32,
    /// Active movement mode
    pub mode: MovementMode,
    /// Active gravity direction
    pub gravity: Gravity,
    /// Resting on the gravity surface or a platform at the end of last tick
    pub supported: bool,
}

impl PhysicsBody {
    /// Create a body standing on the floor.
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            x: config.body_x,
            y: 0.0,
            vy: 0.0,
            jump_count: 0,
            sliding: false,
            height: config.body_height,
            width: config.body_width,
            mode: MovementMode::Normal,
            gravity: Gravity::Down,
            supported: true,
        }
    }

    /// Advance one tick using the current mode's update function.
    pub fn update(&mut self, input: InputFrame, config: &PhysicsConfig) {
        MODE_UPDATES[self.mode as usize](self, input, config);
    }

    /// Switch mode/gravity. Any change teleports the body to a resting spot
    /// valid for the new mode with zero velocity.
    pub fn set_mode(&mut self, mode: MovementMode, gravity: Gravity, config: &PhysicsConfig) {
        if self.mode == mode && self.gravity == gravity {
            return;
        }
        self.mode = mode;
        self.gravity = gravity;
        self.sliding = false;
        self.height = config.body_height;
        self.vy = 0.0;
        self.jump_count = 0;
        self.y = match mode {
            MovementMode::Flight => self.max_y(config) / 2.0,
            _ => self.surface_y(config),
        };
        self.supported = mode != MovementMode::Flight;
        self.clamp_to_bounds(config);
    }

    /// Highest legal `y` for the current height.
    #[inline]
    pub fn max_y(&self, config: &PhysicsConfig) -> f32 {
        (config.ceiling - self.height).max(0.0)
    }

    /// Resting `y` on the gravity surface.
    #[inline]
    pub fn surface_y(&self, config: &PhysicsConfig) -> f32 {
        match self.gravity {
            Gravity::Down => 0.0,
            Gravity::Up => self.max_y(config),
        }
    }

    /// Edge of the body facing the gravity surface ("feet").
    #[inline]
    pub fn feet(&self) -> f32 {
        match self.gravity {
            Gravity::Down => self.y,
            Gravity::Up => self.y + self.height,
        }
    }

    /// Is the body moving toward the gravity surface?
    #[inline]
    pub fn is_falling(&self) -> bool {
        self.vy * self.gravity.sign() > 0.0
    }

    /// Is the body in contact with the gravity surface itself (not a platform)?
    #[inline]
    pub fn touches_gravity_surface(&self, config: &PhysicsConfig) -> bool {
        match self.gravity {
            Gravity::Down => self.y <= 0.0,
            Gravity::Up => self.y >= self.max_y(config),
        }
    }

    /// Airborne in a walking mode (used for the "isJumping" flag peers see).
    pub fn is_jumping(&self) -> bool {
        self.mode != MovementMode::Flight && !self.supported
    }

    /// Visual bounds.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    /// Collision bounds, smaller than the visual box.
    pub fn hitbox(&self, config: &PhysicsConfig) -> Aabb {
        self.bounds().inset(config.hitbox_inset_x, config.hitbox_inset_y)
    }

    /// Land on a surface whose feet-facing coordinate is `surface`.
    pub fn land_at(&mut self, surface: f32, config: &PhysicsConfig) {
        self.y = match self.gravity {
            Gravity::Down => surface,
            Gravity::Up => surface - self.height,
        };
        self.vy = 0.0;
        self.jump_count = 0;
        self.supported = true;
        self.clamp_to_bounds(config);
    }

    /// Enter or leave the slide, keeping the feet where they are. Leaving
    /// is refused while the full-height body would not fit in the playfield.
    pub fn set_sliding(&mut self, sliding: bool, config: &PhysicsConfig) {
        if self.sliding == sliding {
            return;
        }
        let full = config.body_height;
        let half = full / 2.0;
        if !sliding && !self.has_room_to_stand(config) {
            return;
        }
        self.sliding = sliding;
        if sliding {
            self.height = half;
            if self.gravity == Gravity::Up {
                self.y += half;
            }
        } else {
            self.height = full;
            if self.gravity == Gravity::Up {
                self.y -= half;
            }
        }
        self.clamp_to_bounds(config);
    }

    /// Would the body fit at full height with its feet where they are now?
    pub fn has_room_to_stand(&self, config: &PhysicsConfig) -> bool {
        let grow = config.body_height - self.height;
        match self.gravity {
            Gravity::Down => self.y + config.body_height <= config.ceiling,
            Gravity::Up => self.y - grow >= 0.0,
        }
    }

    /// Clamp position into the playfield; kill velocity into a wall.
    pub fn clamp_to_bounds(&mut self, config: &PhysicsConfig) {
        let max_y = self.max_y(config);
        if !self.y.is_finite() {
            self.y = self.surface_y(config);
            self.vy = 0.0;
        }
        if self.y < 0.0 {
            self.y = 0.0;
            self.vy = self.vy.max(0.0);
        } else if self.y > max_y {
            self.y = max_y;
            self.vy = self.vy.min(0.0);
        }
    }
}

// =============================================================================
// MODE UPDATES
// =============================================================================

fn update_normal(body: &mut PhysicsBody, input: InputFrame, config: &PhysicsConfig) {
    update_walking(body, input, config);
}

fn update_inverted(body: &mut PhysicsBody, input: InputFrame, config: &PhysicsConfig) {
    update_walking(body, input, config);
}

/// Shared jump/gravity integration; the gravity direction does the mirroring.
fn update_walking(body: &mut PhysicsBody, input: InputFrame, config: &PhysicsConfig) {
    let fall = body.gravity.sign();

    // Crouch only while standing on something
    let want_slide = input.crouch_held() && body.supported;
    body.set_sliding(want_slide, config);

    if input.activate_pressed() && body.jump_count < config.max_jumps {
        body.set_sliding(false, config);
        body.vy = -fall * config.jump_velocity;
        body.jump_count += 1;
    }
    body.vy += fall * config.gravity;

    body.y += body.vy;
    body.supported = false;

    if body.is_falling() && body.touches_gravity_surface(config) {
        body.y = body.surface_y(config);
        body.vy = 0.0;
        body.jump_count = 0;
        body.supported = true;
    }

    body.clamp_to_bounds(config);
}

fn update_flight(body: &mut PhysicsBody, input: InputFrame, config: &PhysicsConfig) {
    let fall = body.gravity.sign();
    body.set_sliding(false, config);

    if input.activate_held() {
        body.vy -= fall * config.flight_thrust;
    } else {
        body.vy += fall * config.flight_sink;
    }
    body.vy = body.vy.clamp(-config.flight_max_speed, config.flight_max_speed);

    body.y += body.vy;
    body.supported = false;
    body.jump_count = 0;

    body.clamp_to_bounds(config);
}

// =============================================================================
// TESTS
// =============================================================================
