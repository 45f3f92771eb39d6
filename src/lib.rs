//! Summit Dash - an endless vertical platformer
//!
//! Core modules:
//! - `sim`: Fixed-step simulation (actor physics, collisions, level generation, session)
//! - `settings`: Run configuration (mode, view size, effects)
//! - `records`: Best height / best time handed in and out at run boundaries

pub mod records;
pub mod settings;
pub mod sim;

pub use records::Records;
pub use settings::{ConfigError, GameMode, Settings};

/// Game configuration constants
///
/// World units are pixels and seconds. The y axis points down, so climbing
/// means decreasing y.
pub mod consts {
    /// Fixed physics sub-step (100 Hz)
    pub const PHYSICS_STEP: f32 = 0.01;
    /// Largest wall-clock delta processed per update (stall guard)
    pub const MAX_FRAME_DT: f32 = 0.1;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 12;

    /// Playfield dimensions
    pub const VIEW_WIDTH: f32 = 480.0;
    pub const TILE_SIZE: f32 = 24.0;
    pub const DEFAULT_VIEW_HEIGHT: f32 = 854.0;
    /// Top of the starting ground slab
    pub const GROUND_Y: f32 = 150.0;

    /// Actor hitbox (square)
    pub const ACTOR_SIZE: f32 = 24.0;

    /// Vertical motion. Max jump height is JUMP_FORCE² / 2·GRAVITY = 120px (5 tiles)
    pub const GRAVITY: f32 = 2666.0;
    pub const JUMP_FORCE: f32 = -800.0;
    pub const MAX_FALL_SPEED: f32 = 900.0;
    /// Upward speed multiplier when jump is released early
    pub const JUMP_CUT: f32 = 0.5;

    /// Run curve
    pub const MAX_SPEED: f32 = 320.0;
    pub const ACCEL_TIME: f32 = 0.096;
    pub const DECEL_TIME: f32 = 0.048;
    /// Friction time constant right after a wall jump (keeps the escape arc)
    pub const WALL_JUMP_DECEL_TIME: f32 = 0.4;
    /// Fraction of the overspeed surplus left after one second of pushing along it
    pub const OVERSPEED_DECAY: f32 = 0.02;
    /// Air drag per 1/60 s while a side-spring lock is active
    pub const SPRING_DRAG: f32 = 0.98;
    /// Horizontal speeds below this snap to zero when no input is held
    pub const STOP_SPEED: f32 = 5.0;

    /// Dash
    pub const DASH_SPEED: f32 = 1050.0;
    pub const DASH_TIME: f32 = 0.10;
    /// Airborne caps applied after the half-speed cut when a dash ends
    pub const DASH_EXIT_MAX_VX: f32 = 400.0;
    pub const DASH_EXIT_MAX_RISE: f32 = 600.0;

    /// Walls
    pub const WALL_SLIDE_SPEED: f32 = 150.0;
    pub const WALL_JUMP_X: f32 = 650.0;
    pub const WALL_JUMP_Y: f32 = -750.0;
    pub const WALL_JUMP_LOCK: f32 = 0.15;
    pub const WALL_BOUNCE_Y: f32 = -950.0;
    pub const WALL_BOUNCE_LOCK: f32 = 0.2;
    pub const WALL_BOUNCE_WINDOW: f32 = 0.08;
    /// Horizontal reach of the wall-bounce wall probe
    pub const WALL_BOUNCE_REACH: f32 = 12.0;

    /// Input grace windows
    pub const JUMP_BUFFER_TIME: f32 = 0.08;
    pub const DASH_BUFFER_TIME: f32 = 0.08;
    pub const COYOTE_TIME: f32 = 0.1;

    /// Springs
    pub const SPRING_SPEED_Y: f32 = -1050.0;
    pub const SPRING_SPEED_X: f32 = 750.0;
    pub const SPRING_SIDE_LIFT: f32 = -900.0;
    pub const SPRING_LOCK_TIME: f32 = 0.5;
    pub const SPRING_ANIM_TIME: f32 = 0.2;
    /// Spring trigger box is the tile shrunk by this much on each side
    pub const SPRING_INSET: f32 = 6.0;

    /// Pickups
    pub const CRYSTAL_SIZE: f32 = 22.0;
    pub const CRYSTAL_RESPAWN_TIME: f32 = 2.5;
    pub const BERRY_SIZE: f32 = 30.0;
    pub const SETTLE_TIME: f32 = 0.15;
    /// History samples between consecutive followers
    pub const FOLLOW_DELAY: usize = 8;
    pub const HISTORY_LENGTH: usize = 300;

    /// Crumbling solids
    pub const CRUMBLE_SHAKE_TIME: f32 = 0.4;
    pub const CRUMBLE_CHAIN_DELAY: f32 = 0.1;

    /// Collision tolerances
    pub const STEP_UP_HEIGHT: f32 = 6.0;
    pub const STEP_UP_MIN_VY: f32 = -200.0;
    pub const HEAD_MARGIN: f32 = 4.0;
    pub const WALL_TRUNK_MARGIN: f32 = 7.0;
    pub const WALL_PROBE: f32 = 2.0;
    pub const LAND_TOLERANCE: f32 = 20.0;
    pub const CORNER_CORRECTION: f32 = 12.0;
    pub const CORNER_NUDGE: f32 = 0.1;
    pub const PLATFORM_LAND_BAND: f32 = 10.0;
    pub const PLATFORM_THICKNESS: f32 = 14.0;

    /// Session
    pub const PIXELS_PER_UNIT: f32 = 10.0;
    pub const MILESTONE_INTERVAL: u32 = 500;
    /// Camera target sits this fraction of the view above the actor
    pub const CAMERA_LEAD: f32 = 0.45;
    pub const CAMERA_SMOOTH_TIME: f32 = 0.12;
    pub const DEATH_MARGIN: f32 = 100.0;
    pub const CULL_MARGIN: f32 = 100.0;
    /// Terrain is kept generated this far above the camera's top edge
    pub const GENERATION_LOOKAHEAD: f32 = 200.0;
    pub const HIT_STOP_DASH: f32 = 0.05;
    pub const HIT_STOP_CRYSTAL: f32 = 0.12;
}

/// Sign of a value as -1, 0 or 1 (f32::signum maps 0.0 to 1.0)
#[inline]
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Convert a y coordinate into climbed height units above `base_y`
#[inline]
pub fn height_units(base_y: f32, y: f32) -> u32 {
    ((base_y - y) / consts::PIXELS_PER_UNIT).floor().max(0.0) as u32
}
