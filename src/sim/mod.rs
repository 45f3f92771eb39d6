//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (terrain and cosmetics draw from separate streams)
//! - Stable iteration order (insertion order, ids ascend)
//! - No rendering or platform dependencies

pub mod autopilot;
pub mod camera;
pub mod collision;
pub mod generator;
pub mod geom;
pub mod interact;
pub mod physics;
pub mod presets;
pub mod state;
pub mod tick;

pub use autopilot::Autopilot;
pub use camera::Camera;
pub use generator::{ChunkKind, ChunkReport, Difficulty, LevelGenerator, Momentum};
pub use geom::{Rect, intersects};
pub use state::{
    Actor, Berry, BerryState, Crumble, Crystal, GameEvent, GamePhase, Goal, Particle,
    ParticleKind, Platform, Ripple, Solid, Spring, SpringDir, World,
};
pub use tick::{FrameInput, Session};
