//! Simulation state types
//!
//! The actor, every generated entity and the owned `World` container that the
//! session lends to the generator and the simulator one call at a time.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::{Rect, intersects};
use crate::consts::*;
pub use crate::settings::GameMode;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Actor fell below the camera; terminal until a new run starts
    Dead,
    /// Time-attack goal reached; terminal until a new run starts
    Complete,
}

/// Dash in progress
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveDash {
    /// Seconds left before the dash ends
    pub remaining: f32,
    /// Unit direction (straight up or one of the two upward diagonals)
    pub dir: Vec2,
}

impl ActiveDash {
    /// Straight-up dashes are the only ones that open the wall-bounce window
    pub fn is_vertical(&self) -> bool {
        self.dir.x == 0.0 && self.dir.y < 0.0
    }
}

/// The player-controlled actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Top-left corner of the hitbox
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    /// -1 facing left, 1 facing right
    pub facing: f32,
    pub grounded: bool,
    pub can_dash: bool,
    pub dash: Option<ActiveDash>,
    /// -1 wall on the left, 1 wall on the right, 0 none
    pub on_wall: i8,
    pub wall_sliding: bool,
    /// Grace window after leaving the ground
    pub coyote: f32,
    pub jump_buffer: f32,
    pub dash_buffer: f32,
    /// Horizontal input is ignored while positive
    pub wall_jump_lock: f32,
    /// Open while a straight-up dash is running and briefly after
    pub wall_bounce: f32,
    /// Steering lock after a side spring
    pub spring_lock: f32,
    /// Time spent accelerating along the current input direction
    pub move_timer: f32,
    /// Set by jumps; releasing jump while rising cuts the arc once
    pub jump_cut_armed: bool,
    /// Id of the solid stood on after the last vertical resolve
    #[serde(skip)]
    pub ground_id: Option<u32>,
    /// Recent positions, newest first (followers sample it)
    #[serde(skip)]
    pub history: VecDeque<Vec2>,
    /// Berry ids following the actor, oldest first
    pub following: VecDeque<u32>,
    /// Berries cashed in this run
    pub berries: u32,
    /// Highest height reached this run, in height units
    pub highest: u32,
}

impl Actor {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            size: Vec2::splat(ACTOR_SIZE),
            facing: 1.0,
            grounded: false,
            can_dash: true,
            dash: None,
            on_wall: 0,
            wall_sliding: false,
            coyote: 0.0,
            jump_buffer: 0.0,
            dash_buffer: 0.0,
            wall_jump_lock: 0.0,
            wall_bounce: 0.0,
            spring_lock: 0.0,
            move_timer: 0.0,
            jump_cut_armed: false,
            ground_id: None,
            history: VecDeque::with_capacity(HISTORY_LENGTH),
            following: VecDeque::new(),
            berries: 0,
            highest: 0,
        }
    }

    /// Place the actor standing on a surface whose top is at `surface_y`
    pub fn standing_at(center_x: f32, surface_y: f32) -> Self {
        let mut actor = Self::new(Vec2::new(center_x - ACTOR_SIZE / 2.0, surface_y - ACTOR_SIZE));
        actor.grounded = true;
        actor.coyote = COYOTE_TIME;
        actor
    }

    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y + self.size.y
    }

    pub fn is_dashing(&self) -> bool {
        self.dash.is_some()
    }

    /// Remember press edges so the next eligible sub-step can consume them
    pub fn buffer_input(&mut self, jump_pressed: bool, dash_pressed: bool) {
        if jump_pressed {
            self.jump_buffer = JUMP_BUFFER_TIME;
        }
        if dash_pressed {
            self.dash_buffer = DASH_BUFFER_TIME;
        }
    }

    /// Record current position to history (call once per sub-step)
    pub fn record_history(&mut self) {
        self.history.push_front(self.pos);
        self.history.truncate(HISTORY_LENGTH);
    }
}

/// Crumbling solid lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Crumble {
    /// Untouched
    Idle,
    /// Chain trigger pending from a neighbour; starts shaking when the delay runs out
    Armed { delay: f32 },
    /// Shaking; breaks loose when the timer runs out
    Shaking { timer: f32 },
    /// Broken loose and falling; no longer collides with the actor
    Falling { vy: f32 },
}

/// Impassable terrain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solid {
    pub id: u32,
    pub rect: Rect,
    /// `Some` for crumbling terrain
    pub crumble: Option<Crumble>,
}

impl Solid {
    pub fn new(id: u32, rect: Rect) -> Self {
        Self { id, rect, crumble: None }
    }

    pub fn crumbling(id: u32, rect: Rect) -> Self {
        Self { id, rect, crumble: Some(Crumble::Idle) }
    }

    /// Falling solids have broken away and no longer block the actor
    pub fn is_collidable(&self) -> bool {
        !matches!(self.crumble, Some(Crumble::Falling { .. }))
    }
}

/// One-way ledge (blocks downward motion from above only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: u32,
    pub rect: Rect,
}

/// Launch direction of a spring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpringDir {
    Up,
    Left,
    Right,
}

impl SpringDir {
    /// Horizontal mirror
    pub fn mirrored(self) -> Self {
        match self {
            SpringDir::Up => SpringDir::Up,
            SpringDir::Left => SpringDir::Right,
            SpringDir::Right => SpringDir::Left,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spring {
    pub id: u32,
    pub rect: Rect,
    pub dir: SpringDir,
    /// 0 = idle, >0 = bouncing animation
    pub anim: f32,
}

impl Spring {
    /// Contact box (the tile shrunk on all sides)
    pub fn trigger_rect(&self) -> Rect {
        self.rect.inflated(-SPRING_INSET)
    }
}

/// Dash refill pickup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    pub id: u32,
    pub rect: Rect,
    /// Seconds until available again (0 = available)
    pub respawn: f32,
}

impl Crystal {
    pub fn is_available(&self) -> bool {
        self.respawn <= 0.0
    }
}

/// Berry lifecycle: Idle -> Following -> Collected, never backwards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BerryState {
    Idle,
    /// Trailing the actor; `settle` counts grounded time while at the front of the queue
    Following { settle: f32 },
    Collected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Berry {
    pub id: u32,
    pub rect: Rect,
    /// Rest height while idle (the berry bobs around it)
    pub base_y: f32,
    pub state: BerryState,
}

/// Time-attack finish: a full-width platform with a flag on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub platform: Rect,
    pub flag: Rect,
}

/// Cosmetic particle kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Dust,
    Crystal,
    Berry,
    Spring,
    Death,
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub kind: ParticleKind,
    /// 0-1, decreases over time
    pub life: f32,
    pub size: f32,
}

/// Expanding ring effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ripple {
    pub pos: Vec2,
    pub radius: f32,
    pub alpha: f32,
}

/// All entities of a run, owned by the session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    pub solids: Vec<Solid>,
    pub platforms: Vec<Platform>,
    pub springs: Vec<Spring>,
    pub crystals: Vec<Crystal>,
    pub berries: Vec<Berry>,
    pub goal: Option<Goal>,
    /// Visual particles (not gameplay-affecting)
    #[serde(skip)]
    pub particles: Vec<Particle>,
    #[serde(skip)]
    pub ripples: Vec<Ripple>,
    next_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn add_solid(&mut self, rect: Rect) -> u32 {
        let id = self.next_entity_id();
        self.solids.push(Solid::new(id, rect));
        id
    }

    pub fn add_crumbling(&mut self, rect: Rect) -> u32 {
        let id = self.next_entity_id();
        self.solids.push(Solid::crumbling(id, rect));
        id
    }

    pub fn add_platform(&mut self, rect: Rect) -> u32 {
        let id = self.next_entity_id();
        self.platforms.push(Platform { id, rect });
        id
    }

    pub fn add_spring(&mut self, rect: Rect, dir: SpringDir) -> u32 {
        let id = self.next_entity_id();
        self.springs.push(Spring { id, rect, dir, anim: 0.0 });
        id
    }

    pub fn add_crystal(&mut self, rect: Rect) -> u32 {
        let id = self.next_entity_id();
        self.crystals.push(Crystal { id, rect, respawn: 0.0 });
        id
    }

    pub fn add_berry(&mut self, rect: Rect) -> u32 {
        let id = self.next_entity_id();
        self.berries.push(Berry {
            id,
            rect,
            base_y: rect.y,
            state: BerryState::Idle,
        });
        id
    }

    pub fn berry_mut(&mut self, id: u32) -> Option<&mut Berry> {
        self.berries.iter_mut().find(|b| b.id == id)
    }

    /// Whether any solid overlaps `rect` (inflated by `padding`)
    pub fn solid_overlaps(&self, rect: &Rect, padding: f32) -> bool {
        self.solids.iter().any(|s| intersects(rect, &s.rect, padding))
    }

    /// Whether any pickup (crystal or berry) lies within `padding` of `rect`
    pub fn pickup_overlaps(&self, rect: &Rect, padding: f32) -> bool {
        self.crystals.iter().any(|c| intersects(rect, &c.rect, padding))
            || self
                .berries
                .iter()
                .any(|b| b.state == BerryState::Idle && intersects(rect, &b.rect, padding))
    }

    /// Drop everything whose top edge is at or below `limit_y`.
    ///
    /// Following berries are kept regardless of position; collected ones go.
    pub fn cull_below(&mut self, limit_y: f32) {
        self.solids.retain(|s| s.rect.y < limit_y);
        self.platforms.retain(|p| p.rect.y < limit_y);
        self.springs.retain(|s| s.rect.y < limit_y);
        self.crystals.retain(|c| c.rect.y < limit_y);
        self.berries.retain(|b| match b.state {
            BerryState::Following { .. } => true,
            BerryState::Collected => false,
            BerryState::Idle => b.rect.y < limit_y,
        });
        self.particles.retain(|p| p.life > 0.0 && p.pos.y < limit_y);
        self.ripples.retain(|r| r.alpha > 0.0);
    }

    /// Number of geometry and pickup entities (particles excluded)
    pub fn entity_count(&self) -> usize {
        self.solids.len()
            + self.platforms.len()
            + self.springs.len()
            + self.crystals.len()
            + self.berries.len()
    }
}

/// Events raised by the simulation, drained by the presentation layer.
///
/// Sound and haptics hang off these fire-and-forget; nothing in the
/// simulation waits on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Jump,
    WallJump,
    WallBounce,
    Dash { dir: Vec2 },
    Land,
    CrystalRefill { pos: Vec2 },
    CrystalRespawn { pos: Vec2 },
    BerryFollow { following: usize },
    BerryCollect { streak: u32, pos: Vec2 },
    SpringLaunch { dir: SpringDir, pos: Vec2 },
    CrumbleStart { pos: Vec2 },
    CrumbleFall { pos: Vec2 },
    ScoreUpdate {
        height: u32,
        berries: u32,
        is_record: bool,
        elapsed: f32,
        pending_berries: usize,
        speed: f32,
    },
    Milestone { height: u32 },
    NewRecord { height: u32 },
    GameOver {
        height: u32,
        berries: u32,
        is_new_record: bool,
        elapsed: f32,
    },
    LevelComplete { elapsed: f32, is_new_record: bool },
}
