//! Demo autopilot
//!
//! Drives a session without a player: picks the nearest reachable foothold
//! above the actor, steers under it, jumps, and dashes near the apex when the
//! jump alone falls short. Used by the headless driver and for attract mode.

use glam::Vec2;

use super::geom::Rect;
use super::state::{Actor, World};
use super::tick::FrameInput;
use crate::consts::*;

/// Footholds higher than this above the actor's feet are ignored
const MAX_TARGET_RISE: f32 = 220.0;
/// Footholds further than this sideways are ignored
const MAX_TARGET_REACH: f32 = 260.0;
/// Horizontal slack when lining up under a target
const ALIGN_SLACK: f32 = 10.0;
/// Upward speed under which the jump counts as near its apex
const APEX_SPEED: f32 = 120.0;

#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    target: Option<Vec2>,
    jump_held: bool,
    frames: u64,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current target foothold (top centre), if any
    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    /// Produce this frame's input
    pub fn drive(&mut self, actor: &Actor, world: &World) -> FrameInput {
        self.frames += 1;
        let mut input = FrameInput::default();

        if actor.grounded || self.target.is_none() {
            self.target = nearest_foothold(actor, world);
        }

        let Some(target) = self.target else {
            // Nothing in reach: wander so the camera keeps revealing terrain
            input.direction = if (self.frames / 90) % 2 == 0 { 1 } else { -1 };
            input.jump_pressed = actor.grounded;
            input.jump_held = true;
            return input;
        };

        let dx = target.x - actor.center().x;
        if dx.abs() > ALIGN_SLACK {
            input.direction = dx.signum() as i8;
        }

        let below_target = actor.bottom() > target.y;
        if actor.grounded && below_target {
            input.jump_pressed = true;
            self.jump_held = true;
        } else if actor.grounded {
            self.jump_held = false;
        }

        // Near the apex and still short: spend the dash
        if !actor.grounded
            && actor.can_dash
            && !actor.is_dashing()
            && actor.vel.y > -APEX_SPEED
            && actor.bottom() > target.y + TILE_SIZE
        {
            input.dash_pressed = true;
        }

        input.jump_held = self.jump_held;
        input
    }
}

/// Top centre of the closest landable surface above the actor's feet
fn nearest_foothold(actor: &Actor, world: &World) -> Option<Vec2> {
    let feet = actor.bottom();
    let cx = actor.center().x;

    let in_reach = |r: &Rect| {
        let rise = feet - r.top();
        rise > 1.0 && rise <= MAX_TARGET_RISE && (r.center_x() - cx).abs() <= MAX_TARGET_REACH
    };

    world
        .solids
        .iter()
        .filter(|s| s.is_collidable() && s.crumble.is_none())
        .map(|s| &s.rect)
        .chain(world.platforms.iter().map(|p| &p.rect))
        .filter(|r| in_reach(r))
        .filter(|r| !world.solid_overlaps(&Rect::new(r.center_x() - 1.0, r.top() - ACTOR_SIZE, 2.0, ACTOR_SIZE - 1.0), 0.0))
        .min_by(|a, b| {
            let da = Vec2::new(a.center_x() - cx, a.top() - feet).length();
            let db = Vec2::new(b.center_x() - cx, b.top() - feet).length();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| Vec2::new(r.center_x(), r.top()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_foothold_above() {
        let mut world = World::new();
        world.add_solid(Rect::new(0.0, 200.0, 480.0, 48.0));
        world.add_solid(Rect::new(300.0, 120.0, 72.0, 24.0));
        let actor = Actor::standing_at(200.0, 200.0);

        let mut pilot = Autopilot::new();
        let input = pilot.drive(&actor, &world);
        assert_eq!(pilot.target(), Some(Vec2::new(336.0, 120.0)));
        assert_eq!(input.direction, 1);
        assert!(input.jump_pressed);
        assert!(input.jump_held);
        assert!(!input.dash_pressed);
    }

    #[test]
    fn test_dashes_when_short_at_apex() {
        let mut world = World::new();
        world.add_solid(Rect::new(190.0, 0.0, 24.0, 24.0));
        let mut actor = Actor::new(Vec2::new(190.0, 150.0));
        actor.grounded = false;
        actor.vel = Vec2::new(0.0, -50.0);

        let mut pilot = Autopilot::new();
        let input = pilot.drive(&actor, &world);
        assert!(pilot.target().is_some());
        assert!(input.dash_pressed);
    }

    #[test]
    fn test_wanders_without_target() {
        let world = World::new();
        let actor = Actor::standing_at(240.0, 200.0);
        let mut pilot = Autopilot::new();
        let input = pilot.drive(&actor, &world);
        assert!(pilot.target().is_none());
        assert_ne!(input.direction, 0);
    }
}
