//! Collision detection and response for the actor hitbox
//!
//! Movement is resolved one axis at a time: horizontal first (with a small
//! step-up allowance so tile seams and shallow ledges don't act as walls),
//! then vertical (one-way platforms, then solids with ceiling corner
//! correction).

use super::geom::{Rect, intersects};
use super::state::{Actor, Platform, Solid};
use crate::consts::*;

/// Result of the vertical pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerticalContact {
    /// Landed on a solid or platform top
    pub grounded: bool,
    /// Solid that was landed on, if any
    pub ground_id: Option<u32>,
    /// Head hit a ceiling and vertical speed was zeroed
    pub bonked: bool,
}

/// Resolve horizontal overlap after the actor moved along x.
///
/// A solid whose top sits no more than `STEP_UP_HEIGHT` above the feet is
/// walked onto instead of blocking. A solid only grazing the top of the head
/// is left to the vertical pass.
pub fn resolve_x(actor: &mut Actor, solids: &[Solid]) {
    // Direction of travel; the first push zeroes the velocity
    let vx = actor.vel.x;
    for s in solids.iter().filter(|s| s.is_collidable()) {
        if !intersects(&actor.rect(), &s.rect, 0.0) {
            continue;
        }

        let rise = actor.bottom() - s.rect.top();
        if rise > 0.0
            && rise <= STEP_UP_HEIGHT
            && actor.vel.y >= STEP_UP_MIN_VY
            && headroom_is_free(actor, s.rect.top(), solids, s.id)
        {
            actor.pos.y = s.rect.top() - actor.size.y;
            continue;
        }

        if s.rect.bottom() <= actor.pos.y + HEAD_MARGIN {
            continue;
        }

        if vx > 0.0 {
            actor.pos.x = actor.pos.x.min(s.rect.left() - actor.size.x);
            actor.vel.x = 0.0;
        } else if vx < 0.0 {
            actor.pos.x = actor.pos.x.max(s.rect.right());
            actor.vel.x = 0.0;
        }
    }
}

/// Stepping up must not lift the actor into a stacked tile
fn headroom_is_free(actor: &Actor, surface_y: f32, solids: &[Solid], skip_id: u32) -> bool {
    let lifted = Rect::new(actor.pos.x, surface_y - actor.size.y, actor.size.x, actor.size.y);
    !solids
        .iter()
        .filter(|s| s.id != skip_id && s.is_collidable())
        .any(|s| intersects(&lifted, &s.rect, 0.0))
}

/// Keep the actor inside the playable width
pub fn clamp_to_bounds(actor: &mut Actor) {
    if actor.pos.x < 0.0 {
        actor.pos.x = 0.0;
        actor.vel.x = 0.0;
    }
    if actor.pos.x + actor.size.x > VIEW_WIDTH {
        actor.pos.x = VIEW_WIDTH - actor.size.x;
        actor.vel.x = 0.0;
    }
}

/// Land on one-way platforms. Only call while falling and not dashing.
///
/// The feet must lie within `PLATFORM_LAND_BAND` below the platform top, so
/// the actor passes through from below and only stops from above.
pub fn land_on_platforms(actor: &mut Actor, platforms: &[Platform]) -> bool {
    let mut landed = false;
    for pl in platforms {
        if !actor.rect().overlaps_x(&pl.rect) {
            continue;
        }
        let feet = actor.bottom();
        if feet >= pl.rect.top() && feet <= pl.rect.top() + PLATFORM_LAND_BAND {
            actor.pos.y = pl.rect.top() - actor.size.y;
            actor.vel.y = 0.0;
            landed = true;
        }
    }
    landed
}

/// Resolve vertical overlap with solids after the actor moved along y.
///
/// Rising into a ceiling edge that overlaps the actor horizontally by no more
/// than `CORNER_CORRECTION` nudges the actor sideways instead of stopping it,
/// provided the nudged position is free.
pub fn resolve_y(actor: &mut Actor, solids: &[Solid]) -> VerticalContact {
    let mut contact = VerticalContact::default();

    for s in solids.iter().filter(|s| s.is_collidable()) {
        let body = actor.rect();
        if !intersects(&body, &s.rect, 0.0) {
            continue;
        }

        let overlap_left = body.right() - s.rect.left();
        let overlap_right = s.rect.right() - body.left();
        let overlap_top = body.bottom() - s.rect.top();
        let overlap_bottom = s.rect.bottom() - body.top();

        if actor.vel.y >= 0.0 && overlap_top < LAND_TOLERANCE {
            actor.pos.y = s.rect.top() - actor.size.y;
            actor.vel.y = 0.0;
            contact.grounded = true;
            contact.ground_id = Some(s.id);
        } else if actor.vel.y < 0.0 && overlap_bottom < LAND_TOLERANCE {
            let nudged = if overlap_left <= CORNER_CORRECTION {
                Some(s.rect.left() - actor.size.x - CORNER_NUDGE)
            } else if overlap_right <= CORNER_CORRECTION {
                Some(s.rect.right() + CORNER_NUDGE)
            } else {
                None
            };

            match nudged.filter(|&x| corner_is_free(actor, x, solids, s.id)) {
                Some(x) => actor.pos.x = x,
                None => {
                    actor.pos.y = s.rect.bottom();
                    actor.vel.y = 0.0;
                    contact.bonked = true;
                }
            }
        }
    }

    contact
}

/// A corner nudge must stay in bounds and not push into another solid
fn corner_is_free(actor: &Actor, x: f32, solids: &[Solid], skip_id: u32) -> bool {
    if x < 0.0 || x + actor.size.x > VIEW_WIDTH {
        return false;
    }
    let moved = Rect::new(x, actor.pos.y, actor.size.x, actor.size.y);
    !solids
        .iter()
        .filter(|s| s.id != skip_id && s.is_collidable())
        .any(|s| intersects(&moved, &s.rect, 0.0))
}

/// Check for a wall beside the actor's trunk, `offset` pixels to the side.
///
/// Solids whose top is level with the feet are floors, not walls.
pub fn touching_wall(actor: &Actor, solids: &[Solid], offset: f32) -> bool {
    let trunk = Rect::new(
        actor.pos.x + offset,
        actor.pos.y + WALL_TRUNK_MARGIN,
        actor.size.x,
        actor.size.y - WALL_TRUNK_MARGIN * 2.0,
    );
    solids
        .iter()
        .filter(|s| s.is_collidable())
        .filter(|s| s.rect.top() < actor.bottom() - HEAD_MARGIN)
        .any(|s| intersects(&trunk, &s.rect, 0.0))
}

/// Which side has a wall within wall-bounce reach: 1 right, -1 left
pub fn wall_bounce_side(actor: &Actor, solids: &[Solid]) -> Option<f32> {
    let probe = Rect::new(
        actor.pos.x - WALL_BOUNCE_REACH,
        actor.pos.y,
        actor.size.x + WALL_BOUNCE_REACH * 2.0,
        actor.size.y,
    );
    solids
        .iter()
        .filter(|s| s.is_collidable())
        .find(|s| intersects(&probe, &s.rect, 0.0))
        .map(|s| if s.rect.x > actor.pos.x { 1.0 } else { -1.0 })
}
