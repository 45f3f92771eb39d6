//! Axis-aligned rectangle geometry
//!
//! Every collision, pickup and spacing check in the game goes through
//! [`intersects`]. Rectangles are stored as top-left corner plus size with
//! the y axis pointing down.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self::new(pos.x, pos.y, size.x, size.y)
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    /// Same size, moved by `offset`
    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.w, self.h)
    }

    /// Grown by `pad` on all sides (negative shrinks)
    pub fn inflated(&self, pad: f32) -> Self {
        Self::new(self.x - pad, self.y - pad, self.w + pad * 2.0, self.h + pad * 2.0)
    }

    /// Extended downward by `amount`, keeping the top edge
    pub fn extended_down(&self, amount: f32) -> Self {
        Self::new(self.x, self.y, self.w, self.h + amount)
    }

    /// Extended upward by `amount`, keeping the bottom edge
    pub fn extended_up(&self, amount: f32) -> Self {
        Self::new(self.x, self.y - amount, self.w, self.h + amount)
    }

    /// True when the horizontal extents overlap (touching edges don't count)
    pub fn overlaps_x(&self, other: &Rect) -> bool {
        self.x < other.right() && self.right() > other.x
    }

    /// Strict point containment
    pub fn contains(&self, p: Vec2) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }

    /// Penetration depth along the shallower axis (0 when not overlapping)
    pub fn overlap_depth(&self, other: &Rect) -> f32 {
        let dx = self.right().min(other.right()) - self.x.max(other.x);
        let dy = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if dx <= 0.0 || dy <= 0.0 {
            0.0
        } else {
            dx.min(dy)
        }
    }
}

/// Check whether two rectangles overlap, with `b` inflated by `padding`.
///
/// Edges that merely touch do not count as overlapping.
#[inline]
pub fn intersects(a: &Rect, b: &Rect, padding: f32) -> bool {
    a.x < b.x + b.w + padding
        && a.x + a.w > b.x - padding
        && a.y < b.y + b.h + padding
        && a.y + a.h > b.y - padding
}
