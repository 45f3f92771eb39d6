//! Upward-ratcheting camera
//!
//! The camera's y is the top edge of the view. It chases a target a fixed
//! fraction of the view above the actor with critically damped smoothing and
//! never moves back down, so falling behind it is how a run ends.

use serde::{Deserialize, Serialize};

use crate::consts::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Top edge of the view
    pub y: f32,
    /// Smoothing velocity
    vel: f32,
    pub view_height: f32,
}

impl Camera {
    /// Start already framed on `actor_y`
    pub fn new(actor_y: f32, view_height: f32) -> Self {
        Self {
            y: Self::target_for(actor_y, view_height),
            vel: 0.0,
            view_height,
        }
    }

    /// Where the view's top edge wants to be for an actor at `actor_y`
    pub fn target_for(actor_y: f32, view_height: f32) -> f32 {
        actor_y - CAMERA_LEAD * view_height
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.view_height
    }

    /// Critically damped step toward `target` (upward only)
    pub fn follow(&mut self, target: f32, dt: f32) {
        if target >= self.y {
            self.vel = 0.0;
            return;
        }

        let omega = 2.0 / CAMERA_SMOOTH_TIME;
        let x = omega * dt;
        let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
        let change = self.y - target;
        let temp = (self.vel + omega * change) * dt;
        self.vel = (self.vel - omega * temp) * decay;

        let mut next = target + (change + temp) * decay;
        // Never overshoot past the target
        if next < target {
            next = target;
            self.vel = 0.0;
        }
        self.y = next.min(self.y);
    }
}
