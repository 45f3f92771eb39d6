//! Personal bests
//!
//! The host persists these between runs; the session reads them at run start
//! and submits results when a run ends.

use serde::{Deserialize, Serialize};

/// Best height (endless) and best completion time (time attack)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    /// Highest height reached, in height units
    pub best_height: u32,
    /// Fastest time-attack completion in seconds
    pub best_time: Option<f32>,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a height would beat the stored best
    pub fn is_height_record(&self, height: u32) -> bool {
        height > self.best_height
    }

    /// Check if a completion time would beat the stored best
    pub fn is_time_record(&self, time: f32) -> bool {
        self.best_time.is_none_or(|best| time < best)
    }

    /// Record a finished run's height. Returns true if it is a new best.
    pub fn submit_height(&mut self, height: u32) -> bool {
        if !self.is_height_record(height) {
            return false;
        }
        self.best_height = height;
        true
    }

    /// Record a completion time. Returns true if it is a new best.
    pub fn submit_time(&mut self, time: f32) -> bool {
        if !time.is_finite() || !self.is_time_record(time) {
            return false;
        }
        self.best_time = Some(time);
        true
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
