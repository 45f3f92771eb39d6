//! Run configuration
//!
//! Loaded from JSON by the host. Every field has a default, so a partial file
//! (or none at all) is fine. Physics tuning is compile-time, see `consts`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_VIEW_HEIGHT;

/// Errors from loading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameMode {
    /// Climb as high as possible; scored by height
    #[default]
    Endless,
    /// Race to a fixed height; scored by time
    TimeAttack,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Endless => "Endless",
            GameMode::TimeAttack => "Time Attack",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "endless" => Some(GameMode::Endless),
            "time_attack" | "timeattack" | "time-attack" => Some(GameMode::TimeAttack),
            _ => None,
        }
    }
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: GameMode,
    /// Time-attack finish height in height units
    pub goal_height: u32,
    /// Visible world height in pixels (the width is fixed)
    pub view_height: f32,

    // === Feel ===
    /// Freeze frames on dash and crystal pickup
    pub hit_stop: bool,

    // === Visual Effects ===
    /// Cosmetic particles and ripples
    pub particles: bool,
    /// Particle cap
    pub max_particles: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: GameMode::Endless,
            goal_height: 1000,
            view_height: DEFAULT_VIEW_HEIGHT,
            hit_stop: true,
            particles: true,
            max_particles: 500,
        }
    }
}

impl Settings {
    /// Settings for a mode with everything else default
    pub fn for_mode(mode: GameMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Effective particle cap
    pub fn particle_cap(&self) -> usize {
        if self.particles { self.max_particles } else { 0 }
    }

    /// Goal height handed to the generator (time attack only)
    pub fn goal(&self) -> Option<u32> {
        match self.mode {
            GameMode::TimeAttack => Some(self.goal_height),
            GameMode::Endless => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.view_height.is_finite() || self.view_height < 200.0 {
            return Err(ConfigError::Invalid(format!(
                "view_height must be at least 200, got {}",
                self.view_height
            )));
        }
        if self.mode == GameMode::TimeAttack && self.goal_height == 0 {
            return Err(ConfigError::Invalid(
                "goal_height must be positive in time attack".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Load from a JSON file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }
}
