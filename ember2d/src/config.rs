use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::math::{Color, BLACK};

/// Runtime configuration shared by the managers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Default cross-fade length in seconds for scene transitions.
    pub transition_duration: f32,
    /// Prepare scenes on a worker thread unless a call says otherwise.
    pub async_scene_loading: bool,
    pub fade_color: Color,
    pub button_hover_scale: f32,
    pub button_press_scale: f32,
    /// Seconds a button takes to animate between interaction states.
    pub button_animation: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            screen_width: 1280,
            screen_height: 720,
            transition_duration: 0.5,
            async_scene_loading: false,
            fade_color: BLACK,
            button_hover_scale: 1.05,
            button_press_scale: 0.95,
            button_animation: 0.12,
        }
    }
}

impl RuntimeConfig {
    /// Override the screen size used for overlays.
    #[must_use]
    pub fn with_screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self
    }

    /// Override the default scene transition length.
    #[must_use]
    pub fn with_transition_duration(mut self, seconds: f32) -> Self {
        self.transition_duration = seconds.max(0.0);
        self
    }

    /// Enable or disable background scene preparation by default.
    #[must_use]
    pub fn with_async_scene_loading(mut self, enabled: bool) -> Self {
        self.async_scene_loading = enabled;
        self
    }

    #[must_use]
    pub fn with_fade_color(mut self, color: Color) -> Self {
        self.fade_color = color;
        self
    }

    /// Deserialize a config from JSON. Missing fields use their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a config from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&json)
    }
}
