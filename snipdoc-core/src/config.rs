use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_RENDER_SCALE: f32 = 1.5;
const MIN_RENDER_SCALE: f32 = 0.1;
const MAX_RENDER_SCALE: f32 = 8.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub render_scale: f32,
    pub initial_page: usize,
    pub highlight_color: [u8; 3],
    pub highlight_alpha: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            initial_page: 1,
            highlight_color: [255, 235, 0],
            highlight_alpha: 0.35,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        if !self.render_scale.is_finite() || self.render_scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.render_scale));
        }
        if self.initial_page == 0 {
            return Err(ConfigError::InvalidInitialPage);
        }
        self.render_scale = self.render_scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE);
        self.highlight_alpha = self.highlight_alpha.clamp(0.0, 1.0);
        Ok(self)
    }
}
