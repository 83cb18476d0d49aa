//! # Renderer Configuration
//!
//! Tunables for the chunk scheduler, loaded from JSON. Every field has a default,
//! so a config file only needs to name the values it overrides:
//!
//! ```json
//! { "view_distance": 256.0, "max_rebuilds_per_frame": 8 }
//! ```

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::ConfigError;

/// Edge length of a chunk, in blocks.
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Scheduler and culling settings for a [`crate::map_renderer::MapRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Edge length of a chunk in blocks (one block is one world unit)
    pub chunk_size: u32,
    /// Chunks whose centre is farther than this are culled and released
    pub view_distance: f32,
    /// Lower bound of the adaptive per-frame rebuild target, at least 1
    pub min_rebuilds_per_frame: u32,
    /// Upper bound of the adaptive per-frame rebuild target
    pub max_rebuilds_per_frame: u32,
    /// Frame time the adaptive rebuild target tries to stay under
    pub target_frame_millis: f32,
    /// Share of the frame time that may be spent rebuilding meshes
    pub rebuild_budget_fraction: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            view_distance: 512.0,
            min_rebuilds_per_frame: 4,
            max_rebuilds_per_frame: 12,
            target_frame_millis: 1000.0 / 60.0,
            rebuild_budget_fraction: 0.5,
        }
    }
}

impl RendererConfig {
    /// Reads and validates a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON file
    ///
    /// # Returns
    /// The parsed configuration, or a [`ConfigError`] if the file cannot be read,
    /// is not valid JSON, or holds out-of-range values
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: RendererConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable by the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be non-zero".into()));
        }
        if !(self.view_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "view_distance must be positive, got {}",
                self.view_distance
            )));
        }
        if self.min_rebuilds_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "min_rebuilds_per_frame must be non-zero".into(),
            ));
        }
        if self.min_rebuilds_per_frame > self.max_rebuilds_per_frame {
            return Err(ConfigError::Invalid(format!(
                "min_rebuilds_per_frame ({}) exceeds max_rebuilds_per_frame ({})",
                self.min_rebuilds_per_frame, self.max_rebuilds_per_frame
            )));
        }
        if !(self.target_frame_millis > 0.0) {
            return Err(ConfigError::Invalid(
                "target_frame_millis must be positive".into(),
            ));
        }
        if !(self.rebuild_budget_fraction > 0.0 && self.rebuild_budget_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rebuild_budget_fraction must be in (0, 1], got {}",
                self.rebuild_budget_fraction
            )));
        }
        Ok(())
    }

    /// The frame time the rebuild target adapts towards.
    pub fn target_frame_time(&self) -> Duration {
        Duration::from_secs_f32(self.target_frame_millis / 1000.0)
    }

    /// Squared view distance, compared against squared chunk distances.
    pub fn view_distance_squared(&self) -> f32 {
        self.view_distance * self.view_distance
    }
}
