//! Engine configuration loading.

use crate::centerline::CenterlineDrawingConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::snap::SnapDetectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Combined options for the snap service and the drawing manager.
///
/// Missing sections and fields fall back to their defaults, so `{}` is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub snap: SnapDetectionConfig,
    pub drawing: CenterlineDrawingConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.snap.validate()?;
        self.drawing.validate()
    }
}
