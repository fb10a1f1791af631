//! Ductline application shell.
//!
//! Loads configuration and replay scripts and drives a headless drawing
//! session through `ductline-core`.

pub mod replay;
pub mod script;

pub use replay::{ReplayReport, StepOutcome, replay};
pub use script::{Action, Script};

use ductline_core::{ConfigError, EngineConfig};
use std::path::Path;
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid script: {0}")]
    Script(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Load the engine configuration, falling back to defaults without a path.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Read and parse a replay script.
pub fn load_script(path: &Path) -> Result<Script> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| AppError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| AppError::Script(format!("{}: {}", path.display(), e)))
}

/// Serialize a replay report.
pub fn render_report(report: &ReplayReport, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    json.map_err(|e| AppError::Serialization(e.to_string()))
}
