//! Snap detection options.

use super::SnapPointType;
use super::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_PRECISION, DEFAULT_CACHE_TTL_MS};
use super::index::DEFAULT_CELL_SIZE;
use crate::error::{ConfigError, ConfigResult, check_positive, check_threshold};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Options for [`SnapDetectionService`](super::SnapDetectionService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapDetectionConfig {
    /// Master switch.
    pub enabled: bool,
    /// Radius of the hard lock, in pixels.
    pub snap_threshold: f64,
    /// Radius of soft attraction, in pixels. Never smaller than `snap_threshold`.
    pub magnetic_threshold: f64,
    /// Blend priority into candidate scoring instead of pure nearest.
    pub priority_weighting: bool,
    /// Snap point types ignored by every query.
    pub exclude_types: HashSet<SnapPointType>,
    /// Maximum candidates considered per query.
    pub max_snap_points: usize,
    /// Re-tune the index cell size to the magnetic threshold on optimize.
    pub spatial_optimization: bool,
    /// Rounding step applied to positions before cache lookup.
    pub cache_precision: f64,
    /// Cache entry lifetime in milliseconds.
    pub cache_ttl_ms: u64,
    /// Maximum number of cached results.
    pub cache_capacity: usize,
    /// Spatial index bucket size, in pixels.
    pub cell_size: f64,
}

impl Default for SnapDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snap_threshold: 15.0,
            magnetic_threshold: 25.0,
            priority_weighting: true,
            exclude_types: HashSet::new(),
            max_snap_points: 10,
            spatial_optimization: true,
            cache_precision: DEFAULT_CACHE_PRECISION,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl SnapDetectionConfig {
    /// Check every option, returning the first violation.
    pub fn validate(&self) -> ConfigResult<()> {
        check_threshold("snap_threshold", self.snap_threshold)?;
        check_threshold("magnetic_threshold", self.magnetic_threshold)?;
        if self.magnetic_threshold < self.snap_threshold {
            return Err(ConfigError::MagneticBelowSnap {
                snap: self.snap_threshold,
                magnetic: self.magnetic_threshold,
            });
        }
        if self.max_snap_points == 0 {
            return Err(ConfigError::Zero { field: "max_snap_points" });
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero { field: "cache_capacity" });
        }
        check_positive("cache_precision", self.cache_precision)?;
        check_positive("cell_size", self.cell_size)?;
        Ok(())
    }

    /// Set both thresholds.
    pub fn with_thresholds(mut self, snap: f64, magnetic: f64) -> Self {
        self.snap_threshold = snap;
        self.magnetic_threshold = magnetic;
        self
    }
}
