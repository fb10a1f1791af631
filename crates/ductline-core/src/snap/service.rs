//! Snap detection service: the single entry point for "what should this
//! pointer position snap to".

use super::cache::{CacheKey, CacheMetrics, CachedQuery, SnapCache};
use super::config::SnapDetectionConfig;
use super::index::{IndexInconsistency, SpatialIndex, compare_candidates};
use super::{SnapMetadata, SnapPoint, SnapPointType, SnapPriority, SnapResult, SnapZone, now_millis, type_mask};
use crate::error::ConfigResult;
use kurbo::Point;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Weight of normalized distance in the priority-weighted score.
pub const DISTANCE_WEIGHT: f64 = 0.7;

/// Weight of normalized priority in the priority-weighted score.
pub const PRIORITY_WEIGHT: f64 = 0.3;

/// Confidence multiplier for results in the magnetic (soft) zone.
///
/// Magnetic confidence is `0.5 * (1 - d / magnetic)`, measured against the
/// magnetic radius. It does not continue the locked curve: locked confidence
/// falls to 0 at the snap radius, while magnetic confidence starts there at
/// `0.5 * (1 - snap / magnetic)`. Callers comparing confidences across the
/// boundary should compare zones first.
pub const MAGNETIC_CONFIDENCE_SCALE: f64 = 0.5;

/// Per-query overrides for [`SnapDetectionService::find_closest_snap_point`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapQueryOptions {
    /// Types excluded in addition to the configured ones.
    pub exclude_types: HashSet<SnapPointType>,
    /// Override of the configured snap threshold.
    pub snap_threshold: Option<f64>,
    /// Override of the configured magnetic threshold.
    pub magnetic_threshold: Option<f64>,
}

/// Area query for [`SnapDetectionService::find_snap_points_in_area`].
#[derive(Debug, Clone, PartialEq)]
pub struct AreaQuery {
    pub center: Point,
    /// Defaults to the configured magnetic threshold.
    pub radius: Option<f64>,
    /// Types excluded in addition to the configured ones.
    pub exclude_types: HashSet<SnapPointType>,
    /// Defaults to no limit.
    pub max_results: Option<usize>,
}

impl AreaQuery {
    /// Query around `center` with default radius and no limit.
    pub fn around(center: Point) -> Self {
        Self {
            center,
            radius: None,
            exclude_types: HashSet::new(),
            max_results: None,
        }
    }

    /// Set the radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }
}

/// Partial update applied by [`SnapDetectionService::update_snap_point`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapPointUpdate {
    pub position: Option<Point>,
    pub kind: Option<SnapPointType>,
    pub priority: Option<SnapPriority>,
    pub is_active: Option<bool>,
    pub metadata: Option<SnapMetadata>,
}

impl SnapPointUpdate {
    fn apply(self, point: &mut SnapPoint) {
        if let Some(position) = self.position {
            point.position = position;
        }
        if let Some(kind) = self.kind {
            point.kind = kind;
        }
        if let Some(priority) = self.priority {
            point.priority = priority;
        }
        if let Some(is_active) = self.is_active {
            point.is_active = is_active;
        }
        if let Some(metadata) = self.metadata {
            point.metadata = Some(metadata);
        }
    }
}

/// Observability snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStatistics {
    pub snap_point_count: usize,
    pub active_snap_point_count: usize,
    pub bucket_count: usize,
    pub cell_size: f64,
    pub config_version: u64,
    pub total_queries: u64,
    pub average_detection_ms: f64,
    pub last_detection_ms: f64,
    pub cache: CacheMetrics,
}

/// A finding of [`SnapDetectionService::validate_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// The spatial index disagrees with itself.
    Index(IndexInconsistency),
    /// A snap point references an element the registry no longer knows.
    OrphanedElement { snap_point_id: String, element_id: String },
    /// A snap point has no element reference at all.
    MissingElementReference { snap_point_id: String },
    /// Every snap point of an element is inactive.
    InactiveElement { element_id: String },
}

/// Result of an integrity check. Nothing is repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub errors: Vec<IntegrityIssue>,
    pub warnings: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// True when no errors were found. Warnings do not affect validity.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns a spatial index and a query cache and answers snap queries.
///
/// Every mutation of snap points or configuration clears the cache before
/// returning, so a query never observes a stale result.
#[derive(Debug, Clone)]
pub struct SnapDetectionService {
    config: SnapDetectionConfig,
    config_version: u64,
    index: SpatialIndex,
    cache: SnapCache,
    total_queries: u64,
    total_detection: Duration,
    last_detection: Duration,
}

impl Default for SnapDetectionService {
    fn default() -> Self {
        let config = SnapDetectionConfig::default();
        Self::build(config)
    }
}

impl SnapDetectionService {
    /// Create a service, rejecting invalid configuration.
    pub fn new(config: SnapDetectionConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SnapDetectionConfig) -> Self {
        Self {
            index: SpatialIndex::new(config.cell_size),
            cache: SnapCache::new(config.cache_capacity),
            config,
            config_version: 0,
            total_queries: 0,
            total_detection: Duration::ZERO,
            last_detection: Duration::ZERO,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &SnapDetectionConfig {
        &self.config
    }

    /// Replace the configuration. Invalid configuration leaves the service untouched.
    pub fn update_config(&mut self, config: SnapDetectionConfig) -> ConfigResult<()> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected snap detection config: {}", e);
            return Err(e);
        }

        if config.cell_size != self.config.cell_size {
            self.index.rebuild_with_cell_size(config.cell_size);
        }
        self.cache.set_capacity(config.cache_capacity);
        self.config = config;
        self.config_version += 1;
        self.cache.clear();
        log::debug!("Snap detection config updated (version {})", self.config_version);
        Ok(())
    }

    /// Enable or disable detection.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            self.config.enabled = enabled;
            self.config_version += 1;
            self.cache.clear();
        }
    }

    /// Find the snap point a pointer position should be attracted to.
    pub fn find_closest_snap_point(&mut self, position: Point, options: Option<&SnapQueryOptions>) -> SnapResult {
        if !self.config.enabled {
            return SnapResult::none(position);
        }

        let started = Instant::now();
        let snap_threshold = options
            .and_then(|o| o.snap_threshold)
            .unwrap_or(self.config.snap_threshold);
        let magnetic_threshold = options
            .and_then(|o| o.magnetic_threshold)
            .unwrap_or(self.config.magnetic_threshold)
            .max(snap_threshold);

        let mut exclude = self.config.exclude_types.clone();
        if let Some(opts) = options {
            exclude.extend(opts.exclude_types.iter().copied());
        }

        let key = CacheKey::new(
            position,
            self.config.cache_precision,
            self.config_version,
            type_mask(&exclude),
            snap_threshold,
            magnetic_threshold,
        );

        if let Some(cached) = self.cache.get(&key) {
            let result = if cached.origin == position {
                cached.result
            } else {
                // Same key, different exact position: decide again from the
                // cached neighbourhood instead of reusing the old decision.
                let candidates = self.nearest_within(&cached.neighbourhood, position, magnetic_threshold);
                self.decide(position, &candidates, snap_threshold, magnetic_threshold)
            };
            self.record_detection(started);
            return result;
        }

        let spread = CachedQuery::key_spread(self.config.cache_precision);
        let neighbourhood = self
            .index
            .query_radius(position, magnetic_threshold + spread, &exclude, None);
        let candidates = self.nearest_within(&neighbourhood, position, magnetic_threshold);
        let result = self.decide(position, &candidates, snap_threshold, magnetic_threshold);

        log::trace!(
            "Snap query at ({:.1}, {:.1}): {} candidates, snapped={}",
            position.x,
            position.y,
            candidates.len(),
            result.is_snapped
        );

        let query = CachedQuery {
            origin: position,
            result: result.clone(),
            neighbourhood,
        };
        self.cache
            .set(key, query, Duration::from_millis(self.config.cache_ttl_ms));
        self.record_detection(started);
        result
    }

    /// Points of `pool` within `radius` of `position`, nearest first, capped
    /// at `max_snap_points`.
    fn nearest_within(&self, pool: &[SnapPoint], position: Point, radius: f64) -> Vec<SnapPoint> {
        let radius_sq = radius * radius;
        let mut hits: Vec<(f64, &SnapPoint)> = pool
            .iter()
            .map(|p| (position.distance_squared(p.position), p))
            .filter(|(d, _)| *d <= radius_sq)
            .collect();
        hits.sort_by(|a, b| compare_candidates(a.0, a.1, b.0, b.1));
        hits.truncate(self.config.max_snap_points);
        hits.into_iter().map(|(_, p)| p.clone()).collect()
    }

    fn decide(&self, position: Point, candidates: &[SnapPoint], snap: f64, magnetic: f64) -> SnapResult {
        match self.select_winner(position, candidates, magnetic) {
            None => SnapResult::none(position),
            Some(winner) => {
                let distance = position.distance(winner.position);
                build_snapped(winner.clone(), distance, snap, magnetic)
            }
        }
    }

    fn select_winner<'a>(&self, position: Point, candidates: &'a [SnapPoint], magnetic: f64) -> Option<&'a SnapPoint> {
        if !self.config.priority_weighting {
            // Candidates already arrive nearest-first with priority and id tie-breaks.
            return candidates.first();
        }

        let score = |p: &SnapPoint| {
            let normalized_distance = if magnetic > 0.0 {
                position.distance(p.position) / magnetic
            } else {
                0.0
            };
            normalized_distance * DISTANCE_WEIGHT + p.priority.normalized() * PRIORITY_WEIGHT
        };

        candidates.iter().min_by(|a, b| {
            score(a).total_cmp(&score(b)).then_with(|| {
                compare_candidates(
                    position.distance_squared(a.position),
                    a,
                    position.distance_squared(b.position),
                    b,
                )
            })
        })
    }

    fn record_detection(&mut self, started: Instant) {
        let elapsed = started.elapsed();
        self.total_queries += 1;
        self.total_detection += elapsed;
        self.last_detection = elapsed;
    }

    /// Snap points around a position, nearest first.
    pub fn find_snap_points_in_area(&self, query: &AreaQuery) -> Vec<SnapPoint> {
        let radius = query
            .radius
            .filter(|r| r.is_finite() && *r >= 0.0)
            .unwrap_or(self.config.magnetic_threshold);
        let mut exclude = self.config.exclude_types.clone();
        exclude.extend(query.exclude_types.iter().copied());
        self.index.query_radius(query.center, radius, &exclude, query.max_results)
    }

    // --- Snap point CRUD ---

    /// Register a snap point, replacing any point with the same id.
    pub fn add_snap_point(&mut self, point: SnapPoint) -> Option<SnapPoint> {
        self.cache.clear();
        self.index.insert(point)
    }

    /// Register many snap points at once.
    pub fn add_snap_points(&mut self, points: impl IntoIterator<Item = SnapPoint>) -> usize {
        self.cache.clear();
        let mut count = 0;
        for point in points {
            self.index.insert(point);
            count += 1;
        }
        count
    }

    /// Remove a snap point. Returns false if the id is not registered.
    pub fn remove_snap_point(&mut self, id: &str) -> bool {
        let removed = self.index.remove(id).is_some();
        if removed {
            self.cache.clear();
        }
        removed
    }

    /// Apply a partial update. Returns false if the id is not registered.
    pub fn update_snap_point(&mut self, id: &str, update: SnapPointUpdate) -> bool {
        let Some(mut point) = self.index.remove(id) else {
            return false;
        };
        update.apply(&mut point);
        self.index.insert(point);
        self.cache.clear();
        true
    }

    /// Toggle whether a point takes part in queries.
    pub fn set_snap_point_active(&mut self, id: &str, is_active: bool) -> bool {
        self.update_snap_point(
            id,
            SnapPointUpdate {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
    }

    /// Get a snap point by id.
    pub fn get_snap_point(&self, id: &str) -> Option<&SnapPoint> {
        self.index.get(id)
    }

    /// All snap points, sorted by id.
    pub fn get_all_snap_points(&self) -> Vec<SnapPoint> {
        let mut points: Vec<SnapPoint> = self.index.iter().cloned().collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        points
    }

    /// All snap points owned by an element, sorted by id.
    pub fn snap_points_for_element(&self, element_id: &str) -> Vec<SnapPoint> {
        let mut points: Vec<SnapPoint> = self
            .index
            .iter()
            .filter(|p| p.element_id == element_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        points
    }

    /// Remove every snap point owned by an element. Returns the number removed.
    pub fn remove_element_snap_points(&mut self, element_id: &str) -> usize {
        let ids: Vec<String> = self
            .index
            .iter()
            .filter(|p| p.element_id == element_id)
            .map(|p| p.id.clone())
            .collect();
        for id in &ids {
            self.index.remove(id);
        }
        if !ids.is_empty() {
            self.cache.clear();
        }
        ids.len()
    }

    /// Remove every snap point.
    pub fn clear_snap_points(&mut self) {
        self.index.clear();
        self.cache.clear();
    }

    /// Number of registered snap points.
    pub fn snap_point_count(&self) -> usize {
        self.index.len()
    }

    // --- Maintenance and diagnostics ---

    /// Rebuild the spatial index, re-tuning its cell size when spatial
    /// optimization is enabled.
    pub fn optimize_spatial_index(&mut self) {
        let cell_size = if self.config.spatial_optimization && self.config.magnetic_threshold > 0.0 {
            self.config.magnetic_threshold * 2.0
        } else {
            self.index.cell_size()
        };
        self.index.rebuild_with_cell_size(cell_size);
        self.cache.clear();
        log::debug!(
            "Spatial index rebuilt: {} points in {} buckets (cell size {})",
            self.index.len(),
            self.index.bucket_count(),
            cell_size
        );
    }

    /// Read-only access to the index.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Cache counters.
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    /// Aggregate statistics for the diagnostics surface.
    pub fn get_statistics(&self) -> DetectionStatistics {
        let average = if self.total_queries == 0 {
            0.0
        } else {
            self.total_detection.as_secs_f64() * 1000.0 / self.total_queries as f64
        };
        DetectionStatistics {
            snap_point_count: self.index.len(),
            active_snap_point_count: self.index.iter().filter(|p| p.is_active).count(),
            bucket_count: self.index.bucket_count(),
            cell_size: self.index.cell_size(),
            config_version: self.config_version,
            total_queries: self.total_queries,
            average_detection_ms: average,
            last_detection_ms: self.last_detection.as_secs_f64() * 1000.0,
            cache: self.cache.metrics(),
        }
    }

    /// Check the index and element references.
    ///
    /// With `live_elements`, points whose element id is not in the set are
    /// reported as orphaned. Nothing is repaired.
    pub fn validate_integrity(&self, live_elements: Option<&HashSet<String>>) -> IntegrityReport {
        let mut report = IntegrityReport {
            errors: self
                .index
                .check_consistency()
                .into_iter()
                .map(IntegrityIssue::Index)
                .collect(),
            warnings: Vec::new(),
        };

        let mut by_element: HashMap<&str, Vec<&SnapPoint>> = HashMap::new();
        for point in self.index.iter() {
            by_element.entry(point.element_id.as_str()).or_default().push(point);
        }

        let mut elements: Vec<_> = by_element.into_iter().collect();
        elements.sort_by(|a, b| a.0.cmp(b.0));
        for (element_id, points) in elements {
            if !element_id.is_empty() && points.iter().all(|p| !p.is_active) {
                report.warnings.push(IntegrityIssue::InactiveElement {
                    element_id: element_id.to_string(),
                });
            }
            let mut ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
            ids.sort_unstable();
            for id in ids {
                if element_id.is_empty() {
                    report.warnings.push(IntegrityIssue::MissingElementReference {
                        snap_point_id: id.to_string(),
                    });
                } else if live_elements.is_some_and(|live| !live.contains(element_id)) {
                    report.warnings.push(IntegrityIssue::OrphanedElement {
                        snap_point_id: id.to_string(),
                        element_id: element_id.to_string(),
                    });
                }
            }
        }

        if !report.is_valid() {
            log::warn!("Snap index integrity check found {} errors", report.errors.len());
        }
        report
    }

    #[cfg(test)]
    pub(crate) fn index_mut_for_test(&mut self) -> &mut SpatialIndex {
        &mut self.index
    }
}

fn build_snapped(point: SnapPoint, distance: f64, snap: f64, magnetic: f64) -> SnapResult {
    let (zone, confidence) = if distance <= snap {
        let confidence = if snap > 0.0 { 1.0 - distance / snap } else { 1.0 };
        (SnapZone::Locked, confidence.max(0.0))
    } else {
        let falloff = if magnetic > 0.0 { 1.0 - distance / magnetic } else { 0.0 };
        (SnapZone::Magnetic, (falloff * MAGNETIC_CONFIDENCE_SCALE).clamp(0.0, 1.0))
    };

    SnapResult {
        is_snapped: true,
        adjusted_position: point.position,
        snap_point: Some(point),
        distance,
        confidence,
        timestamp_ms: now_millis(),
        zone,
    }
}
