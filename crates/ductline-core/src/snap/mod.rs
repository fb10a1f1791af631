//! Snap detection: snap point model, spatial index, query cache and the
//! detection service that ties them together.

mod cache;
mod config;
mod index;
mod service;
pub mod targets;

pub use cache::{CacheKey, CacheMetrics, CachedQuery, SnapCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_MS};
pub use config::SnapDetectionConfig;
pub use index::{IndexInconsistency, SpatialIndex, DEFAULT_CELL_SIZE};
pub use service::{
    AreaQuery, DetectionStatistics, IntegrityIssue, IntegrityReport, SnapDetectionService,
    SnapPointUpdate, SnapQueryOptions, DISTANCE_WEIGHT, MAGNETIC_CONFIDENCE_SCALE, PRIORITY_WEIGHT,
};

use crate::error::ConfigError;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Kind of geometric feature a snap point represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapPointType {
    /// End of a segment or corner of a shape.
    Endpoint,
    /// Point on the centerline of a duct segment.
    Centerline,
    /// Midpoint of an edge.
    Midpoint,
    /// Crossing of two segments.
    Intersection,
    /// Grid intersection.
    Grid,
    /// User-placed point.
    Custom,
}

impl SnapPointType {
    /// All snap point types.
    pub const ALL: [SnapPointType; 6] = [
        SnapPointType::Endpoint,
        SnapPointType::Centerline,
        SnapPointType::Midpoint,
        SnapPointType::Intersection,
        SnapPointType::Grid,
        SnapPointType::Custom,
    ];

    /// Single-bit mask for this type.
    pub fn bit(self) -> u8 {
        match self {
            SnapPointType::Endpoint => 1 << 0,
            SnapPointType::Centerline => 1 << 1,
            SnapPointType::Midpoint => 1 << 2,
            SnapPointType::Intersection => 1 << 3,
            SnapPointType::Grid => 1 << 4,
            SnapPointType::Custom => 1 << 5,
        }
    }

    /// Priority usually assigned to this type by geometry extraction.
    pub fn default_priority(self) -> SnapPriority {
        match self {
            SnapPointType::Endpoint | SnapPointType::Intersection => SnapPriority::HIGHEST,
            SnapPointType::Midpoint => SnapPriority(2),
            SnapPointType::Centerline => SnapPriority(3),
            SnapPointType::Custom => SnapPriority(4),
            SnapPointType::Grid => SnapPriority::LOWEST,
        }
    }
}

/// Fold a set of snap point types into a bit mask.
pub fn type_mask<'a>(types: impl IntoIterator<Item = &'a SnapPointType>) -> u8 {
    types.into_iter().fold(0, |mask, kind| mask | kind.bit())
}

/// Snap priority: 1 is the highest, 5 the lowest.
///
/// Lower values win ties between candidates at equal distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SnapPriority(u8);

impl SnapPriority {
    pub const HIGHEST: SnapPriority = SnapPriority(1);
    pub const LOWEST: SnapPriority = SnapPriority(5);

    /// Create a priority, rejecting values outside `1..=5`.
    pub fn new(value: u8) -> Result<Self, ConfigError> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidPriority(value))
        }
    }

    /// The ordinal value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Priority mapped onto `[0, 1]`, 0 for the highest priority.
    pub fn normalized(self) -> f64 {
        f64::from(self.0 - Self::HIGHEST.0) / f64::from(Self::LOWEST.0 - Self::HIGHEST.0)
    }
}

impl Default for SnapPriority {
    fn default() -> Self {
        SnapPriority(3)
    }
}

impl TryFrom<u8> for SnapPriority {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SnapPriority> for u8 {
    fn from(priority: SnapPriority) -> Self {
        priority.0
    }
}

/// Kind of element that owns a snap point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    Room,
    Segment,
    Equipment,
    Centerline,
    Grid,
    #[default]
    Custom,
    Other(String),
}

/// Typed extension data attached to a snap point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapMetadata {
    /// Human readable label for tooltips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Index of the segment within its element, for multi-segment geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    /// Other elements involved, e.g. both segments of an intersection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_element_ids: Vec<String>,
    /// Free-form string tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A registered location that pointer positions can snap to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapPoint {
    /// Unique identifier within a service.
    pub id: String,
    /// Feature kind.
    #[serde(rename = "type")]
    pub kind: SnapPointType,
    /// World position.
    pub position: Point,
    /// Tie-break priority.
    #[serde(default)]
    pub priority: SnapPriority,
    /// Owning element (lookup only).
    #[serde(default)]
    pub element_id: String,
    /// Kind of the owning element.
    #[serde(default)]
    pub element_type: ElementType,
    /// Inactive points are skipped by queries but stay registered.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Optional extension data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnapMetadata>,
}

fn default_active() -> bool {
    true
}

impl SnapPoint {
    /// Create an active snap point with the type's default priority.
    pub fn new(id: impl Into<String>, kind: SnapPointType, position: Point) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            priority: kind.default_priority(),
            element_id: String::new(),
            element_type: ElementType::default(),
            is_active: true,
            metadata: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: SnapPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the owning element.
    pub fn with_element(mut self, element_id: impl Into<String>, element_type: ElementType) -> Self {
        self.element_id = element_id.into();
        self.element_type = element_type;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: SnapMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the active flag.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Whether a query with the given exclusions may return this point.
    pub fn is_candidate(&self, exclude_types: &HashSet<SnapPointType>) -> bool {
        self.is_active && !exclude_types.contains(&self.kind)
    }
}

/// How strongly a result is attracted to its snap point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapZone {
    /// Nothing in range.
    #[default]
    None,
    /// Between the snap and magnetic thresholds: soft attraction.
    Magnetic,
    /// Within the snap threshold: hard lock.
    Locked,
}

/// Result of a snap query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapResult {
    /// Whether the position was attracted to a snap point.
    pub is_snapped: bool,
    /// The winning snap point.
    pub snap_point: Option<SnapPoint>,
    /// Distance from the query position to the snap point (0 when unsnapped).
    pub distance: f64,
    /// Position to use instead of the query position.
    pub adjusted_position: Point,
    /// Attraction strength in `[0, 1]`.
    pub confidence: f64,
    /// Wall clock time of detection, in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Attraction zone.
    #[serde(default)]
    pub zone: SnapZone,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(position: Point) -> Self {
        Self {
            is_snapped: false,
            snap_point: None,
            distance: 0.0,
            adjusted_position: position,
            confidence: 0.0,
            timestamp_ms: now_millis(),
            zone: SnapZone::None,
        }
    }

    /// Whether the result is a hard lock.
    pub fn is_locked(&self) -> bool {
        self.zone == SnapZone::Locked
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(SnapPriority::new(0).is_err());
        assert!(SnapPriority::new(6).is_err());
        assert_eq!(SnapPriority::new(2).unwrap().value(), 2);
        assert_eq!(SnapPriority::HIGHEST.normalized(), 0.0);
        assert_eq!(SnapPriority::LOWEST.normalized(), 1.0);
    }

    #[test]
    fn test_priority_serde_rejects_out_of_range() {
        let json = r#"{"id":"a","type":"endpoint","position":{"x":1.0,"y":2.0},"priority":9}"#;
        assert!(serde_json::from_str::<SnapPoint>(json).is_err());

        let json = r#"{"id":"a","type":"midpoint","position":{"x":1.0,"y":2.0},"priority":2}"#;
        let point: SnapPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.kind, SnapPointType::Midpoint);
        assert_eq!(point.priority.value(), 2);
        assert!(point.is_active);
    }

    #[test]
    fn test_type_mask() {
        let set: HashSet<_> = [SnapPointType::Grid, SnapPointType::Endpoint].into_iter().collect();
        assert_eq!(type_mask(&set), SnapPointType::Grid.bit() | SnapPointType::Endpoint.bit());
        assert_eq!(type_mask(&SnapPointType::ALL), 0b11_1111);
    }

    #[test]
    fn test_candidate_filter() {
        let point = SnapPoint::new("p", SnapPointType::Grid, Point::ZERO);
        let mut exclude = HashSet::new();
        assert!(point.is_candidate(&exclude));
        exclude.insert(SnapPointType::Grid);
        assert!(!point.is_candidate(&exclude));
        assert!(!point.clone().with_active(false).is_candidate(&HashSet::new()));
    }

    #[test]
    fn test_unsnapped_result_keeps_position() {
        let result = SnapResult::none(Point::new(3.0, 4.0));
        assert!(!result.is_snapped);
        assert_eq!(result.adjusted_position, Point::new(3.0, 4.0));
        assert_eq!(result.confidence, 0.0);
    }
}
