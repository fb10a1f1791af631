//! Duct centerlines and the drawing session that produces them.

mod events;
mod manager;

pub use events::{DrawingEvent, EventBus, EventKind, SubscriptionId};
pub use manager::{CenterlineDrawingManager, DrawingPhase};

use crate::error::{ConfigError, ConfigResult, check_threshold};
use crate::snap::SnapPoint;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationWarning;

/// Representation of a centerline path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CenterlineType {
    /// Smooth path; points carry tangents.
    Arc,
    /// Straight segments between points.
    #[default]
    Segmented,
}

impl CenterlineType {
    /// The other representation.
    pub fn toggled(self) -> Self {
        match self {
            CenterlineType::Arc => CenterlineType::Segmented,
            CenterlineType::Segmented => CenterlineType::Arc,
        }
    }
}

/// How pointer input is turned into points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawingMode {
    /// Each click places a point.
    #[default]
    PointToPoint,
    /// The caller streams throttled drag positions into `add_point`.
    Continuous,
    /// Like point-to-point, but new sessions default to arc centerlines.
    ArcGuided,
}

/// A point of a centerline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterlinePoint {
    pub x: f64,
    pub y: f64,
    /// Unit direction from the previous point. Only set on arc centerlines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangent: Option<Vec2>,
}

impl CenterlinePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, tangent: None }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for CenterlinePoint {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Unit tangent from `prev` to `point`, `None` for coincident points.
fn tangent_between(prev: Point, point: Point) -> Option<Vec2> {
    let delta = point - prev;
    let len = delta.hypot();
    (len > f64::EPSILON).then(|| delta / len)
}

/// A drawn duct path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Centerline {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CenterlineType,
    pub points: Vec<CenterlinePoint>,
    #[serde(default)]
    pub warnings: Vec<ValidationWarning>,
    #[serde(rename = "isSMACNACompliant", default)]
    pub is_smacna_compliant: bool,
}

impl Centerline {
    /// Create a centerline seeded with its start point.
    pub fn new(kind: CenterlineType, start: Point) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            points: vec![CenterlinePoint::from(start)],
            warnings: Vec::new(),
            is_smacna_compliant: true,
        }
    }

    /// Last committed point.
    pub fn last_point(&self) -> Option<Point> {
        self.points.last().map(CenterlinePoint::position)
    }

    /// Number of straight segments between consecutive points.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Total polyline length.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].position().distance(w[1].position()))
            .sum()
    }

    /// Append a point, deriving its tangent on arc centerlines.
    pub(crate) fn push_point(&mut self, position: Point) {
        let tangent = match (self.kind, self.last_point()) {
            (CenterlineType::Arc, Some(prev)) => tangent_between(prev, position),
            _ => None,
        };
        self.points.push(CenterlinePoint {
            x: position.x,
            y: position.y,
            tangent,
        });
    }

    /// Switch representation, recomputing or dropping tangents.
    pub(crate) fn convert(&mut self, kind: CenterlineType) {
        self.kind = kind;
        match kind {
            CenterlineType::Segmented => {
                for point in &mut self.points {
                    point.tangent = None;
                }
            }
            CenterlineType::Arc => {
                let mut prev: Option<Point> = None;
                for point in &mut self.points {
                    let here = point.position();
                    point.tangent = prev.and_then(|p| tangent_between(p, here));
                    prev = Some(here);
                }
            }
        }
    }
}

/// Options for [`CenterlineDrawingManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CenterlineDrawingConfig {
    pub mode: DrawingMode,
    pub default_type: CenterlineType,
    /// Run snap detection on every candidate point.
    pub auto_snap: bool,
    /// Track a preview point for live feedback.
    pub show_preview: bool,
    /// Call the validator after each committed point.
    #[serde(rename = "validateSMACNA")]
    pub validate_smacna: bool,
    /// Minimum distance between consecutive points, in pixels.
    pub min_segment_length: f64,
    /// Maximum number of points placed after the start point.
    pub max_points: usize,
}

impl Default for CenterlineDrawingConfig {
    fn default() -> Self {
        Self {
            mode: DrawingMode::PointToPoint,
            default_type: CenterlineType::Segmented,
            auto_snap: true,
            show_preview: true,
            validate_smacna: true,
            min_segment_length: 10.0,
            max_points: 50,
        }
    }
}

impl CenterlineDrawingConfig {
    /// Check every option, returning the first violation.
    pub fn validate(&self) -> ConfigResult<()> {
        check_threshold("min_segment_length", self.min_segment_length)?;
        if self.max_points == 0 {
            return Err(ConfigError::Zero { field: "max_points" });
        }
        Ok(())
    }
}

/// Snapshot of the drawing session for the UI layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingState {
    pub is_active: bool,
    pub current_centerline: Option<Centerline>,
    pub preview_point: Option<CenterlinePoint>,
    pub snap_target: Option<SnapPoint>,
}
