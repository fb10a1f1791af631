//! Replay script format.

use ductline_core::snap::targets::{self, GRID_SIZE};
use ductline_core::{CenterlineType, ElementType, SnapPoint};
use kurbo::{Line, Point, Rect};
use serde::Deserialize;

/// A duct segment whose endpoints and midpoint become snap points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSegment {
    pub id: String,
    pub start: Point,
    pub end: Point,
}

impl ScriptSegment {
    pub fn line(&self) -> Line {
        Line::new(self.start, self.end)
    }
}

/// A room whose corners, edge midpoints and center become snap points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRoom {
    pub id: String,
    pub min: Point,
    pub max: Point,
}

/// Grid snap points over a region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptGrid {
    pub min: Point,
    pub max: Point,
    #[serde(default = "default_grid_size")]
    pub size: f64,
}

fn default_grid_size() -> f64 {
    GRID_SIZE
}

/// One step of a drawing session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Start {
        x: f64,
        y: f64,
        #[serde(default, rename = "type")]
        kind: Option<CenterlineType>,
    },
    Add { x: f64, y: f64 },
    Preview { x: f64, y: f64 },
    RemoveLast,
    Complete,
    Cancel,
    ToggleType,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start { .. } => "start",
            Action::Add { .. } => "add",
            Action::Preview { .. } => "preview",
            Action::RemoveLast => "removeLast",
            Action::Complete => "complete",
            Action::Cancel => "cancel",
            Action::ToggleType => "toggleType",
        }
    }
}

/// Snap geometry plus the pointer actions to replay against it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Script {
    pub snap_points: Vec<SnapPoint>,
    pub segments: Vec<ScriptSegment>,
    pub rooms: Vec<ScriptRoom>,
    pub grid: Option<ScriptGrid>,
    pub actions: Vec<Action>,
}

impl Script {
    /// All snap points the script registers: explicit points first, then
    /// points derived from segments, segment crossings, rooms and the grid.
    pub fn collect_snap_points(&self) -> Vec<SnapPoint> {
        let mut points = self.snap_points.clone();

        for segment in &self.segments {
            points.extend(targets::segment_targets(&segment.id, ElementType::Segment, segment.line()));
        }
        for (i, a) in self.segments.iter().enumerate() {
            for b in &self.segments[i + 1..] {
                if let Some(p) = targets::intersection_target((&a.id, a.line()), (&b.id, b.line())) {
                    points.push(p);
                }
            }
        }
        for room in &self.rooms {
            let bounds = Rect::from_points(room.min, room.max);
            points.extend(targets::bounds_targets(&room.id, ElementType::Room, bounds));
        }
        if let Some(grid) = &self.grid {
            points.extend(targets::grid_targets(Rect::from_points(grid.min, grid.max), grid.size));
        }

        points
    }
}
