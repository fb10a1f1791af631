//! Snap point extraction from element geometry.
//!
//! The element registry owns rooms, duct segments and equipment. When their
//! geometry changes it turns them into snap points with these helpers and
//! pushes the result into the detection service.

use super::{ElementType, SnapMetadata, SnapPoint, SnapPointType};
use kurbo::{Line, ParamCurve, Point, Rect, Vec2};

/// Grid spacing used when no explicit spacing is given (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Maximum number of grid points generated for one region.
pub const MAX_GRID_POINTS: usize = 10_000;

/// Round a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

fn point_id(element_id: &str, suffix: &str) -> String {
    format!("{element_id}:{suffix}")
}

/// Endpoints and midpoint of a duct segment.
pub fn segment_targets(element_id: &str, element_type: ElementType, line: Line) -> Vec<SnapPoint> {
    vec![
        SnapPoint::new(point_id(element_id, "start"), SnapPointType::Endpoint, line.p0)
            .with_element(element_id, element_type.clone()),
        SnapPoint::new(point_id(element_id, "end"), SnapPointType::Endpoint, line.p1)
            .with_element(element_id, element_type.clone()),
        SnapPoint::new(point_id(element_id, "mid"), SnapPointType::Midpoint, line.eval(0.5))
            .with_element(element_id, element_type),
    ]
}

/// Endpoints, vertex points and segment midpoints of a polyline centerline.
///
/// Interior vertices are tagged as centerline points; midpoints carry their
/// segment index in the metadata.
pub fn polyline_targets(element_id: &str, element_type: ElementType, points: &[Point]) -> Vec<SnapPoint> {
    let mut targets = Vec::with_capacity(points.len() * 2);
    let last = points.len().saturating_sub(1);

    for (i, &p) in points.iter().enumerate() {
        let kind = if i == 0 || i == last {
            SnapPointType::Endpoint
        } else {
            SnapPointType::Centerline
        };
        targets.push(
            SnapPoint::new(point_id(element_id, &format!("v{i}")), kind, p)
                .with_element(element_id, element_type.clone()),
        );
    }

    for (i, pair) in points.windows(2).enumerate() {
        let mid = pair[0].midpoint(pair[1]);
        targets.push(
            SnapPoint::new(point_id(element_id, &format!("m{i}")), SnapPointType::Midpoint, mid)
                .with_element(element_id, element_type.clone())
                .with_metadata(SnapMetadata {
                    segment_index: Some(i),
                    ..Default::default()
                }),
        );
    }

    targets
}

/// Corners, edge midpoints and center of a bounding box.
pub fn bounds_targets(element_id: &str, element_type: ElementType, bounds: Rect) -> Vec<SnapPoint> {
    let corners = [
        ("tl", Point::new(bounds.x0, bounds.y0)),
        ("tr", Point::new(bounds.x1, bounds.y0)),
        ("br", Point::new(bounds.x1, bounds.y1)),
        ("bl", Point::new(bounds.x0, bounds.y1)),
    ];
    let center = bounds.center();
    let midpoints = [
        ("top", Point::new(center.x, bounds.y0)),
        ("right", Point::new(bounds.x1, center.y)),
        ("bottom", Point::new(center.x, bounds.y1)),
        ("left", Point::new(bounds.x0, center.y)),
    ];

    let mut targets = Vec::with_capacity(9);
    for (name, p) in corners {
        targets.push(
            SnapPoint::new(point_id(element_id, name), SnapPointType::Endpoint, p)
                .with_element(element_id, element_type.clone()),
        );
    }
    for (name, p) in midpoints {
        targets.push(
            SnapPoint::new(point_id(element_id, name), SnapPointType::Midpoint, p)
                .with_element(element_id, element_type.clone()),
        );
    }
    targets.push(
        SnapPoint::new(point_id(element_id, "center"), SnapPointType::Centerline, center)
            .with_element(element_id, element_type),
    );
    targets
}

/// Crossing point of two segments, if they intersect.
pub fn segment_intersection(a: Line, b: Line) -> Option<Point> {
    let r: Vec2 = a.p1 - a.p0;
    let s: Vec2 = b.p1 - b.p0;
    let denom = r.cross(s);
    if denom.abs() < 1e-12 {
        // Parallel or collinear.
        return None;
    }

    let qp = b.p0 - a.p0;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a.p0 + r * t)
    } else {
        None
    }
}

/// Intersection snap point between two segments owned by different elements.
pub fn intersection_target(
    (a_id, a): (&str, Line),
    (b_id, b): (&str, Line),
) -> Option<SnapPoint> {
    let p = segment_intersection(a, b)?;
    let (first, second) = if a_id <= b_id { (a_id, b_id) } else { (b_id, a_id) };
    Some(
        SnapPoint::new(format!("{first}x{second}"), SnapPointType::Intersection, p)
            .with_element(first, ElementType::Segment)
            .with_metadata(SnapMetadata {
                related_element_ids: vec![second.to_string()],
                ..Default::default()
            }),
    )
}

/// Grid intersections inside a region, capped at [`MAX_GRID_POINTS`].
pub fn grid_targets(region: Rect, grid_size: f64) -> Vec<SnapPoint> {
    if !(grid_size > 0.0) || region.area() <= 0.0 {
        return Vec::new();
    }

    let x_start = (region.x0 / grid_size).ceil() as i64;
    let x_end = (region.x1 / grid_size).floor() as i64;
    let y_start = (region.y0 / grid_size).ceil() as i64;
    let y_end = (region.y1 / grid_size).floor() as i64;

    let mut targets = Vec::new();
    'outer: for gx in x_start..=x_end {
        for gy in y_start..=y_end {
            if targets.len() >= MAX_GRID_POINTS {
                log::warn!("Grid snap points capped at {} for region {:?}", MAX_GRID_POINTS, region);
                break 'outer;
            }
            let p = Point::new(gx as f64 * grid_size, gy as f64 * grid_size);
            targets.push(
                SnapPoint::new(format!("grid:{gx}:{gy}"), SnapPointType::Grid, p)
                    .with_element("grid", ElementType::Grid),
            );
        }
    }
    targets
}
