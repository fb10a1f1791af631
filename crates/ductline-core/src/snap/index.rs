//! Grid-bucket spatial index over snap points.
//!
//! Points are bucketed into square cells keyed by integer cell coordinates.
//! Radius queries only visit the cells overlapping the query circle and
//! nearest-neighbor queries search expanding rings of cells, stopping once
//! no closer point is possible.

use super::{SnapPoint, SnapPointType};
use kurbo::Point;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Default bucket size in world units.
pub const DEFAULT_CELL_SIZE: f64 = 50.0;

type Cell = (i64, i64);

/// A problem found by [`SpatialIndex::check_consistency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexInconsistency {
    /// An id is referenced by more than one bucket entry.
    DuplicateEntry { id: String, occurrences: usize },
    /// A bucket references an id that has no stored point.
    DanglingEntry { id: String },
    /// A stored point is not referenced by any bucket.
    Unbucketed { id: String },
    /// A point sits in a bucket that does not match its position.
    Misplaced { id: String },
}

/// Spatial index over snap points.
///
/// The index is the authoritative store: it owns every registered point,
/// active or not. Queries skip inactive points.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    inv_cell_size: f64,
    points: HashMap<String, SnapPoint>,
    buckets: HashMap<Cell, Vec<String>>,
    /// Inclusive cell bounds of everything ever bucketed since the last rebuild.
    bounds: Option<(Cell, Cell)>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Create an empty index with the given bucket size.
    ///
    /// Non-positive or non-finite sizes fall back to [`DEFAULT_CELL_SIZE`].
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            inv_cell_size: cell_size.recip(),
            points: HashMap::new(),
            buckets: HashMap::new(),
            bounds: None,
        }
    }

    /// Bucket size in world units.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of registered points, active or not.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if no points are registered.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Get a point by id.
    pub fn get(&self, id: &str) -> Option<&SnapPoint> {
        self.points.get(id)
    }

    /// Check if an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.points.contains_key(id)
    }

    /// Iterate over all registered points in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapPoint> {
        self.points.values()
    }

    fn cell_of(&self, p: Point) -> Cell {
        (
            (p.x * self.inv_cell_size).floor() as i64,
            (p.y * self.inv_cell_size).floor() as i64,
        )
    }

    fn grow_bounds(&mut self, cell: Cell) {
        self.bounds = Some(match self.bounds {
            None => (cell, cell),
            Some((lo, hi)) => ((lo.0.min(cell.0), lo.1.min(cell.1)), (hi.0.max(cell.0), hi.1.max(cell.1))),
        });
    }

    /// Insert a point, replacing any point with the same id.
    /// Returns the replaced point.
    pub fn insert(&mut self, point: SnapPoint) -> Option<SnapPoint> {
        let previous = self.remove(&point.id);
        let cell = self.cell_of(point.position);
        self.buckets.entry(cell).or_default().push(point.id.clone());
        self.grow_bounds(cell);
        self.points.insert(point.id.clone(), point);
        previous
    }

    /// Remove a point by id. Returns `None` if the id is not registered.
    pub fn remove(&mut self, id: &str) -> Option<SnapPoint> {
        let point = self.points.remove(id)?;
        let cell = self.cell_of(point.position);
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.retain(|entry| entry != id);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
        Some(point)
    }

    /// Remove every point.
    pub fn clear(&mut self) {
        self.points.clear();
        self.buckets.clear();
        self.bounds = None;
    }

    /// Visit active, non-excluded points in the buckets overlapping a circle.
    fn candidates_in_circle<'a>(
        &'a self,
        center: Point,
        radius: f64,
        exclude_types: &'a HashSet<SnapPointType>,
    ) -> Box<dyn Iterator<Item = &'a SnapPoint> + 'a> {
        let lo = self.cell_of(Point::new(center.x - radius, center.y - radius));
        let hi = self.cell_of(Point::new(center.x + radius, center.y + radius));
        let width = hi.0.saturating_sub(lo.0).saturating_add(1);
        let height = hi.1.saturating_sub(lo.1).saturating_add(1);
        let span = width.saturating_mul(height);

        // Scanning more cells than there are buckets is slower than a full scan.
        if span < 0 || span as usize > self.buckets.len() {
            return Box::new(self.points.values().filter(move |p| p.is_candidate(exclude_types)));
        }

        Box::new(
            (lo.0..=hi.0)
                .flat_map(move |cx| (lo.1..=hi.1).map(move |cy| (cx, cy)))
                .filter_map(move |cell| self.buckets.get(&cell))
                .flatten()
                .filter_map(move |id| self.points.get(id))
                .filter(move |p| p.is_candidate(exclude_types)),
        )
    }

    /// Points within `radius` of `center`, nearest first.
    ///
    /// Ties on distance go to the lower priority value, then to the smaller id.
    /// Inactive points and `exclude_types` are skipped.
    pub fn query_radius(
        &self,
        center: Point,
        radius: f64,
        exclude_types: &HashSet<SnapPointType>,
        max_results: Option<usize>,
    ) -> Vec<SnapPoint> {
        if self.points.is_empty() || !(radius >= 0.0) {
            return Vec::new();
        }

        let radius_sq = radius * radius;
        let mut hits: Vec<(f64, &SnapPoint)> = self
            .candidates_in_circle(center, radius, exclude_types)
            .map(|p| (center.distance_squared(p.position), p))
            .filter(|(d, _)| *d <= radius_sq)
            .collect();

        hits.sort_by(|a, b| compare_candidates(a.0, a.1, b.0, b.1));
        if let Some(max) = max_results {
            hits.truncate(max);
        }
        hits.into_iter().map(|(_, p)| p.clone()).collect()
    }

    /// The nearest active point, regardless of distance.
    pub fn query_nearest(&self, position: Point) -> Option<SnapPoint> {
        let (lo, hi) = self.bounds?;
        let (qx, qy) = self.cell_of(position);
        let max_ring = [
            qx.saturating_sub(lo.0),
            hi.0.saturating_sub(qx),
            qy.saturating_sub(lo.1),
            hi.1.saturating_sub(qy),
        ]
        .into_iter()
        .map(i64::saturating_abs)
        .max()
        .unwrap_or(0);

        let side = max_ring.saturating_mul(2).saturating_add(1);
        let total_cells = side.saturating_mul(side);
        if total_cells < 0 || total_cells as usize > 4 * self.buckets.len().max(1) {
            return self.nearest_linear(position);
        }

        let mut best: Option<(f64, &SnapPoint)> = None;
        for ring in 0..=max_ring {
            // Rings 0-1 are always searched: the query may lie anywhere in its cell.
            if ring >= 2 {
                if let Some((best_sq, _)) = best {
                    let min_ring_dist = (ring - 1) as f64 * self.cell_size;
                    if min_ring_dist * min_ring_dist > best_sq {
                        break;
                    }
                }
            }

            for cell in ring_cells((qx, qy), ring) {
                let Some(bucket) = self.buckets.get(&cell) else {
                    continue;
                };
                for point in bucket.iter().filter_map(|id| self.points.get(id)) {
                    if !point.is_active {
                        continue;
                    }
                    let d = position.distance_squared(point.position);
                    let better = match best {
                        None => true,
                        Some((bd, bp)) => compare_candidates(d, point, bd, bp) == Ordering::Less,
                    };
                    if better {
                        best = Some((d, point));
                    }
                }
            }
        }

        best.map(|(_, p)| p.clone())
    }

    fn nearest_linear(&self, position: Point) -> Option<SnapPoint> {
        self.points
            .values()
            .filter(|p| p.is_active)
            .map(|p| (position.distance_squared(p.position), p))
            .min_by(|a, b| compare_candidates(a.0, a.1, b.0, b.1))
            .map(|(_, p)| p.clone())
    }

    /// Rebuild every bucket from the stored points.
    ///
    /// # Panics
    ///
    /// Panics if the rebuilt index does not hold exactly the points it held
    /// before; that means the index itself is corrupt.
    pub fn rebuild(&mut self) {
        self.rebuild_with_cell_size(self.cell_size);
    }

    /// Rebuild with a new bucket size.
    ///
    /// # Panics
    ///
    /// See [`SpatialIndex::rebuild`].
    pub fn rebuild_with_cell_size(&mut self, cell_size: f64) {
        let expected = self.points.len();
        let points: Vec<SnapPoint> = self.points.drain().map(|(_, p)| p).collect();
        *self = Self::new(cell_size);
        for point in points {
            self.insert(point);
        }
        let bucketed: usize = self.buckets.values().map(Vec::len).sum();
        assert_eq!(self.points.len(), expected, "spatial index lost points during rebuild");
        assert_eq!(bucketed, expected, "spatial index buckets out of sync after rebuild");
    }

    /// Cross-check buckets against stored points without repairing anything.
    pub fn check_consistency(&self) -> Vec<IndexInconsistency> {
        let mut issues = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (cell, bucket) in &self.buckets {
            for id in bucket {
                *seen.entry(id.as_str()).or_default() += 1;
                match self.points.get(id) {
                    None => issues.push(IndexInconsistency::DanglingEntry { id: id.clone() }),
                    Some(point) if self.cell_of(point.position) != *cell => {
                        issues.push(IndexInconsistency::Misplaced { id: id.clone() })
                    }
                    Some(_) => {}
                }
            }
        }

        for (id, occurrences) in &seen {
            if *occurrences > 1 {
                issues.push(IndexInconsistency::DuplicateEntry {
                    id: (*id).to_string(),
                    occurrences: *occurrences,
                });
            }
        }

        for id in self.points.keys() {
            if !seen.contains_key(id.as_str()) {
                issues.push(IndexInconsistency::Unbucketed { id: id.clone() });
            }
        }

        issues
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self, id: &str) {
        let cell = (i64::MAX / 2, i64::MAX / 2);
        self.buckets.entry(cell).or_default().push(id.to_string());
    }
}

/// Order candidates by distance, then priority, then id.
pub(crate) fn compare_candidates(da: f64, a: &SnapPoint, db: f64, b: &SnapPoint) -> Ordering {
    da.total_cmp(&db)
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.id.cmp(&b.id))
}

/// Cells at Chebyshev distance exactly `ring` from `center`, each once.
fn ring_cells(center: (i64, i64), ring: i64) -> Box<dyn Iterator<Item = (i64, i64)>> {
    let (qx, qy) = center;
    if ring == 0 {
        return Box::new(std::iter::once(center));
    }
    let (left, right) = (qx.saturating_sub(ring), qx.saturating_add(ring));
    let (top, bottom) = (qy.saturating_sub(ring), qy.saturating_add(ring));

    let rows = (left..=right).flat_map(move |cx| [(cx, top), (cx, bottom)]);
    let columns = (top.saturating_add(1)..bottom).flat_map(move |cy| [(left, cy), (right, cy)]);
    Box::new(rows.chain(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::SnapPriority;

    fn point(id: &str, x: f64, y: f64) -> SnapPoint {
        SnapPoint::new(id, SnapPointType::Endpoint, Point::new(x, y))
    }

    fn none() -> HashSet<SnapPointType> {
        HashSet::new()
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(point("a", 0.0, 0.0));
        let previous = index.insert(point("a", 100.0, 100.0));

        assert_eq!(previous.map(|p| p.position), Some(Point::new(0.0, 0.0)));
        assert_eq!(index.len(), 1);
        assert!(index.query_radius(Point::ZERO, 5.0, &none(), None).is_empty());
        assert_eq!(index.query_radius(Point::new(100.0, 100.0), 1.0, &none(), None).len(), 1);
        assert!(index.check_consistency().is_empty());
    }

    #[test]
    fn test_remove() {
        let mut index = SpatialIndex::default();
        index.insert(point("a", 1.0, 1.0));
        assert!(index.remove("a").is_some());
        assert!(index.remove("a").is_none());
        assert!(index.is_empty());
        assert_eq!(index.bucket_count(), 0);
    }

    #[test]
    fn test_query_radius_orders_by_distance_then_priority() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(point("far", 8.0, 0.0));
        index.insert(point("low", 0.0, 5.0).with_priority(SnapPriority::new(4).unwrap()));
        index.insert(point("high", 5.0, 0.0).with_priority(SnapPriority::new(2).unwrap()));
        index.insert(point("out", 30.0, 0.0));

        let ids: Vec<_> = index
            .query_radius(Point::ZERO, 10.0, &none(), None)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["high", "low", "far"]);

        let limited = index.query_radius(Point::ZERO, 10.0, &none(), Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "high");
    }

    #[test]
    fn test_query_radius_is_inclusive() {
        let mut index = SpatialIndex::new(4.0);
        index.insert(point("edge", 10.0, 0.0));
        assert_eq!(index.query_radius(Point::ZERO, 10.0, &none(), None).len(), 1);
    }

    #[test]
    fn test_query_radius_skips_inactive_and_excluded() {
        let mut index = SpatialIndex::default();
        index.insert(point("inactive", 1.0, 0.0).with_active(false));
        index.insert(SnapPoint::new("grid", SnapPointType::Grid, Point::new(2.0, 0.0)));
        index.insert(point("ok", 3.0, 0.0));

        let exclude: HashSet<_> = [SnapPointType::Grid].into_iter().collect();
        let hits = index.query_radius(Point::ZERO, 10.0, &exclude, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "ok");
    }

    #[test]
    fn test_query_spans_negative_cells() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(point("neg", -3.0, -3.0));
        index.insert(point("pos", 3.0, 3.0));
        let hits = index.query_radius(Point::new(-1.0, -1.0), 6.0, &none(), None);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "neg");
    }

    #[test]
    fn test_query_nearest() {
        let mut index = SpatialIndex::new(10.0);
        assert!(index.query_nearest(Point::ZERO).is_none());

        for i in 0..50 {
            index.insert(point(&format!("p{i}"), i as f64 * 37.0, (i % 7) as f64 * 23.0));
        }
        index.insert(point("inactive", 500.0, 500.0).with_active(false));

        let query = Point::new(501.0, 499.0);
        let expected = index
            .iter()
            .filter(|p| p.is_active)
            .min_by(|a, b| {
                query
                    .distance_squared(a.position)
                    .total_cmp(&query.distance_squared(b.position))
            })
            .map(|p| p.id.clone());
        assert_eq!(index.query_nearest(query).map(|p| p.id), expected);
    }

    #[test]
    fn test_ring_cells_cover_perimeter_once() {
        assert_eq!(ring_cells((3, -2), 0).collect::<Vec<_>>(), vec![(3, -2)]);
        for ring in 1..5 {
            let cells: Vec<_> = ring_cells((3, -2), ring).collect();
            let unique: HashSet<_> = cells.iter().copied().collect();
            assert_eq!(cells.len(), 8 * ring as usize);
            assert_eq!(unique.len(), cells.len());
            assert!(cells
                .iter()
                .all(|&(cx, cy)| (cx - 3).abs().max((cy + 2).abs()) == ring));
        }
    }

    #[test]
    fn test_query_nearest_ring_search_matches_linear() {
        let mut index = SpatialIndex::new(10.0);
        for i in 0..20 {
            for j in 0..20 {
                let x = i as f64 * 10.0 + (j % 3) as f64;
                let y = j as f64 * 10.0 + (i % 4) as f64;
                index.insert(point(&format!("p{i}-{j}"), x, y));
            }
        }
        index.remove("p9-9");
        index.remove("p10-10");

        for qx in (60..140).step_by(7) {
            for qy in (60..140).step_by(9) {
                let query = Point::new(qx as f64 + 0.5, qy as f64 + 0.25);
                assert_eq!(
                    index.query_nearest(query).map(|p| p.id),
                    index.nearest_linear(query).map(|p| p.id),
                    "query at {query:?}"
                );
            }
        }
    }

    #[test]
    fn test_query_nearest_far_away() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(point("a", 0.0, 0.0));
        index.insert(point("b", 10_000.0, 10_000.0));
        let nearest = index.query_nearest(Point::new(-50_000.0, 0.0)).unwrap();
        assert_eq!(nearest.id, "a");
    }

    #[test]
    fn test_rebuild_preserves_points() {
        let mut index = SpatialIndex::new(5.0);
        for i in 0..20 {
            index.insert(point(&format!("p{i}"), i as f64 * 3.0, 0.0));
        }
        let buckets_before = index.bucket_count();
        index.rebuild_with_cell_size(100.0);
        assert_eq!(index.len(), 20);
        assert!(index.bucket_count() < buckets_before);
        assert_eq!(index.query_radius(Point::ZERO, 6.0, &none(), None).len(), 3);
        assert!(index.check_consistency().is_empty());
    }

    #[test]
    fn test_check_consistency_reports_duplicates() {
        let mut index = SpatialIndex::default();
        index.insert(point("a", 0.0, 0.0));
        index.corrupt_for_test("a");
        index.corrupt_for_test("ghost");

        let issues = index.check_consistency();
        assert!(issues.contains(&IndexInconsistency::DuplicateEntry {
            id: "a".to_string(),
            occurrences: 2
        }));
        assert!(issues.contains(&IndexInconsistency::Misplaced { id: "a".to_string() }));
        assert!(issues.contains(&IndexInconsistency::DanglingEntry { id: "ghost".to_string() }));
    }
}
