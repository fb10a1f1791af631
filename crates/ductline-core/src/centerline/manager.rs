//! Centerline drawing session state machine.

use super::events::{DrawingEvent, EventBus, EventKind, SubscriptionId};
use super::{
    Centerline, CenterlineDrawingConfig, CenterlinePoint, CenterlineType, DrawingMode, DrawingState,
    tangent_between,
};
use crate::error::ConfigResult;
use crate::snap::{SnapDetectionService, SnapPoint};
use crate::validation::{NoopValidator, ValidationWarning, Validator};
use kurbo::Point;

/// Lifecycle of a drawing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingPhase {
    /// No session has run yet.
    #[default]
    Idle,
    /// A centerline is being drawn.
    Drawing,
    /// The last session was completed.
    Completed,
    /// The last session was cancelled.
    Cancelled,
}

/// Turns a stream of pointer positions into a validated [`Centerline`].
///
/// One session may be active at a time. The manager owns the snap detection
/// service it consults; the element registry reaches it through
/// [`snap_service_mut`](Self::snap_service_mut).
pub struct CenterlineDrawingManager {
    config: CenterlineDrawingConfig,
    snap: SnapDetectionService,
    validator: Box<dyn Validator>,
    events: EventBus,
    phase: DrawingPhase,
    current: Option<Centerline>,
    preview: Option<CenterlinePoint>,
    snap_target: Option<SnapPoint>,
    /// Type used by new sessions; follows `toggle_centerline_type`.
    default_type: CenterlineType,
    last_completed: Option<Centerline>,
}

impl Default for CenterlineDrawingManager {
    fn default() -> Self {
        let config = CenterlineDrawingConfig::default();
        Self {
            default_type: config.default_type,
            config,
            snap: SnapDetectionService::default(),
            validator: Box::new(NoopValidator),
            events: EventBus::new(),
            phase: DrawingPhase::Idle,
            current: None,
            preview: None,
            snap_target: None,
            last_completed: None,
        }
    }
}

impl std::fmt::Debug for CenterlineDrawingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CenterlineDrawingManager")
            .field("phase", &self.phase)
            .field("config", &self.config)
            .field("current", &self.current.as_ref().map(|c| &c.id))
            .field("events", &self.events)
            .finish()
    }
}

impl CenterlineDrawingManager {
    /// Create a manager, rejecting invalid configuration.
    pub fn new(
        config: CenterlineDrawingConfig,
        snap: SnapDetectionService,
        validator: impl Validator + 'static,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            default_type: config.default_type,
            config,
            snap,
            validator: Box::new(validator),
            ..Default::default()
        })
    }

    // --- Accessors ---

    pub fn config(&self) -> &CenterlineDrawingConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next call; the active
    /// centerline is left as it is.
    pub fn update_config(&mut self, config: CenterlineDrawingConfig) -> ConfigResult<()> {
        if let Err(e) = config.validate() {
            log::warn!("Rejected drawing config: {}", e);
            return Err(e);
        }
        // A toggled default survives unless the new config names another one.
        if config.default_type != self.config.default_type {
            self.default_type = config.default_type;
        }
        self.config = config;
        Ok(())
    }

    pub fn snap_service(&self) -> &SnapDetectionService {
        &self.snap
    }

    pub fn snap_service_mut(&mut self) -> &mut SnapDetectionService {
        &mut self.snap
    }

    pub fn phase(&self) -> DrawingPhase {
        self.phase
    }

    /// Check if a session is active.
    pub fn is_drawing(&self) -> bool {
        self.phase == DrawingPhase::Drawing
    }

    /// The centerline being drawn.
    pub fn current_centerline(&self) -> Option<&Centerline> {
        self.current.as_ref()
    }

    /// The most recently completed centerline.
    pub fn last_completed(&self) -> Option<&Centerline> {
        self.last_completed.as_ref()
    }

    /// Type the next session will use when none is given.
    pub fn default_type(&self) -> CenterlineType {
        self.default_type
    }

    pub fn preview_point(&self) -> Option<&CenterlinePoint> {
        self.preview.as_ref()
    }

    pub fn snap_target(&self) -> Option<&SnapPoint> {
        self.snap_target.as_ref()
    }

    /// Snapshot of the session for rendering.
    pub fn drawing_state(&self) -> DrawingState {
        DrawingState {
            is_active: self.is_drawing(),
            current_centerline: self.current.clone(),
            preview_point: self.preview,
            snap_target: self.snap_target.clone(),
        }
    }

    // --- Events ---

    /// Subscribe to one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&DrawingEvent) + 'static) -> SubscriptionId {
        self.events.on(kind, handler)
    }

    /// Unsubscribe. Returns false if the subscription was already removed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    fn emit(&mut self, event: DrawingEvent) {
        self.events.emit(&event);
    }

    // --- Session ---

    /// Start a new centerline at `start`.
    ///
    /// An active session is cancelled first (emitting `DrawingCancelled`).
    pub fn start_drawing(&mut self, start: Point, kind: Option<CenterlineType>) -> Centerline {
        if self.is_drawing() {
            log::debug!("start_drawing called while drawing; cancelling active session");
            self.cancel_drawing();
        }

        let kind = kind.unwrap_or(match self.config.mode {
            DrawingMode::ArcGuided => CenterlineType::Arc,
            DrawingMode::PointToPoint | DrawingMode::Continuous => self.default_type,
        });

        let start = if self.config.auto_snap {
            let result = self.snap.find_closest_snap_point(start, None);
            self.snap_target = result.snap_point;
            result.adjusted_position
        } else {
            self.snap_target = None;
            start
        };

        let centerline = Centerline::new(kind, start);
        log::debug!("Drawing started: {} ({:?})", centerline.id, kind);
        self.current = Some(centerline.clone());
        self.preview = None;
        self.phase = DrawingPhase::Drawing;
        self.emit(DrawingEvent::DrawingStarted {
            centerline: centerline.clone(),
        });
        centerline
    }

    /// Try to append a point. Returns true if the point was committed.
    ///
    /// Points closer than `min_segment_length` to the last point are
    /// rejected. Once `max_points` points have been placed after the start
    /// point, the next call completes the session and returns false.
    pub fn add_point(&mut self, position: Point) -> bool {
        if !self.is_drawing() {
            return false;
        }

        let position = if self.config.auto_snap {
            self.apply_snap(position)
        } else {
            position
        };

        let Some(current) = self.current.as_ref() else {
            return false;
        };
        if let Some(last) = current.last_point() {
            if last.distance(position) < self.config.min_segment_length {
                log::trace!("Point rejected: closer than {} to last point", self.config.min_segment_length);
                return false;
            }
        }

        if current.segment_count() >= self.config.max_points {
            log::debug!("Point limit {} reached; completing centerline", self.config.max_points);
            self.complete_drawing();
            return false;
        }

        let Some(current) = self.current.as_mut() else {
            return false;
        };
        current.push_point(position);
        let index = current.points.len() - 1;
        let point = current.points[index];
        let centerline_id = current.id.clone();

        let (warnings, changed) = if self.config.validate_smacna {
            self.run_validation()
        } else {
            (Vec::new(), false)
        };

        self.emit(DrawingEvent::PointAdded {
            centerline_id: centerline_id.clone(),
            index,
            point,
        });
        if changed || !warnings.is_empty() {
            self.emit(DrawingEvent::ValidationWarning { centerline_id, warnings });
        }
        true
    }

    fn apply_snap(&mut self, position: Point) -> Point {
        let result = self.snap.find_closest_snap_point(position, None);
        match result.snap_point.clone() {
            Some(snap_point) if result.is_snapped => {
                let adjusted = result.adjusted_position;
                self.snap_target = Some(snap_point.clone());
                self.emit(DrawingEvent::SnapEngaged { snap_point, result });
                adjusted
            }
            _ => {
                self.snap_target = None;
                self.emit(DrawingEvent::SnapDisengaged { position });
                position
            }
        }
    }

    /// Validate the current centerline and store the outcome. Returns the
    /// new warnings and whether they differ from the stored ones.
    fn run_validation(&mut self) -> (Vec<ValidationWarning>, bool) {
        let Some(current) = self.current.as_mut() else {
            return (Vec::new(), false);
        };
        let report = self.validator.validate(current);
        let changed = report.warnings != current.warnings;
        current.is_smacna_compliant = report.is_compliant;
        current.warnings = report.warnings.clone();
        (report.warnings, changed)
    }

    /// Validate and announce a changed warning set.
    fn revalidate_and_emit(&mut self, centerline_id: &str) {
        if !self.config.validate_smacna {
            return;
        }
        let (warnings, changed) = self.run_validation();
        if changed {
            self.emit(DrawingEvent::ValidationWarning {
                centerline_id: centerline_id.to_string(),
                warnings,
            });
        }
    }

    /// Remove the most recent point. The start point is never removed.
    pub fn remove_last_point(&mut self) -> bool {
        if !self.is_drawing() {
            return false;
        }
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        if current.points.len() <= 1 {
            return false;
        }
        let Some(point) = current.points.pop() else {
            return false;
        };
        let index = current.points.len();
        let centerline_id = current.id.clone();

        self.emit(DrawingEvent::PointRemoved {
            centerline_id: centerline_id.clone(),
            index,
            point,
        });
        self.revalidate_and_emit(&centerline_id);
        true
    }

    /// Track the pointer for live feedback without touching the centerline.
    pub fn update_preview(&mut self, position: Point) {
        if !self.is_drawing() {
            return;
        }

        let position = if self.config.auto_snap {
            let result = self.snap.find_closest_snap_point(position, None);
            self.snap_target = result.snap_point.filter(|_| result.is_snapped);
            result.adjusted_position
        } else {
            self.snap_target = None;
            position
        };

        if !self.config.show_preview {
            self.preview = None;
            return;
        }

        let tangent = self
            .current
            .as_ref()
            .filter(|c| c.kind == CenterlineType::Arc)
            .and_then(Centerline::last_point)
            .and_then(|last| tangent_between(last, position));
        self.preview = Some(CenterlinePoint {
            x: position.x,
            y: position.y,
            tangent,
        });
    }

    /// Finish the session and hand out the centerline.
    pub fn complete_drawing(&mut self) -> Option<Centerline> {
        if !self.is_drawing() {
            return None;
        }
        if let Some(id) = self.current.as_ref().map(|c| c.id.clone()) {
            self.revalidate_and_emit(&id);
        }
        let centerline = self.current.take()?;
        self.phase = DrawingPhase::Completed;
        self.preview = None;
        self.snap_target = None;
        log::debug!(
            "Drawing completed: {} with {} points",
            centerline.id,
            centerline.points.len()
        );

        self.last_completed = Some(centerline.clone());
        self.emit(DrawingEvent::DrawingCompleted {
            centerline: centerline.clone(),
        });
        Some(centerline)
    }

    /// Discard the session. Does nothing, and emits nothing, when idle.
    pub fn cancel_drawing(&mut self) -> Option<Centerline> {
        if !self.is_drawing() {
            return None;
        }
        let centerline = self.current.take()?;
        self.phase = DrawingPhase::Cancelled;
        self.preview = None;
        self.snap_target = None;
        log::debug!("Drawing cancelled: {}", centerline.id);

        self.emit(DrawingEvent::DrawingCancelled {
            centerline: centerline.clone(),
        });
        Some(centerline)
    }

    /// Switch the in-progress centerline between arc and segmented, and make
    /// the new type the default for later sessions.
    pub fn toggle_centerline_type(&mut self) -> CenterlineType {
        let next = match self.current.as_mut() {
            Some(current) => {
                let next = current.kind.toggled();
                current.convert(next);
                next
            }
            None => self.default_type.toggled(),
        };
        self.default_type = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snap::{SnapDetectionConfig, SnapPointType, SnapPriority};
    use crate::validation::{ValidationReport, ValidationWarning};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager(min_segment_length: f64, max_points: usize) -> CenterlineDrawingManager {
        let config = CenterlineDrawingConfig {
            min_segment_length,
            max_points,
            ..Default::default()
        };
        let snap = SnapDetectionService::new(SnapDetectionConfig::default().with_thresholds(10.0, 20.0)).unwrap();
        CenterlineDrawingManager::new(config, snap, NoopValidator).unwrap()
    }

    fn record(manager: &mut CenterlineDrawingManager) -> Rc<RefCell<Vec<EventKind>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let log = log.clone();
            manager.on(kind, move |e| log.borrow_mut().push(e.kind()));
        }
        log
    }

    fn points(manager: &CenterlineDrawingManager) -> Vec<Point> {
        manager
            .current_centerline()
            .map(|c| c.points.iter().map(CenterlinePoint::position).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_add_point_without_snap_targets() {
        let mut m = manager(20.0, 50);
        m.start_drawing(Point::new(0.0, 0.0), None);
        assert!(m.add_point(Point::new(50.0, 0.0)));
        assert_eq!(points(&m), vec![Point::new(0.0, 0.0), Point::new(50.0, 0.0)]);
    }

    #[test]
    fn test_min_segment_length_rejects_close_points() {
        let mut m = manager(20.0, 50);
        m.start_drawing(Point::ZERO, None);
        assert!(m.add_point(Point::new(50.0, 0.0)));
        assert!(!m.add_point(Point::new(55.0, 0.0)));
        assert_eq!(points(&m).len(), 2);
    }

    #[test]
    fn test_point_limit_auto_completes() {
        let mut m = manager(10.0, 3);
        m.start_drawing(Point::ZERO, None);
        for i in 1..=3 {
            assert!(m.add_point(Point::new(i as f64 * 50.0, 0.0)));
        }
        assert!(!m.add_point(Point::new(200.0, 0.0)));
        assert!(!m.drawing_state().is_active);
        assert_eq!(m.phase(), DrawingPhase::Completed);
        assert_eq!(m.last_completed().map(|c| c.points.len()), Some(4));
    }

    #[test]
    fn test_add_point_when_idle() {
        let mut m = manager(10.0, 10);
        let log = record(&mut m);
        assert!(!m.add_point(Point::new(50.0, 0.0)));
        assert!(!m.remove_last_point());
        assert!(m.complete_drawing().is_none());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_cancel_when_idle_is_silent() {
        let mut m = manager(10.0, 10);
        let log = record(&mut m);
        assert!(m.cancel_drawing().is_none());
        assert!(m.cancel_drawing().is_none());
        assert!(log.borrow().is_empty());
        assert_eq!(m.phase(), DrawingPhase::Idle);
    }

    #[test]
    fn test_cancel_discards_and_reports() {
        let mut m = manager(10.0, 10);
        let log = record(&mut m);
        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(30.0, 0.0));

        let discarded = m.cancel_drawing().unwrap();
        assert_eq!(discarded.points.len(), 2);
        assert!(m.current_centerline().is_none());
        assert_eq!(m.phase(), DrawingPhase::Cancelled);
        assert_eq!(log.borrow().last(), Some(&EventKind::DrawingCancelled));
    }

    #[test]
    fn test_start_while_drawing_cancels_previous() {
        let mut m = manager(10.0, 10);
        let log = record(&mut m);
        let first = m.start_drawing(Point::ZERO, None);
        let second = m.start_drawing(Point::new(100.0, 100.0), None);

        assert_ne!(first.id, second.id);
        assert_eq!(
            *log.borrow(),
            vec![EventKind::DrawingStarted, EventKind::DrawingCancelled, EventKind::DrawingStarted]
        );
        assert_eq!(m.current_centerline().map(|c| c.id.clone()), Some(second.id));
    }

    #[test]
    fn test_snap_applies_to_added_points() {
        let mut m = manager(10.0, 10);
        m.snap_service_mut().add_snap_point(
            SnapPoint::new("s1", SnapPointType::Endpoint, Point::new(100.0, 100.0))
                .with_priority(SnapPriority::HIGHEST),
        );
        let log = record(&mut m);

        m.start_drawing(Point::ZERO, None);
        assert!(m.add_point(Point::new(104.0, 103.0)));
        assert_eq!(points(&m)[1], Point::new(100.0, 100.0));
        assert_eq!(m.snap_target().map(|p| p.id.as_str()), Some("s1"));

        assert!(m.add_point(Point::new(200.0, 100.0)));
        assert!(m.snap_target().is_none());
        assert_eq!(
            *log.borrow(),
            vec![
                EventKind::DrawingStarted,
                EventKind::SnapEngaged,
                EventKind::PointAdded,
                EventKind::SnapDisengaged,
                EventKind::PointAdded,
            ]
        );
    }

    #[test]
    fn test_auto_snap_disabled() {
        let mut m = manager(10.0, 10);
        let mut config = m.config().clone();
        config.auto_snap = false;
        m.update_config(config).unwrap();
        m.snap_service_mut()
            .add_snap_point(SnapPoint::new("s1", SnapPointType::Endpoint, Point::new(100.0, 100.0)));

        m.start_drawing(Point::ZERO, None);
        assert!(m.add_point(Point::new(104.0, 103.0)));
        assert_eq!(points(&m)[1], Point::new(104.0, 103.0));
    }

    #[test]
    fn test_remove_last_point_keeps_start() {
        let mut m = manager(10.0, 10);
        let log = record(&mut m);
        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(30.0, 0.0));

        assert!(m.remove_last_point());
        assert!(!m.remove_last_point());
        assert_eq!(points(&m), vec![Point::ZERO]);
        assert_eq!(log.borrow().last(), Some(&EventKind::PointRemoved));
    }

    #[test]
    fn test_preview_does_not_commit() {
        let mut m = manager(10.0, 10);
        m.snap_service_mut()
            .add_snap_point(SnapPoint::new("s1", SnapPointType::Midpoint, Point::new(50.0, 0.0)));
        m.start_drawing(Point::ZERO, Some(CenterlineType::Arc));

        m.update_preview(Point::new(52.0, 1.0));
        let preview = m.preview_point().copied().unwrap();
        assert_eq!(preview.position(), Point::new(50.0, 0.0));
        assert!(preview.tangent.is_some());
        assert_eq!(m.snap_target().map(|p| p.id.as_str()), Some("s1"));
        assert_eq!(points(&m).len(), 1);

        m.update_preview(Point::new(300.0, 300.0));
        assert!(m.snap_target().is_none());
        assert_eq!(m.drawing_state().preview_point.map(|p| p.x), Some(300.0));
    }

    #[test]
    fn test_validation_warnings_are_stored_and_emitted() {
        let validator = |c: &Centerline| {
            if c.points.len() > 2 {
                ValidationReport {
                    is_compliant: false,
                    warnings: vec![ValidationWarning::new("too-many-turns", "limit exceeded")],
                }
            } else {
                ValidationReport::compliant()
            }
        };
        let mut m = CenterlineDrawingManager::new(
            CenterlineDrawingConfig::default(),
            SnapDetectionService::default(),
            validator,
        )
        .unwrap();
        let log = record(&mut m);

        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(100.0, 0.0));
        assert!(m.current_centerline().unwrap().is_smacna_compliant);

        m.add_point(Point::new(100.0, 100.0));
        let current = m.current_centerline().unwrap();
        assert!(!current.is_smacna_compliant);
        assert_eq!(current.warnings.len(), 1);
        assert_eq!(log.borrow().last(), Some(&EventKind::ValidationWarning));

        m.remove_last_point();
        assert!(m.current_centerline().unwrap().is_smacna_compliant);
        assert_eq!(
            log.borrow().last(),
            Some(&EventKind::ValidationWarning),
            "clearing the warnings is announced"
        );
    }

    fn warn_on_diagonal(c: &Centerline) -> ValidationReport {
        let diagonal = c.points.windows(2).any(|w| w[0].x != w[1].x && w[0].y != w[1].y);
        if diagonal {
            ValidationReport {
                is_compliant: false,
                warnings: vec![ValidationWarning::new("diagonal-run", "segment is not axis aligned")],
            }
        } else {
            ValidationReport::compliant()
        }
    }

    #[test]
    fn test_validation_warning_emitted_only_when_warnings_change() {
        let mut m = CenterlineDrawingManager::new(
            CenterlineDrawingConfig::default(),
            SnapDetectionService::default(),
            warn_on_diagonal,
        )
        .unwrap();
        let log = record(&mut m);
        let warnings_seen = || log.borrow().iter().filter(|k| **k == EventKind::ValidationWarning).count();

        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(100.0, 0.0));
        assert_eq!(warnings_seen(), 0);

        m.add_point(Point::new(200.0, 0.0));
        m.remove_last_point();
        assert_eq!(warnings_seen(), 0, "unchanged empty warnings stay quiet on remove");

        m.add_point(Point::new(200.0, 100.0));
        assert_eq!(warnings_seen(), 1);

        m.remove_last_point();
        assert_eq!(warnings_seen(), 2);
        assert!(m.current_centerline().unwrap().warnings.is_empty());
    }

    #[test]
    fn test_complete_emits_changed_warnings_before_completion() {
        let validator = |c: &Centerline| {
            if c.points.len() == 2 {
                ValidationReport {
                    is_compliant: false,
                    warnings: vec![ValidationWarning::new("short-run", "only one segment")],
                }
            } else {
                ValidationReport::compliant()
            }
        };
        let mut m = CenterlineDrawingManager::new(
            CenterlineDrawingConfig::default(),
            SnapDetectionService::default(),
            validator,
        )
        .unwrap();
        let log = record(&mut m);

        // Validation on add is off, so completion is the first time the
        // warning is computed.
        m.start_drawing(Point::ZERO, None);
        m.update_config(CenterlineDrawingConfig {
            validate_smacna: false,
            ..CenterlineDrawingConfig::default()
        })
        .unwrap();
        m.add_point(Point::new(100.0, 0.0));
        m.update_config(CenterlineDrawingConfig::default()).unwrap();
        log.borrow_mut().clear();

        let done = m.complete_drawing().unwrap();
        assert_eq!(done.warnings.len(), 1);
        assert_eq!(
            *log.borrow(),
            vec![EventKind::ValidationWarning, EventKind::DrawingCompleted]
        );
    }

    #[test]
    fn test_complete_freezes_and_clears_state() {
        let mut m = manager(10.0, 10);
        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(40.0, 0.0));
        m.update_preview(Point::new(80.0, 0.0));

        let done = m.complete_drawing().unwrap();
        assert_eq!(done.points.len(), 2);
        let state = m.drawing_state();
        assert!(!state.is_active);
        assert!(state.current_centerline.is_none());
        assert!(state.preview_point.is_none());
        assert!(!m.add_point(Point::new(120.0, 0.0)));
        assert_eq!(m.last_completed(), Some(&done));
    }

    #[test]
    fn test_toggle_type() {
        let mut m = manager(10.0, 10);
        m.start_drawing(Point::ZERO, None);
        m.add_point(Point::new(0.0, 40.0));
        assert_eq!(m.current_centerline().unwrap().kind, CenterlineType::Segmented);

        assert_eq!(m.toggle_centerline_type(), CenterlineType::Arc);
        let current = m.current_centerline().unwrap();
        assert_eq!(current.kind, CenterlineType::Arc);
        assert!(current.points[1].tangent.is_some());

        m.complete_drawing();
        assert_eq!(m.default_type(), CenterlineType::Arc);
        assert_eq!(m.start_drawing(Point::ZERO, None).kind, CenterlineType::Arc);
        assert_eq!(m.toggle_centerline_type(), CenterlineType::Segmented);
    }

    #[test]
    fn test_update_config_keeps_toggled_default_type() {
        let mut m = manager(10.0, 10);
        m.start_drawing(Point::ZERO, None);
        assert_eq!(m.toggle_centerline_type(), CenterlineType::Arc);
        m.complete_drawing();

        let unchanged = m.config().clone();
        m.update_config(CenterlineDrawingConfig {
            show_preview: !unchanged.show_preview,
            ..unchanged.clone()
        })
        .unwrap();
        assert_eq!(m.default_type(), CenterlineType::Arc);
        assert_eq!(m.start_drawing(Point::ZERO, None).kind, CenterlineType::Arc);
        m.cancel_drawing();

        m.update_config(CenterlineDrawingConfig {
            default_type: CenterlineType::Arc,
            ..unchanged
        })
        .unwrap();
        assert_eq!(m.default_type(), CenterlineType::Arc);

        m.update_config(CenterlineDrawingConfig::default()).unwrap();
        assert_eq!(m.default_type(), CenterlineType::Segmented);
    }

    #[test]
    fn test_arc_guided_mode_defaults_to_arc() {
        let mut m = manager(10.0, 10);
        let config = CenterlineDrawingConfig {
            mode: DrawingMode::ArcGuided,
            ..Default::default()
        };
        m.update_config(config).unwrap();
        assert_eq!(m.start_drawing(Point::ZERO, None).kind, CenterlineType::Arc);
        m.cancel_drawing();
        assert_eq!(
            m.start_drawing(Point::ZERO, Some(CenterlineType::Segmented)).kind,
            CenterlineType::Segmented
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut m = manager(10.0, 10);
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = m.on(EventKind::DrawingStarted, move |_| *c.borrow_mut() += 1);
        m.start_drawing(Point::ZERO, None);
        assert!(m.off(id));
        assert!(!m.off(id));
        m.start_drawing(Point::ZERO, None);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = CenterlineDrawingConfig {
            max_points: 0,
            ..Default::default()
        };
        assert!(CenterlineDrawingManager::new(config.clone(), SnapDetectionService::default(), NoopValidator).is_err());

        let mut m = manager(10.0, 10);
        assert!(m.update_config(config).is_err());
        assert_eq!(m.config().max_points, 10);
    }
}
