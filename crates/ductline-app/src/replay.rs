//! Headless replay of a drawing session.

use crate::script::{Action, Script};
use ductline_core::{
    Centerline, CenterlineDrawingManager, DetectionStatistics, DrawingEvent, EngineConfig, EventKind,
    NoopValidator, SnapDetectionService,
};
use kurbo::Point;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// What one action did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    /// False when the manager ignored or rejected the action.
    pub accepted: bool,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub completed: Vec<Centerline>,
    /// Centerline still being drawn when the script ended.
    pub active: Option<Centerline>,
    pub steps: Vec<StepOutcome>,
    pub events: Vec<DrawingEvent>,
    pub statistics: DetectionStatistics,
}

/// Run `script` against a fresh engine built from `config`.
pub fn replay(config: &EngineConfig, script: &Script) -> crate::Result<ReplayReport> {
    let mut snap = SnapDetectionService::new(config.snap.clone())?;
    let added = snap.add_snap_points(script.collect_snap_points());
    snap.optimize_spatial_index();
    log::info!("Registered {} snap points", added);

    let mut manager = CenterlineDrawingManager::new(config.drawing.clone(), snap, NoopValidator)?;

    let events = Rc::new(RefCell::new(Vec::new()));
    let completed = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let events = events.clone();
        manager.on(kind, move |e| events.borrow_mut().push(e.clone()));
    }
    {
        let completed = completed.clone();
        manager.on(EventKind::DrawingCompleted, move |e| {
            if let DrawingEvent::DrawingCompleted { centerline } = e {
                completed.borrow_mut().push(centerline.clone());
            }
        });
    }

    let mut steps = Vec::with_capacity(script.actions.len());
    for (index, action) in script.actions.iter().enumerate() {
        let accepted = apply(&mut manager, action);
        log::debug!("Step {}: {} accepted={}", index, action.name(), accepted);
        steps.push(StepOutcome {
            index,
            action: action.name(),
            accepted,
        });
    }

    let report = ReplayReport {
        active: manager.current_centerline().cloned(),
        statistics: manager.snap_service().get_statistics(),
        completed: completed.take(),
        events: events.take(),
        steps,
    };
    Ok(report)
}

fn apply(manager: &mut CenterlineDrawingManager, action: &Action) -> bool {
    match *action {
        Action::Start { x, y, kind } => {
            manager.start_drawing(Point::new(x, y), kind);
            true
        }
        Action::Add { x, y } => manager.add_point(Point::new(x, y)),
        Action::Preview { x, y } => {
            manager.update_preview(Point::new(x, y));
            manager.is_drawing()
        }
        Action::RemoveLast => manager.remove_last_point(),
        Action::Complete => manager.complete_drawing().is_some(),
        Action::Cancel => manager.cancel_drawing().is_some(),
        Action::ToggleType => {
            manager.toggle_centerline_type();
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ductline_core::CenterlineType;

    fn script(json: &str) -> Script {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_replay_snaps_and_completes() {
        let script = script(
            r#"{
                "snapPoints": [{"id": "s1", "type": "endpoint", "position": {"x": 100, "y": 100}, "priority": 1}],
                "actions": [
                    {"action": "start", "x": 0, "y": 0},
                    {"action": "add", "x": 104, "y": 103},
                    {"action": "add", "x": 105, "y": 100},
                    {"action": "complete"}
                ]
            }"#,
        );
        let report = replay(&EngineConfig::default(), &script).unwrap();

        assert_eq!(report.completed.len(), 1);
        let points = &report.completed[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].position(), Point::new(100.0, 100.0));
        assert!(report.active.is_none());
        assert_eq!(
            report.steps.iter().map(|s| s.accepted).collect::<Vec<_>>(),
            vec![true, true, false, true]
        );
        assert_eq!(report.statistics.snap_point_count, 1);
        assert!(report.events.iter().any(|e| e.kind() == EventKind::SnapEngaged));
    }

    #[test]
    fn test_replay_point_limit() {
        let mut config = EngineConfig::default();
        config.drawing.max_points = 3;
        let script = script(
            r#"{"actions": [
                {"action": "start", "x": 0, "y": 0},
                {"action": "add", "x": 50, "y": 0},
                {"action": "add", "x": 100, "y": 0},
                {"action": "add", "x": 150, "y": 0},
                {"action": "add", "x": 200, "y": 0}
            ]}"#,
        );
        let report = replay(&config, &script).unwrap();
        assert!(!report.steps[4].accepted);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].points.len(), 4);
    }

    #[test]
    fn test_replay_leaves_active_centerline() {
        let script = script(
            r#"{"actions": [
                {"action": "start", "x": 0, "y": 0},
                {"action": "toggleType"},
                {"action": "add", "x": 0, "y": 60},
                {"action": "cancel"},
                {"action": "cancel"},
                {"action": "start", "x": 10, "y": 10}
            ]}"#,
        );
        let report = replay(&EngineConfig::default(), &script).unwrap();
        assert!(report.completed.is_empty());
        assert!(!report.steps[4].accepted);
        let active = report.active.unwrap();
        assert_eq!(active.kind, CenterlineType::Arc);
        assert_eq!(active.points.len(), 1);
    }
}
