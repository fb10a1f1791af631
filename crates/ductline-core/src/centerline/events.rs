//! Typed publish/subscribe registry for drawing events.
//!
//! Dispatch is synchronous and in registration order. Handlers only see the
//! event, never the manager, so they cannot re-enter a mutating call.

use super::{Centerline, CenterlinePoint};
use crate::snap::{SnapPoint, SnapResult};
use crate::validation::ValidationWarning;
use kurbo::Point;
use serde::Serialize;
use std::collections::HashMap;

/// Events emitted by the drawing manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawingEvent {
    DrawingStarted { centerline: Centerline },
    PointAdded { centerline_id: String, index: usize, point: CenterlinePoint },
    PointRemoved { centerline_id: String, index: usize, point: CenterlinePoint },
    DrawingCompleted { centerline: Centerline },
    DrawingCancelled { centerline: Centerline },
    ValidationWarning { centerline_id: String, warnings: Vec<ValidationWarning> },
    SnapEngaged { snap_point: SnapPoint, result: SnapResult },
    SnapDisengaged { position: Point },
}

/// Discriminant of [`DrawingEvent`], used as subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DrawingStarted,
    PointAdded,
    PointRemoved,
    DrawingCompleted,
    DrawingCancelled,
    ValidationWarning,
    SnapEngaged,
    SnapDisengaged,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::DrawingStarted,
        EventKind::PointAdded,
        EventKind::PointRemoved,
        EventKind::DrawingCompleted,
        EventKind::DrawingCancelled,
        EventKind::ValidationWarning,
        EventKind::SnapEngaged,
        EventKind::SnapDisengaged,
    ];
}

impl DrawingEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DrawingEvent::DrawingStarted { .. } => EventKind::DrawingStarted,
            DrawingEvent::PointAdded { .. } => EventKind::PointAdded,
            DrawingEvent::PointRemoved { .. } => EventKind::PointRemoved,
            DrawingEvent::DrawingCompleted { .. } => EventKind::DrawingCompleted,
            DrawingEvent::DrawingCancelled { .. } => EventKind::DrawingCancelled,
            DrawingEvent::ValidationWarning { .. } => EventKind::ValidationWarning,
            DrawingEvent::SnapEngaged { .. } => EventKind::SnapEngaged,
            DrawingEvent::SnapDisengaged { .. } => EventKind::SnapDisengaged,
        }
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&DrawingEvent)>;

/// Subscription registry keyed by event kind.
///
/// Each kind keeps a slot list in registration order; unsubscribing clears
/// the slot in O(1) and slots are compacted once more than half are empty.
#[derive(Default)]
pub struct EventBus {
    slots: HashMap<EventKind, KindSlots>,
    locations: HashMap<SubscriptionId, (EventKind, usize)>,
    next_id: u64,
}

/// Handlers of one event kind. Removed handlers leave a `None` hole until
/// fewer than half of the slots are live.
#[derive(Default)]
struct KindSlots {
    entries: Vec<Option<(SubscriptionId, Handler)>>,
    live: usize,
}

impl KindSlots {
    fn is_sparse(&self) -> bool {
        self.live * 2 < self.entries.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.locations.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&DrawingEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let slots = self.slots.entry(kind).or_default();
        slots.entries.push(Some((id, Box::new(handler))));
        slots.live += 1;
        self.locations.insert(id, (kind, slots.entries.len() - 1));
        id
    }

    /// Remove a handler. Returns false if it was already removed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let Some((kind, index)) = self.locations.remove(&id) else {
            return false;
        };
        if let Some(slots) = self.slots.get_mut(&kind) {
            if let Some(slot) = slots.entries.get_mut(index).filter(|s| s.is_some()) {
                *slot = None;
                slots.live -= 1;
            }
            if slots.is_sparse() {
                self.compact(kind);
            }
        }
        true
    }

    fn compact(&mut self, kind: EventKind) {
        let Some(slots) = self.slots.get_mut(&kind) else {
            return;
        };
        slots.entries.retain(Option::is_some);
        slots.live = slots.entries.len();
        for (index, slot) in slots.entries.iter().enumerate() {
            if let Some((id, _)) = slot {
                self.locations.insert(*id, (kind, index));
            }
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Run every handler subscribed to the event's kind.
    pub fn emit(&mut self, event: &DrawingEvent) {
        if let Some(slots) = self.slots.get_mut(&event.kind()) {
            for (_, handler) in slots.entries.iter_mut().flatten() {
                handler(event);
            }
        }
    }
}
