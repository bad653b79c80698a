use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::fsm::{FsmEvent, WindowState};
use crate::geometry::Geometry;
use crate::resize::ResizeEdge;
use crate::window::WindowId;

use super::Scope;

/// Tag of a [`WmEvent`]; subscriptions are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "window:opened")]
    WindowOpened,
    #[serde(rename = "window:closed")]
    WindowClosed,
    #[serde(rename = "window:focused")]
    WindowFocused,
    #[serde(rename = "window:dragged")]
    WindowDragged,
    #[serde(rename = "window:resize_start")]
    ResizeStart,
    #[serde(rename = "window:resizing")]
    Resizing,
    #[serde(rename = "window:resize_end")]
    ResizeEnd,
    #[serde(rename = "window:resized")]
    Resized,
    #[serde(rename = "fsm:transition")]
    FsmTransition,
    #[serde(rename = "bus:handler_failed")]
    HandlerFailed,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::WindowOpened => "window:opened",
            EventName::WindowClosed => "window:closed",
            EventName::WindowFocused => "window:focused",
            EventName::WindowDragged => "window:dragged",
            EventName::ResizeStart => "window:resize_start",
            EventName::Resizing => "window:resizing",
            EventName::ResizeEnd => "window:resize_end",
            EventName::Resized => "window:resized",
            EventName::FsmTransition => "fsm:transition",
            EventName::HandlerFailed => "bus:handler_failed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every notification the window engine publishes, one payload shape per tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum WmEvent {
    #[serde(rename = "window:opened")]
    WindowOpened {
        id: WindowId,
        plugin_id: String,
        geometry: Geometry,
    },
    #[serde(rename = "window:closed")]
    WindowClosed { id: WindowId },
    #[serde(rename = "window:focused")]
    WindowFocused { id: WindowId, state: WindowState },
    #[serde(rename = "window:dragged")]
    WindowDragged { id: WindowId, geometry: Geometry },
    #[serde(rename = "window:resize_start")]
    ResizeStart {
        id: WindowId,
        handle: ResizeEdge,
        geometry: Geometry,
    },
    #[serde(rename = "window:resizing")]
    Resizing {
        id: WindowId,
        handle: ResizeEdge,
        geometry: Geometry,
    },
    #[serde(rename = "window:resize_end")]
    ResizeEnd {
        id: WindowId,
        final_width: f64,
        final_height: f64,
        x: f64,
        y: f64,
    },
    #[serde(rename = "window:resized")]
    Resized {
        id: WindowId,
        width: f64,
        height: f64,
    },
    #[serde(rename = "fsm:transition")]
    FsmTransition {
        id: WindowId,
        event: FsmEvent,
        from_state: WindowState,
        to_state: WindowState,
    },
    #[serde(rename = "bus:handler_failed")]
    HandlerFailed {
        event_name: EventName,
        error: String,
        scope: Option<Scope>,
    },
}

impl WmEvent {
    pub fn name(&self) -> EventName {
        match self {
            WmEvent::WindowOpened { .. } => EventName::WindowOpened,
            WmEvent::WindowClosed { .. } => EventName::WindowClosed,
            WmEvent::WindowFocused { .. } => EventName::WindowFocused,
            WmEvent::WindowDragged { .. } => EventName::WindowDragged,
            WmEvent::ResizeStart { .. } => EventName::ResizeStart,
            WmEvent::Resizing { .. } => EventName::Resizing,
            WmEvent::ResizeEnd { .. } => EventName::ResizeEnd,
            WmEvent::Resized { .. } => EventName::Resized,
            WmEvent::FsmTransition { .. } => EventName::FsmTransition,
            WmEvent::HandlerFailed { .. } => EventName::HandlerFailed,
        }
    }

    /// The window this event is about, if any.
    pub fn window(&self) -> Option<&WindowId> {
        match self {
            WmEvent::WindowOpened { id, .. }
            | WmEvent::WindowClosed { id }
            | WmEvent::WindowFocused { id, .. }
            | WmEvent::WindowDragged { id, .. }
            | WmEvent::ResizeStart { id, .. }
            | WmEvent::Resizing { id, .. }
            | WmEvent::ResizeEnd { id, .. }
            | WmEvent::Resized { id, .. }
            | WmEvent::FsmTransition { id, .. } => Some(id),
            WmEvent::HandlerFailed { .. } => None,
        }
    }
}

/// Identifies the bus that first published an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(pub u64);

/// One delivery: the event, when it was published and by which bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: WmEvent,
    pub timestamp_ms: u64,
    pub origin: OriginId,
}

impl Envelope {
    pub fn new(event: WmEvent, origin: OriginId) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            origin,
        }
    }

    pub fn name(&self) -> EventName {
        self.event.name()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
