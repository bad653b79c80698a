//! Title-bar dragging.
//!
//! One controller serves every window but only one drag at a time: it owns a
//! single document-level listener pair that stays attached for the duration
//! of the gesture.

use crate::bus::WmEvent;
use crate::context::WindowContext;
use crate::error::StoreError;
use crate::geometry::{Geometry, Point};
use crate::host::{ListenerOwner, PointerSource};
use crate::window::{WindowField, WindowId, WindowPatch};

/// Pointer and window origin captured on pointer-down.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSnapshot {
    pub id: WindowId,
    pub pointer_start: Point,
    pub window_start: Point,
}

#[derive(Debug, Default)]
pub struct DragController {
    active: Option<DragSnapshot>,
    listening: bool,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&DragSnapshot> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self, id: &WindowId) -> bool {
        self.active.as_ref().is_some_and(|drag| &drag.id == id)
    }

    /// Start dragging `id` from pointer position `at`.
    ///
    /// Returns `false`, with nothing changed, when another drag is running,
    /// the window is unknown to the store, or the FSM guard refuses.
    pub fn begin(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        id: &WindowId,
        at: Point,
    ) -> bool {
        if self.active.is_some() || !at.is_finite() {
            return false;
        }
        let Some(record) = ctx.store.get(id) else {
            return false;
        };
        let window_start = record.geometry.origin();
        if !ctx.fsm.start_drag_window(id) {
            return false;
        }
        if let Err(err) = ctx.store.update(id, WindowField::Dragging(true)) {
            tracing::debug!(window_id = %id, error = %err, "drag flag not recorded");
        }
        self.active = Some(DragSnapshot {
            id: id.clone(),
            pointer_start: at,
            window_start,
        });
        if !self.listening {
            pointer.attach(ListenerOwner::Drag);
            self.listening = true;
        }
        tracing::debug!(window_id = %id, x = at.x, y = at.y, "drag started");
        true
    }

    /// Follow the pointer. No clamping to the workspace is applied.
    pub fn pointer_moved(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        at: Point,
    ) -> bool {
        let Some(drag) = self.active.as_ref() else {
            return false;
        };
        if !at.is_finite() {
            return true;
        }
        let x = drag.window_start.x + (at.x - drag.pointer_start.x);
        let y = drag.window_start.y + (at.y - drag.pointer_start.y);
        match ctx.store.set(&drag.id, WindowPatch::position(x, y)) {
            Ok(()) => true,
            Err(StoreError::UnknownWindow(id)) => {
                tracing::debug!(window_id = %id, "dragged window vanished; aborting drag");
                self.abort(ctx, pointer);
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, "ignoring drag sample");
                true
            }
        }
    }

    /// Finish the drag at `at`. A pointer-up without a drag is a no-op.
    pub fn pointer_released(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        at: Option<Point>,
    ) -> Option<Geometry> {
        self.active.as_ref()?;
        if let Some(at) = at {
            self.pointer_moved(ctx, pointer, at);
        }
        self.finish(ctx, pointer)
    }

    /// End the drag on `id` without a final sample, if that window is the
    /// one being dragged. Nothing is published for an aborted drag.
    pub fn force_end(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        id: &WindowId,
    ) -> Option<Geometry> {
        if !self.is_dragging(id) {
            return None;
        }
        let (id, geometry) = self.settle(ctx, pointer)?;
        tracing::debug!(window_id = %id, "drag force-ended");
        Some(geometry)
    }

    fn finish(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
    ) -> Option<Geometry> {
        let (id, geometry) = self.settle(ctx, pointer)?;
        tracing::debug!(window_id = %id, x = geometry.x, y = geometry.y, "drag finished");
        ctx.bus.publish(WmEvent::WindowDragged { id, geometry });
        Some(geometry)
    }

    /// Return the dragged window to idle without announcing a completed drag.
    fn settle(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
    ) -> Option<(WindowId, Geometry)> {
        let drag = self.active.take()?;
        self.release_listeners(pointer);
        ctx.fsm.end_drag_window(&drag.id);
        ctx.store.update(&drag.id, WindowField::Dragging(false)).ok()?;
        let geometry = ctx.store.get(&drag.id)?.geometry;
        Some((drag.id, geometry))
    }

    fn abort(&mut self, ctx: &mut WindowContext, pointer: &mut dyn PointerSource) {
        if let Some(drag) = self.active.take() {
            ctx.fsm.end_drag_window(&drag.id);
        }
        self.release_listeners(pointer);
    }

    fn release_listeners(&mut self, pointer: &mut dyn PointerSource) {
        if self.listening {
            pointer.detach(ListenerOwner::Drag);
            self.listening = false;
        }
    }
}
