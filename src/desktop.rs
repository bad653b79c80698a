//! The process-wide window engine context.
//!
//! A [`Desktop`] owns the event bus, the window store, the FSM registry and
//! both pointer controllers. Hosts create one at startup, feed it pointer
//! input, frame ticks and size reports, and call [`Desktop::teardown`] on
//! the way out.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::bus::{BroadcastChannel, EventBus, WmEvent};
use crate::config::DesktopConfig;
use crate::context::WindowContext;
use crate::drag::DragController;
use crate::error::{DesktopError, StoreError, TransitionError};
use crate::fsm::{FsmEvent, FsmManager, WindowState};
use crate::geometry::{Geometry, Point};
use crate::host::{HostCapabilities, PointerEvent, PointerKind, PointerSource};
use crate::resize::{
    HandleSet, ResizeEdge, ResizeHandle, ResizeManager, ResizeStats, handles_for_geometry,
};
use crate::window::{WindowId, WindowPatch, WindowRecord, WindowSpec, WindowStore};

/// What a pointer-down landed on.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    Handle(WindowId, ResizeEdge),
    TitleBar(WindowId),
    Body(WindowId),
}

impl PointerTarget {
    pub fn window(&self) -> &WindowId {
        match self {
            PointerTarget::Handle(id, _) | PointerTarget::TitleBar(id) | PointerTarget::Body(id) => id,
        }
    }
}

pub struct Desktop {
    config: DesktopConfig,
    ctx: WindowContext,
    drag: DragController,
    resize: ResizeManager,
    pointer: Box<dyn PointerSource>,
    /// Bottom to top; the last entry is drawn over everything else.
    z_order: Vec<WindowId>,
    /// Pre-maximize geometry. Kept until an unmaximize or restore uses it,
    /// even when the window leaves `maximized` by being dragged.
    restore_geometry: HashMap<WindowId, Geometry>,
    minimized_while_maximized: HashSet<WindowId>,
    next_serial: u64,
}

impl Desktop {
    pub fn new(config: DesktopConfig, host: HostCapabilities) -> Result<Self, DesktopError> {
        config.validate()?;
        let HostCapabilities {
            pointer,
            frames,
            sizes,
        } = host;
        let bus = Rc::new(EventBus::new());
        Ok(Self {
            resize: ResizeManager::new(sizes, frames, config.handle_thickness),
            ctx: WindowContext::new(bus),
            drag: DragController::new(),
            pointer,
            z_order: Vec::new(),
            restore_geometry: HashMap::new(),
            minimized_while_maximized: HashSet::new(),
            next_serial: 0,
            config,
        })
    }

    pub fn config(&self) -> &DesktopConfig {
        &self.config
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.ctx.bus
    }

    pub fn store(&self) -> &WindowStore {
        &self.ctx.store
    }

    pub fn fsm(&self) -> &FsmManager {
        &self.ctx.fsm
    }

    pub fn window(&self, id: &WindowId) -> Option<&WindowRecord> {
        self.ctx.store.get(id)
    }

    pub fn state(&self, id: &WindowId) -> Option<WindowState> {
        self.ctx.fsm.state(id)
    }

    pub fn z_order(&self) -> &[WindowId] {
        &self.z_order
    }

    /// Records of every non-minimized window, bottom to top.
    pub fn stacked(&self) -> impl Iterator<Item = &WindowRecord> {
        self.z_order
            .iter()
            .filter(|id| self.is_shown(id))
            .filter_map(|id| self.ctx.store.get(id))
    }

    pub fn focused(&self) -> Option<&WindowId> {
        self.z_order.iter().rev().find(|id| self.is_shown(id))
    }

    pub fn resize_stats(&self) -> ResizeStats {
        self.resize.stats()
    }

    pub fn handles(&self, id: &WindowId) -> Option<&HandleSet> {
        self.resize.handles(id)
    }

    /// Handle rects for `id` when they are currently shown.
    pub fn visible_handles(&self, id: &WindowId) -> Vec<ResizeHandle> {
        match (self.resize.handles(id), self.ctx.store.get(id)) {
            (Some(set), Some(record)) if set.visible() && record.resizable => {
                handles_for_geometry(record.geometry, self.config.handle_thickness)
            }
            _ => Vec::new(),
        }
    }

    pub fn dragging(&self) -> Option<&WindowId> {
        self.drag.active().map(|drag| &drag.id)
    }

    pub fn is_resizing(&self, id: &WindowId) -> bool {
        self.resize.is_resizing(id)
    }

    /// A spec carrying this desktop's default minimum size.
    pub fn spec(&self, plugin_id: impl Into<String>, geometry: Geometry) -> WindowSpec {
        WindowSpec::new(plugin_id, geometry).with_min_size(self.config.min_width, self.config.min_height)
    }

    /// Mirror published events to `channel`. Ignored unless broadcasting is
    /// enabled in the config.
    pub fn attach_broadcast(&self, channel: Box<dyn BroadcastChannel>) -> bool {
        if !self.config.broadcast {
            tracing::debug!("broadcast disabled; channel not attached");
            return false;
        }
        self.ctx.bus.set_broadcast(channel);
        true
    }

    pub fn open_window(&mut self, spec: WindowSpec) -> Result<WindowId, DesktopError> {
        let id = match spec.id.clone() {
            Some(id) => id,
            None => self.next_id(&spec.plugin_id),
        };
        self.ctx.store.insert(WindowRecord::new(id.clone(), &spec))?;
        if let Err(err) = self.ctx.fsm.open(&id, spec.resizable) {
            self.ctx.store.remove(&id);
            return Err(err.into());
        }
        self.ctx.fsm.mounted(&id)?;
        self.z_order.push(id.clone());
        self.resize.attach_window(&id);

        let geometry = self
            .ctx
            .store
            .get(&id)
            .map(|record| record.geometry)
            .ok_or_else(|| StoreError::UnknownWindow(id.clone()))?;
        tracing::debug!(window_id = %id, plugin_id = %spec.plugin_id, "window opened");
        self.ctx.bus.publish(WmEvent::WindowOpened {
            id: id.clone(),
            plugin_id: spec.plugin_id,
            geometry,
        });
        self.focus_window(&id)?;
        Ok(id)
    }

    pub fn close_window(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        if !self.ctx.fsm.contains(id) {
            return Err(TransitionError::UnknownWindow(id.clone()).into());
        }
        self.end_operations(id);
        self.ctx.fsm.close(id)?;
        self.ctx.store.remove(id);
        self.resize.detach_window(id);
        self.z_order.retain(|other| other != id);
        self.restore_geometry.remove(id);
        self.minimized_while_maximized.remove(id);
        tracing::debug!(window_id = %id, "window closed");
        self.ctx.bus.publish(WmEvent::WindowClosed { id: id.clone() });
        Ok(())
    }

    /// Focus `id` and raise it to the top of the stack.
    pub fn focus_window(&mut self, id: &WindowId) -> Result<WindowState, DesktopError> {
        let state = self.ctx.fsm.transition(id, FsmEvent::Focus)?;
        if let Some(pos) = self.z_order.iter().position(|other| other == id) {
            let item = self.z_order.remove(pos);
            self.z_order.push(item);
        }
        Ok(state)
    }

    pub fn minimize_window(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        let was_maximized = self.ctx.fsm.state(id) == Some(WindowState::Maximized);
        self.ctx.fsm.transition(id, FsmEvent::Minimize)?;
        if was_maximized {
            self.minimized_while_maximized.insert(id.clone());
        }
        self.resize.set_hover(None);
        Ok(())
    }

    /// Bring a minimized window back as `active`. A window minimized while
    /// maximized gets its pre-maximize geometry back.
    pub fn restore_window(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        self.ctx.fsm.transition(id, FsmEvent::Restore)?;
        if self.minimized_while_maximized.remove(id)
            && let Some(previous) = self.restore_geometry.remove(id)
        {
            self.apply_geometry(id, previous)?;
        }
        self.focus_window(id)?;
        Ok(())
    }

    /// Fill the workspace, remembering the current geometry for
    /// [`unmaximize_window`](Self::unmaximize_window). An earlier save that
    /// was never restored wins.
    pub fn maximize_window(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        let previous = self.geometry_of(id)?;
        self.ctx.fsm.transition(id, FsmEvent::Maximize)?;
        self.restore_geometry.entry(id.clone()).or_insert(previous);
        let workspace = self.config.workspace;
        self.apply_geometry(id, Geometry::new(0.0, 0.0, workspace.width, workspace.height))?;
        self.focus_window(id)?;
        Ok(())
    }

    pub fn unmaximize_window(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        self.ctx.fsm.transition(id, FsmEvent::Unmaximize)?;
        if let Some(previous) = self.restore_geometry.remove(id) {
            self.apply_geometry(id, previous)?;
        }
        Ok(())
    }

    pub fn toggle_maximize(&mut self, id: &WindowId) -> Result<(), DesktopError> {
        match self.state(id) {
            Some(WindowState::Maximized) => self.unmaximize_window(id),
            _ => self.maximize_window(id),
        }
    }

    /// Programmatic move. No clamping to the workspace is applied.
    pub fn move_window(&mut self, id: &WindowId, x: f64, y: f64) -> Result<(), DesktopError> {
        self.ctx.store.set(id, WindowPatch::position(x, y))?;
        Ok(())
    }

    /// Programmatic resize; the result is clamped to the window's minimum.
    pub fn resize_window(&mut self, id: &WindowId, width: f64, height: f64) -> Result<(), DesktopError> {
        let current = self.geometry_of(id)?;
        self.apply_geometry(id, Geometry::new(current.x, current.y, width, height))
    }

    pub fn set_resizable(&mut self, id: &WindowId, resizable: bool) -> Result<(), DesktopError> {
        self.ctx.store.set(
            id,
            WindowPatch {
                resizable: Some(resizable),
                ..WindowPatch::default()
            },
        )?;
        self.ctx.fsm.set_resizable(id, resizable);
        Ok(())
    }

    pub fn can_drag_window(&self, id: &WindowId) -> bool {
        self.ctx.fsm.can_drag_window(id)
    }

    pub fn can_resize_window(&self, id: &WindowId) -> bool {
        self.ctx.fsm.can_resize_window(id)
    }

    /// Begin a title-bar drag of `id` with the pointer at `at`.
    pub fn start_drag_window(&mut self, id: &WindowId, at: Point) -> bool {
        if self.resize.has_active() {
            return false;
        }
        self.drag.begin(&mut self.ctx, self.pointer.as_mut(), id, at)
    }

    /// Begin resizing `id` by `edge` with the pointer at `at`.
    pub fn start_resize_window(&mut self, id: &WindowId, edge: ResizeEdge, at: Point) -> bool {
        if self.drag.active().is_some() {
            return false;
        }
        self.resize
            .begin(&mut self.ctx, self.pointer.as_mut(), id, edge, at)
    }

    /// Topmost shown window under `point`, and which part of it was hit.
    pub fn hit_test(&self, point: Point) -> Option<PointerTarget> {
        let id = self.z_order.iter().rev().find(|id| {
            self.is_shown(id)
                && self
                    .ctx
                    .store
                    .get(id)
                    .is_some_and(|record| record.geometry.contains(point))
        })?;
        if self.state(id) != Some(WindowState::Maximized)
            && let Some(edge) = self.resize.hit_test(&self.ctx, id, point)
        {
            return Some(PointerTarget::Handle(id.clone(), edge));
        }
        let geometry = self.ctx.store.get(id)?.geometry;
        if point.y < geometry.y + self.config.title_bar_height {
            Some(PointerTarget::TitleBar(id.clone()))
        } else {
            Some(PointerTarget::Body(id.clone()))
        }
    }

    /// Route one raw pointer sample. Returns whether anything consumed it.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        let at = event.position;
        match event.kind {
            PointerKind::Down => {
                if self.drag.active().is_some() || self.resize.has_active() {
                    return false;
                }
                let Some(target) = self.hit_test(at) else {
                    return false;
                };
                if let Err(err) = self.focus_window(target.window()) {
                    tracing::debug!(error = %err, "focus on pointer-down rejected");
                }
                match target {
                    PointerTarget::Handle(id, edge) => self.start_resize_window(&id, edge, at),
                    PointerTarget::TitleBar(id) => self.start_drag_window(&id, at),
                    PointerTarget::Body(_) => true,
                }
            }
            PointerKind::Move => {
                if self.drag.active().is_some() {
                    self.drag
                        .pointer_moved(&mut self.ctx, self.pointer.as_mut(), at)
                } else if self.resize.has_active() {
                    self.resize.pointer_moved(at)
                } else {
                    let hovered = self
                        .hit_test(at)
                        .map(|target| target.window().clone())
                        .filter(|id| self.ctx.store.get(id).is_some_and(|r| r.resizable));
                    self.resize.set_hover(hovered.as_ref())
                }
            }
            PointerKind::Up => {
                if self.drag.active().is_some() {
                    self.drag
                        .pointer_released(&mut self.ctx, self.pointer.as_mut(), Some(at))
                        .is_some()
                } else if self.resize.has_active() {
                    !self
                        .resize
                        .pointer_released(&mut self.ctx, self.pointer.as_mut(), Some(at))
                        .is_empty()
                } else {
                    false
                }
            }
        }
    }

    /// Called by the host when a requested animation frame fires.
    pub fn run_frame(&mut self) -> usize {
        self.resize.run_frame(&mut self.ctx, self.pointer.as_mut())
    }

    /// Called by the host's size observer.
    pub fn on_size_observed(&mut self, id: &WindowId, width: f64, height: f64) -> bool {
        self.resize.size_observed(&mut self.ctx, id, width, height)
    }

    /// `id` lost focus at the host level; its pointer-up may never arrive.
    pub fn window_blurred(&mut self, id: &WindowId) -> bool {
        self.end_operations(id)
    }

    /// The whole surface lost visibility: end every in-flight operation.
    pub fn visibility_lost(&mut self) -> usize {
        let ids: Vec<_> = self.ctx.fsm.ids().cloned().collect();
        ids.iter().filter(|id| self.end_operations(id)).count()
    }

    /// End operations, close every window, drop the broadcast channel and
    /// release every host resource.
    pub fn teardown(&mut self) {
        self.visibility_lost();
        self.resize.teardown(&mut self.ctx, self.pointer.as_mut());
        let ids: Vec<_> = self.z_order.clone();
        for id in ids.iter().rev() {
            if let Err(err) = self.close_window(id) {
                tracing::warn!(window_id = %id, error = %err, "window did not close cleanly");
            }
        }
        self.ctx.bus.clear_broadcast();
        tracing::debug!("desktop torn down");
    }

    fn end_operations(&mut self, id: &WindowId) -> bool {
        let dragged = self
            .drag
            .force_end(&mut self.ctx, self.pointer.as_mut(), id)
            .is_some();
        let resized = self
            .resize
            .force_end(&mut self.ctx, self.pointer.as_mut(), id);
        let stale = self.ctx.fsm.force_end(id).is_some();
        dragged || resized || stale
    }

    fn apply_geometry(&mut self, id: &WindowId, geometry: Geometry) -> Result<(), DesktopError> {
        let before = self.geometry_of(id)?;
        self.ctx.store.set(id, WindowPatch::geometry(geometry))?;
        let after = self.geometry_of(id)?;
        if before.size() != after.size() {
            self.ctx.bus.publish(WmEvent::Resized {
                id: id.clone(),
                width: after.width,
                height: after.height,
            });
        }
        Ok(())
    }

    fn geometry_of(&self, id: &WindowId) -> Result<Geometry, StoreError> {
        self.ctx
            .store
            .get(id)
            .map(|record| record.geometry)
            .ok_or_else(|| StoreError::UnknownWindow(id.clone()))
    }

    fn is_shown(&self, id: &WindowId) -> bool {
        self.ctx
            .fsm
            .state(id)
            .is_some_and(|state| state != WindowState::Minimized && !state.is_terminal())
    }

    fn next_id(&mut self, plugin_id: &str) -> WindowId {
        loop {
            self.next_serial += 1;
            let id = WindowId::new(format!("{plugin_id}-{}", self.next_serial));
            if !self.ctx.store.contains(&id) && !self.ctx.fsm.contains(&id) {
                return id;
            }
        }
    }
}
