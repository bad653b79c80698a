use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::bus::WmEvent;
use crate::constants::{LATENCY_SMOOTHING, SIZE_EPSILON};
use crate::context::WindowContext;
use crate::geometry::{Geometry, Point};
use crate::host::{FrameRequest, FrameScheduler, ListenerOwner, PointerSource, SizeObserver};
use crate::window::{WindowId, WindowPatch};

use super::{HandleSet, ResizeConstraints, ResizeEdge, ResizeStart, compute_resize};

/// Frame-throttling counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResizeStats {
    /// Frames that applied a pointer sample.
    pub frames: u64,
    /// Samples overwritten by a newer one before their frame ran.
    pub dropped_samples: u64,
    pub average_frame_latency: Duration,
}

impl ResizeStats {
    fn record_frame(&mut self, elapsed: Duration) {
        self.frames += 1;
        let smoothed = self.average_frame_latency.as_secs_f64() * LATENCY_SMOOTHING
            + elapsed.as_secs_f64() * (1.0 - LATENCY_SMOOTHING);
        self.average_frame_latency = Duration::from_secs_f64(smoothed);
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveResize {
    edge: ResizeEdge,
    start: ResizeStart,
    constraints: ResizeConstraints,
}

/// Drives every pointer resize and reconciles externally observed sizes.
///
/// Pointer moves are coalesced: at most one frame is pending at a time and
/// only the latest sample is applied when it fires. One listener pair is
/// shared by all active resizes and one size observer by all windows.
pub struct ResizeManager {
    handles: BTreeMap<WindowId, HandleSet>,
    active: BTreeMap<WindowId, ActiveResize>,
    pending: Option<Point>,
    frame: Option<FrameRequest>,
    listening: bool,
    observer: Box<dyn SizeObserver>,
    frames: Box<dyn FrameScheduler>,
    thickness: f64,
    stats: ResizeStats,
}

impl ResizeManager {
    pub fn new(
        observer: Box<dyn SizeObserver>,
        frames: Box<dyn FrameScheduler>,
        thickness: f64,
    ) -> Self {
        Self {
            handles: BTreeMap::new(),
            active: BTreeMap::new(),
            pending: None,
            frame: None,
            listening: false,
            observer,
            frames,
            thickness,
            stats: ResizeStats::default(),
        }
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn stats(&self) -> ResizeStats {
        self.stats
    }

    /// Create the handle set for a newly opened window and start observing it.
    pub fn attach_window(&mut self, id: &WindowId) {
        self.handles
            .entry(id.clone())
            .or_insert_with(|| HandleSet::new(id.clone()));
        self.observer.observe(id);
    }

    /// Drop the handles and observation for a closing window. Any resize on
    /// it must already have been ended.
    pub fn detach_window(&mut self, id: &WindowId) {
        self.handles.remove(id);
        self.active.remove(id);
        self.observer.unobserve(id);
    }

    pub fn handles(&self, id: &WindowId) -> Option<&HandleSet> {
        self.handles.get(id)
    }

    pub fn is_resizing(&self, id: &WindowId) -> bool {
        self.active.contains_key(id)
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn frame_pending(&self) -> bool {
        self.frame.is_some()
    }

    /// Which handle of `id`, if any, lies under `point`. Windows that are
    /// not resizable expose no handles.
    pub fn hit_test(&self, ctx: &WindowContext, id: &WindowId, point: Point) -> Option<ResizeEdge> {
        let set = self.handles.get(id)?;
        let record = ctx.store.get(id)?;
        if !record.resizable {
            return None;
        }
        set.hit_test(record.geometry, self.thickness, point)
    }

    /// Mark `hovered` as the only window whose handles are hovered.
    /// Returns whether any visibility changed.
    pub fn set_hover(&mut self, hovered: Option<&WindowId>) -> bool {
        let mut changed = false;
        for (id, set) in self.handles.iter_mut() {
            let on = hovered == Some(id);
            if set.hovered() != on {
                set.set_hovered(on);
                changed = true;
            }
        }
        changed
    }

    /// Start resizing `id` by `edge` from pointer position `at`.
    ///
    /// `false` means the guard refused or the window is unknown; nothing
    /// was changed in that case.
    pub fn begin(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        id: &WindowId,
        edge: ResizeEdge,
        at: Point,
    ) -> bool {
        if !at.is_finite() || self.active.contains_key(id) {
            return false;
        }
        let Some(record) = ctx.store.get(id) else {
            return false;
        };
        let geometry = record.geometry;
        let constraints = ResizeConstraints::min(record.min_width, record.min_height);
        if !ctx.fsm.start_resize_window(id) {
            return false;
        }
        let flags = WindowPatch {
            is_resizing: Some(true),
            resize_handle: Some(Some(edge)),
            ..WindowPatch::default()
        };
        if let Err(err) = ctx.store.set(id, flags) {
            tracing::debug!(window_id = %id, error = %err, "resize flags not recorded");
        }
        if let Some(set) = self.handles.get_mut(id) {
            set.set_resizing(true);
        }
        self.active.insert(
            id.clone(),
            ActiveResize {
                edge,
                start: ResizeStart {
                    start_x: at.x,
                    start_y: at.y,
                    start_width: geometry.width,
                    start_height: geometry.height,
                    start_left: geometry.x,
                    start_top: geometry.y,
                },
                constraints,
            },
        );
        if !self.listening {
            pointer.attach(ListenerOwner::Resize);
            self.listening = true;
        }
        tracing::debug!(window_id = %id, handle = edge.as_str(), "resize started");
        ctx.bus.publish(WmEvent::ResizeStart {
            id: id.clone(),
            handle: edge,
            geometry,
        });
        true
    }

    /// Record a pointer sample and make sure a frame is scheduled for it.
    /// A sample still waiting for its frame is replaced, never queued.
    pub fn pointer_moved(&mut self, at: Point) -> bool {
        if self.active.is_empty() {
            return false;
        }
        if !at.is_finite() {
            return true;
        }
        if self.pending.replace(at).is_some() {
            self.stats.dropped_samples += 1;
            tracing::trace!("resize sample superseded before its frame");
        }
        if self.frame.is_none() {
            self.frame = Some(self.frames.request_frame());
        }
        true
    }

    /// Apply the latest sample to every active resize. Returns how many
    /// windows were updated.
    pub fn run_frame(&mut self, ctx: &mut WindowContext, pointer: &mut dyn PointerSource) -> usize {
        self.frame = None;
        match self.pending.take() {
            Some(at) => self.apply(ctx, pointer, at),
            None => 0,
        }
    }

    /// End every active resize. The release position, when given, is
    /// applied as the final sample before the windows are finalised.
    pub fn pointer_released(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        at: Option<Point>,
    ) -> Vec<WindowId> {
        if self.active.is_empty() {
            return Vec::new();
        }
        if let Some(at) = at.filter(Point::is_finite) {
            self.pending = Some(at);
        }
        if let Some(sample) = self.pending.take() {
            self.apply(ctx, pointer, sample);
        }
        self.cancel_frame();
        let finished: Vec<_> = std::mem::take(&mut self.active).into_iter().collect();
        let ids = finished.iter().map(|(id, _)| id.clone()).collect();
        for (id, op) in finished {
            self.finish(ctx, &id, op);
        }
        self.release_listeners(pointer);
        ids
    }

    /// End the resize on `id` without applying any pending sample. No
    /// `window:resize_end` is published for an aborted gesture.
    pub fn force_end(
        &mut self,
        ctx: &mut WindowContext,
        pointer: &mut dyn PointerSource,
        id: &WindowId,
    ) -> bool {
        if self.active.remove(id).is_none() {
            return false;
        }
        self.settle(ctx, id);
        tracing::debug!(window_id = %id, "resize force-ended");
        if self.active.is_empty() {
            self.pending = None;
            self.cancel_frame();
            self.release_listeners(pointer);
        }
        true
    }

    /// Reconcile a size reported by the host's observer.
    ///
    /// Reports for windows under an active pointer resize are ignored, as are
    /// reports that match the stored size. Returns whether the store changed.
    pub fn size_observed(&mut self, ctx: &mut WindowContext, id: &WindowId, width: f64, height: f64) -> bool {
        if self.active.contains_key(id) || !width.is_finite() || !height.is_finite() {
            return false;
        }
        let Some(record) = ctx.store.get(id) else {
            return false;
        };
        let current = record.geometry;
        if (current.width - width).abs() < SIZE_EPSILON && (current.height - height).abs() < SIZE_EPSILON {
            return false;
        }
        if let Err(err) = ctx.store.set(id, WindowPatch::size(width, height)) {
            tracing::debug!(window_id = %id, error = %err, "observed size rejected");
            return false;
        }
        let Some(updated) = ctx.store.get(id).map(|record| record.geometry) else {
            return false;
        };
        tracing::debug!(window_id = %id, width = updated.width, height = updated.height, "size reconciled");
        ctx.bus.publish(WmEvent::Resized {
            id: id.clone(),
            width: updated.width,
            height: updated.height,
        });
        true
    }

    /// Force-end everything and stop observing; the manager is unusable for
    /// observation afterwards until windows are attached again.
    pub fn teardown(&mut self, ctx: &mut WindowContext, pointer: &mut dyn PointerSource) {
        let ids: Vec<_> = self.active.keys().cloned().collect();
        for id in ids {
            self.force_end(ctx, pointer, &id);
        }
        self.pending = None;
        self.cancel_frame();
        self.release_listeners(pointer);
        self.handles.clear();
        self.observer.disconnect();
    }

    fn apply(&mut self, ctx: &mut WindowContext, pointer: &mut dyn PointerSource, at: Point) -> usize {
        let started = Instant::now();
        let mut applied = 0;
        let mut vanished = Vec::new();
        for (id, op) in &self.active {
            let Some(current) = ctx.store.get(id).map(|record| record.geometry) else {
                vanished.push(id.clone());
                continue;
            };
            let outcome = compute_resize(op.edge, at, &op.start, &op.constraints);
            let mut patch = WindowPatch::size(outcome.new_width, outcome.new_height);
            if outcome.changed_x || outcome.new_x != current.x {
                patch.x = Some(outcome.new_x);
            }
            if outcome.changed_y || outcome.new_y != current.y {
                patch.y = Some(outcome.new_y);
            }
            if let Err(err) = ctx.store.set(id, patch) {
                tracing::debug!(window_id = %id, error = %err, "resize frame skipped");
                continue;
            }
            let geometry = ctx.store.get(id).map(|record| record.geometry).unwrap_or(Geometry {
                x: outcome.new_x,
                y: outcome.new_y,
                width: outcome.new_width,
                height: outcome.new_height,
            });
            ctx.bus.publish(WmEvent::Resizing {
                id: id.clone(),
                handle: op.edge,
                geometry,
            });
            applied += 1;
        }
        for id in vanished {
            tracing::debug!(window_id = %id, "resized window vanished; dropping resize");
            self.active.remove(&id);
            ctx.fsm.end_resize_window(&id);
        }
        if self.active.is_empty() {
            self.release_listeners(pointer);
        }
        self.stats.record_frame(started.elapsed());
        applied
    }

    fn finish(&mut self, ctx: &mut WindowContext, id: &WindowId, op: ActiveResize) {
        let Some(geometry) = self.settle(ctx, id) else {
            return;
        };
        tracing::debug!(
            window_id = %id,
            handle = op.edge.as_str(),
            width = geometry.width,
            height = geometry.height,
            "resize finished"
        );
        ctx.bus.publish(WmEvent::ResizeEnd {
            id: id.clone(),
            final_width: geometry.width,
            final_height: geometry.height,
            x: geometry.x,
            y: geometry.y,
        });
    }

    /// Return the window to idle without announcing a completed resize.
    fn settle(&mut self, ctx: &mut WindowContext, id: &WindowId) -> Option<Geometry> {
        ctx.fsm.end_resize_window(id);
        if let Some(set) = self.handles.get_mut(id) {
            set.set_resizing(false);
        }
        let flags = WindowPatch {
            is_resizing: Some(false),
            resize_handle: Some(None),
            ..WindowPatch::default()
        };
        ctx.store.set(id, flags).ok()?;
        ctx.store.get(id).map(|record| record.geometry)
    }

    fn cancel_frame(&mut self) {
        if let Some(request) = self.frame.take() {
            self.frames.cancel_frame(request);
        }
    }

    fn release_listeners(&mut self, pointer: &mut dyn PointerSource) {
        if self.listening {
            pointer.detach(ListenerOwner::Resize);
            self.listening = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::{EventBus, EventName, SubscribeOptions};
    use crate::fsm::WindowState;
    use crate::host::{ListenerRegistry, ObservedWindows, TickScheduler};
    use crate::window::{WindowRecord, WindowSpec};

    struct Rig {
        ctx: WindowContext,
        manager: ResizeManager,
        listeners: ListenerRegistry,
        frames: TickScheduler,
        observed: ObservedWindows,
        events: Rc<RefCell<Vec<WmEvent>>>,
    }

    impl Rig {
        fn new() -> Self {
            let bus = Rc::new(EventBus::new());
            let events = Rc::new(RefCell::new(Vec::new()));
            for name in [
                EventName::ResizeStart,
                EventName::Resizing,
                EventName::ResizeEnd,
                EventName::Resized,
            ] {
                let sink = events.clone();
                bus.subscribe(
                    name,
                    move |env| {
                        sink.borrow_mut().push(env.event.clone());
                        Ok(())
                    },
                    SubscribeOptions::default(),
                );
            }
            let frames = TickScheduler::new();
            let observed = ObservedWindows::new();
            Self {
                ctx: WindowContext::new(bus),
                manager: ResizeManager::new(Box::new(observed.clone()), Box::new(frames.clone()), 8.0),
                listeners: ListenerRegistry::new(),
                frames,
                observed,
                events,
            }
        }

        fn open(&mut self, id: &str, geometry: Geometry) -> WindowId {
            let id = WindowId::from(id);
            let spec = WindowSpec::new("pos", geometry);
            self.ctx.store.insert(WindowRecord::new(id.clone(), &spec)).unwrap();
            self.ctx.fsm.open(&id, true).unwrap();
            self.ctx.fsm.mounted(&id).unwrap();
            self.manager.attach_window(&id);
            id
        }

        fn begin(&mut self, id: &WindowId, edge: ResizeEdge, x: f64, y: f64) -> bool {
            let mut pointer = self.listeners.clone();
            self.manager.begin(&mut self.ctx, &mut pointer, id, edge, Point::new(x, y))
        }

        fn tick(&mut self) -> usize {
            let mut pointer = self.listeners.clone();
            match self.frames.take_pending() {
                Some(_) => self.manager.run_frame(&mut self.ctx, &mut pointer),
                None => 0,
            }
        }

        fn release(&mut self, at: Option<Point>) -> Vec<WindowId> {
            let mut pointer = self.listeners.clone();
            self.manager.pointer_released(&mut self.ctx, &mut pointer, at)
        }

        fn geometry(&self, id: &WindowId) -> Geometry {
            self.ctx.store.get(id).unwrap().geometry
        }
    }

    #[test]
    fn bottom_right_resize_end_to_end() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 200.0, 150.0));
        assert!(rig.begin(&id, ResizeEdge::BottomRight, 200.0, 150.0));
        assert!(rig.ctx.store.get(&id).unwrap().is_resizing);
        assert!(rig.manager.handles(&id).unwrap().visible());

        rig.manager.pointer_moved(Point::new(260.0, 210.0));
        assert_eq!(rig.tick(), 1);
        assert_eq!(rig.geometry(&id), Geometry::new(0.0, 0.0, 260.0, 210.0));

        assert_eq!(rig.release(None), vec![id.clone()]);
        assert_eq!(rig.ctx.fsm.state(&id), Some(WindowState::Active));
        assert_eq!(rig.listeners.total(), 0);
        let record = rig.ctx.store.get(&id).unwrap();
        assert!(!record.is_resizing);
        assert_eq!(record.resize_handle, None);
        assert_eq!(
            rig.events.borrow().last(),
            Some(&WmEvent::ResizeEnd {
                id,
                final_width: 260.0,
                final_height: 210.0,
                x: 0.0,
                y: 0.0,
            })
        );
    }

    #[test]
    fn samples_coalesce_per_frame() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 300.0, 300.0));
        assert!(rig.begin(&id, ResizeEdge::Right, 300.0, 10.0));
        for x in [310.0, 320.0, 330.0] {
            rig.manager.pointer_moved(Point::new(x, 10.0));
        }
        assert_eq!(rig.frames.requested(), 1);
        assert_eq!(rig.manager.stats().dropped_samples, 2);
        rig.tick();
        assert_eq!(rig.geometry(&id).width, 330.0);
        assert_eq!(rig.manager.stats().frames, 1);
        let resizing = rig
            .events
            .borrow()
            .iter()
            .filter(|e| e.name() == EventName::Resizing)
            .count();
        assert_eq!(resizing, 1);
    }

    #[test]
    fn release_flushes_final_sample() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(100.0, 100.0, 300.0, 300.0));
        assert!(rig.begin(&id, ResizeEdge::TopLeft, 100.0, 100.0));
        rig.manager.pointer_moved(Point::new(120.0, 130.0));
        rig.release(Some(Point::new(90.0, 80.0)));
        assert_eq!(rig.geometry(&id), Geometry::new(90.0, 80.0, 310.0, 320.0));
        assert!(!rig.frames.is_pending());
        assert!(!rig.manager.frame_pending());
    }

    #[test]
    fn left_edge_returning_to_start_restores_origin() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(50.0, 0.0, 300.0, 200.0));
        assert!(rig.begin(&id, ResizeEdge::Left, 50.0, 10.0));
        rig.manager.pointer_moved(Point::new(80.0, 10.0));
        rig.tick();
        assert_eq!(rig.geometry(&id).x, 80.0);
        rig.manager.pointer_moved(Point::new(50.0, 10.0));
        rig.tick();
        assert_eq!(rig.geometry(&id), Geometry::new(50.0, 0.0, 300.0, 200.0));
    }

    #[test]
    fn clamped_left_resize_never_drifts() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 250.0, 200.0));
        assert!(rig.begin(&id, ResizeEdge::Left, 0.0, 50.0));
        rig.manager.pointer_moved(Point::new(200.0, 50.0));
        rig.tick();
        let g = rig.geometry(&id);
        assert_eq!((g.x, g.width), (50.0, 200.0));
        assert!(g.width >= 200.0 && g.height >= 150.0);
    }

    #[test]
    fn guard_rejects_second_start_and_unknown_window() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 300.0, 300.0));
        assert!(rig.begin(&id, ResizeEdge::Right, 300.0, 0.0));
        assert!(!rig.begin(&id, ResizeEdge::Bottom, 0.0, 300.0));
        assert!(!rig.begin(&WindowId::from("ghost"), ResizeEdge::Right, 0.0, 0.0));
        assert_eq!(rig.listeners.count(ListenerOwner::Resize), 1);
    }

    #[test]
    fn concurrent_resizes_share_one_listener_pair() {
        let mut rig = Rig::new();
        let a = rig.open("a", Geometry::new(0.0, 0.0, 300.0, 300.0));
        let b = rig.open("b", Geometry::new(400.0, 0.0, 300.0, 300.0));
        assert!(rig.begin(&a, ResizeEdge::Right, 300.0, 0.0));
        assert!(rig.begin(&b, ResizeEdge::Right, 300.0, 0.0));
        assert_eq!(rig.listeners.attach_calls(), 1);
        rig.manager.pointer_moved(Point::new(320.0, 0.0));
        assert_eq!(rig.tick(), 2);
        assert_eq!(rig.release(None).len(), 2);
        assert_eq!(rig.listeners.total(), 0);
        assert_eq!(rig.geometry(&b).width, 320.0);
    }

    #[test]
    fn force_end_leaves_window_active() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 300.0, 300.0));
        assert!(rig.begin(&id, ResizeEdge::Bottom, 0.0, 300.0));
        rig.manager.pointer_moved(Point::new(0.0, 350.0));
        let mut pointer = rig.listeners.clone();
        assert!(rig.manager.force_end(&mut rig.ctx, &mut pointer, &id));
        assert_eq!(rig.ctx.fsm.state(&id), Some(WindowState::Active));
        assert_eq!(rig.geometry(&id).height, 300.0);
        assert!(!rig.frames.is_pending());
        assert_eq!(rig.listeners.total(), 0);
        assert!(rig.ctx.fsm.can_resize_window(&id));
        assert!(!rig.ctx.store.get(&id).unwrap().is_resizing);
        assert!(
            !rig
                .events
                .borrow()
                .iter()
                .any(|e| matches!(e, WmEvent::ResizeEnd { .. }))
        );
    }

    #[test]
    fn observed_size_reconciles_only_idle_windows() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 300.0, 300.0));
        assert!(rig.observed.is_observed(&id));
        assert!(rig.manager.size_observed(&mut rig.ctx, &id, 320.0, 310.0));
        assert_eq!(rig.geometry(&id).size(), crate::geometry::Size::new(320.0, 310.0));
        assert!(!rig.manager.size_observed(&mut rig.ctx, &id, 320.2, 310.0));

        assert!(rig.begin(&id, ResizeEdge::Right, 320.0, 0.0));
        assert!(!rig.manager.size_observed(&mut rig.ctx, &id, 500.0, 500.0));
        assert_eq!(rig.geometry(&id).width, 320.0);
        assert!(rig.events.borrow().iter().any(|e| matches!(
            e,
            WmEvent::Resized {
                width: 320.0,
                height: 310.0,
                ..
            }
        )));
    }

    #[test]
    fn hover_controls_visibility() {
        let mut rig = Rig::new();
        let a = rig.open("a", Geometry::new(0.0, 0.0, 300.0, 300.0));
        let b = rig.open("b", Geometry::new(400.0, 0.0, 300.0, 300.0));
        assert!(rig.manager.set_hover(Some(&a)));
        assert!(!rig.manager.set_hover(Some(&a)));
        assert!(rig.manager.handles(&a).unwrap().visible());
        assert!(rig.manager.set_hover(Some(&b)));
        assert!(!rig.manager.handles(&a).unwrap().visible());
        assert_eq!(
            rig.manager.hit_test(&rig.ctx, &b, Point::new(699.0, 299.0)),
            Some(ResizeEdge::BottomRight)
        );
    }

    #[test]
    fn teardown_disconnects_observer() {
        let mut rig = Rig::new();
        let id = rig.open("w", Geometry::new(0.0, 0.0, 300.0, 300.0));
        assert!(rig.begin(&id, ResizeEdge::Right, 300.0, 0.0));
        let mut pointer = rig.listeners.clone();
        rig.manager.teardown(&mut rig.ctx, &mut pointer);
        assert!(!rig.manager.has_active());
        assert!(rig.observed.is_empty());
        assert!(!rig.observed.is_connected());
        assert_eq!(rig.listeners.total(), 0);
    }
}
