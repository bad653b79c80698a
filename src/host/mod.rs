//! Narrow interfaces to the host environment.
//!
//! The engine needs exactly three things from whatever runs it: a way to
//! route document-level pointer moves to a controller, an animation-frame
//! scheduler, and an element-size observer. Everything above that lives in
//! the host.

mod headless;

use crate::geometry::Point;
use crate::window::WindowId;

pub use headless::{ListenerRegistry, ObservedWindows, TickScheduler};

/// Which controller owns a document-level listener pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerOwner {
    Drag,
    Resize,
}

/// Document-level pointer move/up listener registry.
///
/// `attach` is called once when a controller's first operation starts and
/// `detach` when its last one ends; controllers keep track themselves so a
/// pair is never attached twice.
pub trait PointerSource {
    fn attach(&mut self, owner: ListenerOwner);
    fn detach(&mut self, owner: ListenerOwner);
    fn is_attached(&self, owner: ListenerOwner) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Animation-frame scheduling. The host calls `Desktop::run_frame` when a
/// requested frame fires.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameRequest;
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Shared element-size observer. The host reports changes through
/// `Desktop::on_size_observed`.
pub trait SizeObserver {
    fn observe(&mut self, id: &WindowId);
    fn unobserve(&mut self, id: &WindowId);
    fn disconnect(&mut self);
}

/// Everything the desktop needs from its host, injected at construction.
pub struct HostCapabilities {
    pub pointer: Box<dyn PointerSource>,
    pub frames: Box<dyn FrameScheduler>,
    pub sizes: Box<dyn SizeObserver>,
}

impl HostCapabilities {
    pub fn new(
        pointer: impl PointerSource + 'static,
        frames: impl FrameScheduler + 'static,
        sizes: impl SizeObserver + 'static,
    ) -> Self {
        Self {
            pointer: Box::new(pointer),
            frames: Box::new(frames),
            sizes: Box::new(sizes),
        }
    }

    /// In-process capabilities; returns the shared handles so callers can
    /// drive frames and inspect listener state.
    pub fn headless() -> (Self, HeadlessHandles) {
        let handles = HeadlessHandles::default();
        let caps = Self::new(
            handles.listeners.clone(),
            handles.frames.clone(),
            handles.observed.clone(),
        );
        (caps, handles)
    }
}

#[derive(Clone, Default)]
pub struct HeadlessHandles {
    pub listeners: ListenerRegistry,
    pub frames: TickScheduler,
    pub observed: ObservedWindows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

/// Raw pointer sample as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: Point,
}

impl PointerEvent {
    pub fn down(x: f64, y: f64) -> Self {
        Self {
            kind: PointerKind::Down,
            position: Point::new(x, y),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self {
            kind: PointerKind::Move,
            position: Point::new(x, y),
        }
    }

    pub fn up(x: f64, y: f64) -> Self {
        Self {
            kind: PointerKind::Up,
            position: Point::new(x, y),
        }
    }
}
