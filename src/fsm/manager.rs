use std::collections::HashMap;
use std::rc::Rc;

use crate::bus::{EventBus, WmEvent};
use crate::error::TransitionError;
use crate::window::WindowId;

use super::{FsmEvent, Transition, WindowFsm, WindowState};

/// Pointer operation recorded against a window while it is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Drag,
    Resize,
}

#[derive(Debug)]
struct Entry {
    fsm: WindowFsm,
    operation: Option<Operation>,
}

/// Registry of one state machine per live window.
///
/// Every accepted transition is published as `fsm:transition`; that event is
/// how the rest of the system observes lifecycle changes. An entry is
/// removed as soon as its machine reaches `closed`.
pub struct FsmManager {
    machines: HashMap<WindowId, Entry>,
    bus: Rc<EventBus>,
}

impl FsmManager {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            machines: HashMap::new(),
            bus,
        }
    }

    /// Register a machine for `id` and move it from `closed` to `opening`.
    pub fn open(&mut self, id: &WindowId, resizable: bool) -> Result<(), TransitionError> {
        if self.machines.contains_key(id) {
            return Err(TransitionError::AlreadyOpen(id.clone()));
        }
        self.machines.insert(
            id.clone(),
            Entry {
                fsm: WindowFsm::new(resizable),
                operation: None,
            },
        );
        self.transition(id, FsmEvent::Open).map(|_| ())
    }

    /// Advance a freshly opened window past `opening`.
    pub fn mounted(&mut self, id: &WindowId) -> Result<WindowState, TransitionError> {
        self.transition(id, FsmEvent::Mounted)
    }

    /// Apply `event` to the machine for `id` and publish the transition.
    pub fn transition(
        &mut self,
        id: &WindowId,
        event: FsmEvent,
    ) -> Result<WindowState, TransitionError> {
        let entry = self
            .machines
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownWindow(id.clone()))?;
        let Transition { event, from, to } = entry.fsm.apply(event).inspect_err(|err| {
            tracing::debug!(window_id = %id, %event, error = %err, "transition rejected");
        })?;
        if !to.is_operating() {
            entry.operation = None;
        }
        if to == WindowState::Closed {
            self.machines.remove(id);
        }
        tracing::trace!(window_id = %id, %event, %from, %to, "fsm transition");
        self.bus.publish(WmEvent::FsmTransition {
            id: id.clone(),
            event,
            from_state: from,
            to_state: to,
        });
        if event == FsmEvent::Focus {
            self.bus.publish(WmEvent::WindowFocused {
                id: id.clone(),
                state: to,
            });
        }
        Ok(to)
    }

    /// Run `close` then `finalize`; the entry is gone afterwards.
    pub fn close(&mut self, id: &WindowId) -> Result<(), TransitionError> {
        self.transition(id, FsmEvent::Close)?;
        self.transition(id, FsmEvent::Finalize).map(|_| ())
    }

    pub fn contains(&self, id: &WindowId) -> bool {
        self.machines.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &WindowId> {
        self.machines.keys()
    }

    pub(crate) fn state(&self, id: &WindowId) -> Option<WindowState> {
        self.machines.get(id).map(|entry| entry.fsm.state())
    }

    pub fn set_resizable(&mut self, id: &WindowId, resizable: bool) -> bool {
        match self.machines.get_mut(id) {
            Some(entry) => {
                entry.fsm.set_resizable(resizable);
                true
            }
            None => false,
        }
    }

    pub fn operation(&self, id: &WindowId) -> Option<Operation> {
        self.machines.get(id).and_then(|entry| entry.operation)
    }

    pub fn can_drag_window(&self, id: &WindowId) -> bool {
        self.machines.get(id).is_some_and(|entry| {
            entry.operation.is_none()
                && matches!(
                    entry.fsm.state(),
                    WindowState::Active | WindowState::Maximized
                )
        })
    }

    /// Resizing is only legal from `active`, and only for resizable windows.
    pub fn can_resize_window(&self, id: &WindowId) -> bool {
        self.machines.get(id).is_some_and(|entry| {
            entry.operation.is_none()
                && entry.fsm.resizable()
                && entry.fsm.state() == WindowState::Active
        })
    }

    /// Check-and-transition into `dragging`. `false` means nothing changed.
    pub fn start_drag_window(&mut self, id: &WindowId) -> bool {
        self.start(id, Operation::Drag)
    }

    /// Check-and-transition into `resizing`. `false` means nothing changed.
    pub fn start_resize_window(&mut self, id: &WindowId) -> bool {
        self.start(id, Operation::Resize)
    }

    pub fn end_drag_window(&mut self, id: &WindowId) -> bool {
        self.end(id, Operation::Drag)
    }

    pub fn end_resize_window(&mut self, id: &WindowId) -> bool {
        self.end(id, Operation::Resize)
    }

    /// End whatever operation `id` has in flight through its `*_end`
    /// transition. Used when the pointer-up can no longer be trusted to
    /// arrive (focus or visibility loss).
    pub fn force_end(&mut self, id: &WindowId) -> Option<Operation> {
        let operation = self.operation(id)?;
        tracing::debug!(window_id = %id, ?operation, "force-ending operation");
        self.end(id, operation).then_some(operation)
    }

    fn start(&mut self, id: &WindowId, operation: Operation) -> bool {
        let (allowed, event) = match operation {
            Operation::Drag => (self.can_drag_window(id), FsmEvent::DragStart),
            Operation::Resize => (self.can_resize_window(id), FsmEvent::ResizeStart),
        };
        if !allowed {
            tracing::debug!(window_id = %id, ?operation, "guard rejected operation");
            return false;
        }
        if self.transition(id, event).is_err() {
            return false;
        }
        if let Some(entry) = self.machines.get_mut(id) {
            entry.operation = Some(operation);
        }
        true
    }

    fn end(&mut self, id: &WindowId, operation: Operation) -> bool {
        if self.operation(id) != Some(operation) {
            return false;
        }
        let event = match operation {
            Operation::Drag => FsmEvent::DragEnd,
            Operation::Resize => FsmEvent::ResizeEnd,
        };
        self.transition(id, event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::bus::{EventName, SubscribeOptions};

    fn manager() -> (FsmManager, Rc<RefCell<Vec<WmEvent>>>) {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            EventName::FsmTransition,
            move |env| {
                sink.borrow_mut().push(env.event.clone());
                Ok(())
            },
            SubscribeOptions::default(),
        );
        (FsmManager::new(bus), seen)
    }

    fn opened(m: &mut FsmManager, id: &str, resizable: bool) -> WindowId {
        let id = WindowId::from(id);
        m.open(&id, resizable).unwrap();
        m.mounted(&id).unwrap();
        id
    }

    #[test]
    fn every_transition_is_published() {
        let (mut m, seen) = manager();
        let id = opened(&mut m, "kds", true);
        m.transition(&id, FsmEvent::Maximize).unwrap();
        let events = seen.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            WmEvent::FsmTransition {
                id: id.clone(),
                event: FsmEvent::Maximize,
                from_state: WindowState::Active,
                to_state: WindowState::Maximized,
            }
        );
    }

    #[test]
    fn guards_track_state_and_operation() {
        let (mut m, _) = manager();
        let id = opened(&mut m, "pos", true);
        assert!(m.can_drag_window(&id));
        assert!(m.can_resize_window(&id));

        assert!(m.start_drag_window(&id));
        assert!(!m.can_drag_window(&id));
        assert!(!m.can_resize_window(&id));
        assert!(!m.start_drag_window(&id));
        assert!(!m.start_resize_window(&id));

        assert!(m.end_drag_window(&id));
        assert!(!m.end_drag_window(&id));
        assert_eq!(m.state(&id), Some(WindowState::Active));

        m.transition(&id, FsmEvent::Maximize).unwrap();
        assert!(m.can_drag_window(&id));
        assert!(!m.can_resize_window(&id));
        m.transition(&id, FsmEvent::Minimize).unwrap();
        assert!(!m.can_drag_window(&id));
    }

    #[test]
    fn operating_state_blocks_guards_without_a_recorded_operation() {
        let (mut m, _) = manager();
        let id = opened(&mut m, "pos", true);
        // A raw transition leaves no operation behind.
        m.transition(&id, FsmEvent::DragStart).unwrap();
        assert_eq!(m.operation(&id), None);
        assert!(!m.can_drag_window(&id));
        assert!(!m.can_resize_window(&id));
        assert!(!m.start_drag_window(&id));
        assert!(!m.start_resize_window(&id));
        m.transition(&id, FsmEvent::DragEnd).unwrap();

        m.transition(&id, FsmEvent::ResizeStart).unwrap();
        assert!(!m.can_drag_window(&id));
        assert!(!m.can_resize_window(&id));
    }

    #[test]
    fn unknown_window_is_a_quiet_false() {
        let (mut m, seen) = manager();
        let ghost = WindowId::from("ghost");
        assert!(!m.can_drag_window(&ghost));
        assert!(!m.start_drag_window(&ghost));
        assert!(!m.start_resize_window(&ghost));
        assert_eq!(m.force_end(&ghost), None);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn non_resizable_window_cannot_resize() {
        let (mut m, _) = manager();
        let id = opened(&mut m, "calc", false);
        assert!(!m.can_resize_window(&id));
        assert!(!m.start_resize_window(&id));
        assert!(m.set_resizable(&id, true));
        assert!(m.start_resize_window(&id));
    }

    #[test]
    fn close_removes_entry_and_rejects_further_events() {
        let (mut m, seen) = manager();
        let id = opened(&mut m, "files", true);
        assert!(m.start_drag_window(&id));
        m.close(&id).unwrap();
        assert!(!m.contains(&id));
        assert!(m.is_empty());
        assert_eq!(
            m.transition(&id, FsmEvent::Focus),
            Err(TransitionError::UnknownWindow(id.clone()))
        );
        let last = seen.borrow().last().cloned().unwrap();
        assert!(matches!(
            last,
            WmEvent::FsmTransition {
                to_state: WindowState::Closed,
                ..
            }
        ));
    }

    #[test]
    fn force_end_routes_through_end_transition() {
        let (mut m, seen) = manager();
        let id = opened(&mut m, "settings", true);
        assert!(m.start_resize_window(&id));
        assert_eq!(m.force_end(&id), Some(Operation::Resize));
        assert_eq!(m.state(&id), Some(WindowState::Active));
        assert!(m.can_resize_window(&id));
        assert!(matches!(
            seen.borrow().last(),
            Some(WmEvent::FsmTransition {
                event: FsmEvent::ResizeEnd,
                ..
            })
        ));
    }

    #[test]
    fn focus_emits_focused_notification() {
        let bus = Rc::new(EventBus::new());
        let focused = Rc::new(RefCell::new(Vec::new()));
        let sink = focused.clone();
        bus.subscribe(
            EventName::WindowFocused,
            move |env| {
                sink.borrow_mut().push(env.event.clone());
                Ok(())
            },
            SubscribeOptions::default(),
        );
        let mut m = FsmManager::new(bus);
        let id = opened(&mut m, "pos", true);
        m.transition(&id, FsmEvent::Minimize).unwrap();
        assert_eq!(m.transition(&id, FsmEvent::Focus), Ok(WindowState::Minimized));
        assert_eq!(
            *focused.borrow(),
            vec![WmEvent::WindowFocused {
                id,
                state: WindowState::Minimized
            }]
        );
    }

    #[test]
    fn duplicate_open_is_rejected() {
        let (mut m, _) = manager();
        let id = opened(&mut m, "pos", true);
        assert_eq!(m.open(&id, true), Err(TransitionError::AlreadyOpen(id)));
    }
}
