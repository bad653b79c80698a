use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::window::WindowId;

use super::{FrameRequest, FrameScheduler, ListenerOwner, PointerSource, SizeObserver};

#[derive(Debug, Default)]
struct ListenerState {
    attached: HashMap<ListenerOwner, usize>,
    attach_calls: usize,
}

/// Counts listener pairs per owner. A count above one means a leak.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    state: Rc<RefCell<ListenerState>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, owner: ListenerOwner) -> usize {
        self.state
            .borrow()
            .attached
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.state.borrow().attached.values().sum()
    }

    pub fn attach_calls(&self) -> usize {
        self.state.borrow().attach_calls
    }
}

impl PointerSource for ListenerRegistry {
    fn attach(&mut self, owner: ListenerOwner) {
        let mut state = self.state.borrow_mut();
        state.attach_calls += 1;
        *state.attached.entry(owner).or_default() += 1;
    }

    fn detach(&mut self, owner: ListenerOwner) {
        let mut state = self.state.borrow_mut();
        if let Some(count) = state.attached.get_mut(&owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.attached.remove(&owner);
            }
        }
    }

    fn is_attached(&self, owner: ListenerOwner) -> bool {
        self.count(owner) > 0
    }
}

#[derive(Debug, Default)]
struct TickState {
    next: u64,
    pending: Option<FrameRequest>,
    requested: usize,
}

/// Frame scheduler for loops that tick on their own clock. At most one
/// frame is ever pending.
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    state: Rc<RefCell<TickState>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Consume the pending frame, if any. The caller then runs the frame.
    pub fn take_pending(&self) -> Option<FrameRequest> {
        self.state.borrow_mut().pending.take()
    }

    pub fn requested(&self) -> usize {
        self.state.borrow().requested
    }
}

impl FrameScheduler for TickScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        let mut state = self.state.borrow_mut();
        state.next += 1;
        state.requested += 1;
        let request = FrameRequest(state.next);
        state.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(request) {
            state.pending = None;
        }
    }
}

#[derive(Debug, Default)]
struct ObservedState {
    ids: BTreeSet<WindowId>,
    connected: bool,
}

/// Size observer that only tracks which windows are observed; the host
/// feeds sizes in itself.
#[derive(Debug, Clone)]
pub struct ObservedWindows {
    state: Rc<RefCell<ObservedState>>,
}

impl Default for ObservedWindows {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(ObservedState {
                ids: BTreeSet::new(),
                connected: true,
            })),
        }
    }
}

impl ObservedWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_observed(&self, id: &WindowId) -> bool {
        self.state.borrow().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().ids.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
}

impl SizeObserver for ObservedWindows {
    fn observe(&mut self, id: &WindowId) {
        let mut state = self.state.borrow_mut();
        state.connected = true;
        state.ids.insert(id.clone());
    }

    fn unobserve(&mut self, id: &WindowId) {
        self.state.borrow_mut().ids.remove(id);
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.ids.clear();
        state.connected = false;
    }
}
