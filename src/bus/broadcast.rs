use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::BroadcastError;

/// Inter-tab transport for serialized envelopes.
///
/// Implementations may echo a message back to its sender; the bus drops
/// envelopes carrying its own origin.
pub trait BroadcastChannel {
    fn post(&mut self, message: &str) -> Result<(), BroadcastError>;
    fn try_recv(&mut self) -> Option<String>;
}

#[derive(Default)]
struct HubState {
    inboxes: Vec<Option<VecDeque<String>>>,
}

/// In-process hub; every endpoint receives every post, its own included.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Rc<RefCell<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> LoopbackChannel {
        let mut state = self.state.borrow_mut();
        // Slots freed by dropped endpoints are reused.
        let slot = match state.inboxes.iter().position(Option::is_none) {
            Some(free) => {
                state.inboxes[free] = Some(VecDeque::new());
                free
            }
            None => {
                state.inboxes.push(Some(VecDeque::new()));
                state.inboxes.len() - 1
            }
        };
        LoopbackChannel {
            hub: self.state.clone(),
            slot,
        }
    }
}

pub struct LoopbackChannel {
    hub: Rc<RefCell<HubState>>,
    slot: usize,
}

impl BroadcastChannel for LoopbackChannel {
    fn post(&mut self, message: &str) -> Result<(), BroadcastError> {
        let mut state = self.hub.borrow_mut();
        if state.inboxes.get(self.slot).is_none_or(|inbox| inbox.is_none()) {
            return Err(BroadcastError::Closed);
        }
        for inbox in state.inboxes.iter_mut().flatten() {
            inbox.push_back(message.to_owned());
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        let mut state = self.hub.borrow_mut();
        state.inboxes.get_mut(self.slot)?.as_mut()?.pop_front()
    }
}

impl Drop for LoopbackChannel {
    fn drop(&mut self) {
        if let Ok(mut state) = self.hub.try_borrow_mut()
            && let Some(inbox) = state.inboxes.get_mut(self.slot)
        {
            *inbox = None;
        }
    }
}
