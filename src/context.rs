use std::rc::Rc;

use crate::bus::EventBus;
use crate::fsm::FsmManager;
use crate::window::WindowStore;

/// The three collaborators every geometry operation touches: the canonical
/// store, the lifecycle machines and the bus they publish on.
pub struct WindowContext {
    pub bus: Rc<EventBus>,
    pub store: WindowStore,
    pub fsm: FsmManager,
}

impl WindowContext {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            fsm: FsmManager::new(bus.clone()),
            store: WindowStore::new(),
            bus,
        }
    }
}
