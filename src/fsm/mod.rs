//! Per-window lifecycle state machine.
//!
//! ```text
//! closed --open--> opening --mounted--> active
//! active <--maximize/unmaximize--> maximized
//! active|maximized --minimize--> minimized --restore--> active
//! active|maximized --drag_start--> dragging --drag_end--> active
//! active (resizable) --resize_start--> resizing --resize_end--> active
//! * (non-terminal) --focus--> *
//! * (non-terminal) --close--> closing --finalize--> closed
//! ```

mod manager;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

pub use manager::{FsmManager, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Closed,
    Opening,
    Active,
    Minimized,
    Maximized,
    Dragging,
    Resizing,
    Closing,
}

impl WindowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowState::Closed => "closed",
            WindowState::Opening => "opening",
            WindowState::Active => "active",
            WindowState::Minimized => "minimized",
            WindowState::Maximized => "maximized",
            WindowState::Dragging => "dragging",
            WindowState::Resizing => "resizing",
            WindowState::Closing => "closing",
        }
    }

    /// `closed` and `closing` accept nothing but the internal finalize step.
    pub fn is_terminal(self) -> bool {
        matches!(self, WindowState::Closed | WindowState::Closing)
    }

    pub fn is_operating(self) -> bool {
        matches!(self, WindowState::Dragging | WindowState::Resizing)
    }
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsmEvent {
    Open,
    Mounted,
    Minimize,
    Restore,
    Maximize,
    Unmaximize,
    DragStart,
    DragEnd,
    ResizeStart,
    ResizeEnd,
    Focus,
    Close,
    Finalize,
}

impl FsmEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            FsmEvent::Open => "open",
            FsmEvent::Mounted => "mounted",
            FsmEvent::Minimize => "minimize",
            FsmEvent::Restore => "restore",
            FsmEvent::Maximize => "maximize",
            FsmEvent::Unmaximize => "unmaximize",
            FsmEvent::DragStart => "drag_start",
            FsmEvent::DragEnd => "drag_end",
            FsmEvent::ResizeStart => "resize_start",
            FsmEvent::ResizeEnd => "resize_end",
            FsmEvent::Focus => "focus",
            FsmEvent::Close => "close",
            FsmEvent::Finalize => "finalize",
        }
    }
}

impl fmt::Display for FsmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event: FsmEvent,
    pub from: WindowState,
    pub to: WindowState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFsm {
    state: WindowState,
    resizable: bool,
}

impl WindowFsm {
    pub fn new(resizable: bool) -> Self {
        Self {
            state: WindowState::Closed,
            resizable,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn resizable(&self) -> bool {
        self.resizable
    }

    pub fn set_resizable(&mut self, resizable: bool) {
        self.resizable = resizable;
    }

    /// Resolve the state `event` leads to without applying it.
    pub fn target(&self, event: FsmEvent) -> Result<WindowState, TransitionError> {
        use WindowState as S;
        let from = self.state;
        let to = match (event, from) {
            (FsmEvent::Open, S::Closed) => S::Opening,
            (FsmEvent::Mounted, S::Opening) => S::Active,
            (FsmEvent::Minimize, S::Active | S::Maximized) => S::Minimized,
            (FsmEvent::Restore, S::Minimized) => S::Active,
            (FsmEvent::Maximize, S::Active) => S::Maximized,
            (FsmEvent::Unmaximize, S::Maximized) => S::Active,
            (FsmEvent::DragStart, S::Active | S::Maximized) => S::Dragging,
            (FsmEvent::DragEnd, S::Dragging) => S::Active,
            (FsmEvent::ResizeStart, S::Active) if !self.resizable => {
                return Err(TransitionError::NotResizable);
            }
            (FsmEvent::ResizeStart, S::Active) => S::Resizing,
            (FsmEvent::ResizeEnd, S::Resizing) => S::Active,
            (FsmEvent::Focus, s) if !s.is_terminal() => s,
            (FsmEvent::Close, s) if !s.is_terminal() => S::Closing,
            (FsmEvent::Finalize, S::Closing) => S::Closed,
            _ => return Err(TransitionError::Illegal { event, from }),
        };
        Ok(to)
    }

    pub fn apply(&mut self, event: FsmEvent) -> Result<Transition, TransitionError> {
        let to = self.target(event)?;
        let transition = Transition {
            event,
            from: self.state,
            to,
        };
        self.state = to;
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(resizable: bool) -> WindowFsm {
        let mut fsm = WindowFsm::new(resizable);
        fsm.apply(FsmEvent::Open).unwrap();
        fsm.apply(FsmEvent::Mounted).unwrap();
        fsm
    }

    #[test]
    fn open_passes_through_opening() {
        let mut fsm = WindowFsm::new(true);
        let t = fsm.apply(FsmEvent::Open).unwrap();
        assert_eq!((t.from, t.to), (WindowState::Closed, WindowState::Opening));
        assert_eq!(fsm.apply(FsmEvent::Mounted).unwrap().to, WindowState::Active);
    }

    #[test]
    fn maximized_can_drag_but_not_resize() {
        let mut fsm = active(true);
        fsm.apply(FsmEvent::Maximize).unwrap();
        assert_eq!(fsm.target(FsmEvent::DragStart), Ok(WindowState::Dragging));
        assert!(matches!(
            fsm.target(FsmEvent::ResizeStart),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn resize_requires_resizable_flag() {
        let fsm = active(false);
        assert_eq!(
            fsm.target(FsmEvent::ResizeStart),
            Err(TransitionError::NotResizable)
        );
    }

    #[test]
    fn cannot_start_second_operation() {
        let mut fsm = active(true);
        fsm.apply(FsmEvent::DragStart).unwrap();
        assert!(fsm.apply(FsmEvent::DragStart).is_err());
        assert!(fsm.apply(FsmEvent::ResizeStart).is_err());
        assert_eq!(fsm.state(), WindowState::Dragging);
    }

    #[test]
    fn focus_preserves_state() {
        let mut fsm = active(true);
        fsm.apply(FsmEvent::Minimize).unwrap();
        let t = fsm.apply(FsmEvent::Focus).unwrap();
        assert_eq!((t.from, t.to), (WindowState::Minimized, WindowState::Minimized));
    }

    #[test]
    fn close_from_any_live_state_then_nothing() {
        let mut fsm = active(true);
        fsm.apply(FsmEvent::DragStart).unwrap();
        assert_eq!(fsm.apply(FsmEvent::Close).unwrap().to, WindowState::Closing);
        assert!(fsm.apply(FsmEvent::Focus).is_err());
        assert!(fsm.apply(FsmEvent::Close).is_err());
        assert_eq!(fsm.apply(FsmEvent::Finalize).unwrap().to, WindowState::Closed);
        assert!(fsm.apply(FsmEvent::Minimize).is_err());
    }
}
