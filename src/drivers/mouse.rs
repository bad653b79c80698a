use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use crate::host::{PointerEvent, PointerKind};

/// Translate a terminal mouse event into a desktop pointer sample. One cell
/// is one desktop unit. Only the left button drives windows.
pub fn pointer_event(mouse: &MouseEvent) -> Option<PointerEvent> {
    let kind = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => PointerKind::Down,
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => PointerKind::Move,
        MouseEventKind::Up(MouseButton::Left) => PointerKind::Up,
        _ => return None,
    };
    let (x, y) = (f64::from(mouse.column), f64::from(mouse.row));
    Some(match kind {
        PointerKind::Down => PointerEvent::down(x, y),
        PointerKind::Move => PointerEvent::moved(x, y),
        PointerKind::Up => PointerEvent::up(x, y),
    })
}
