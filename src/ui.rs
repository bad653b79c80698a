//! Draws a [`Desktop`] into a ratatui frame, one cell per desktop unit.
//!
//! Windows may sit partly or fully off-screen, so every rect is clipped to
//! the frame before anything is rendered.

use indoc::indoc;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::desktop::Desktop;
use crate::fsm::WindowState;
use crate::geometry::Geometry;

pub const HELP: &str = indoc! {"
    drag a title bar to move, drag an edge or corner to resize
    n new  w close  m minimize  r restore  x maximize
    +/- grow or shrink content  q quit
"};

/// Clip desktop geometry to `area`. `None` when nothing is visible.
pub fn clip_to_area(geometry: Geometry, area: Rect) -> Option<Rect> {
    if !geometry.is_finite() {
        return None;
    }
    let left = geometry.x.floor().max(f64::from(area.x));
    let top = geometry.y.floor().max(f64::from(area.y));
    let right = geometry.right().ceil().min(f64::from(area.right()));
    let bottom = geometry.bottom().ceil().min(f64::from(area.bottom()));
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

pub fn render_desktop(frame: &mut Frame<'_>, desktop: &Desktop, status: &str) {
    let full = frame.area();
    let status_height = 1.min(full.height);
    let area = Rect::new(full.x, full.y, full.width, full.height - status_height);
    let focused = desktop.focused().cloned();

    for record in desktop.stacked() {
        let Some(rect) = clip_to_area(record.geometry, area) else {
            continue;
        };
        let is_focused = focused.as_ref() == Some(&record.id);
        let border = match desktop.state(&record.id) {
            Some(WindowState::Dragging) => Style::default().fg(Color::Yellow),
            Some(WindowState::Resizing) => Style::default().fg(Color::Magenta),
            _ if is_focused => Style::default().fg(Color::Cyan),
            _ => Style::default().fg(Color::DarkGray),
        };
        let mut title = Style::default();
        if is_focused {
            title = title.add_modifier(Modifier::BOLD);
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Line::styled(format!(" {} ", record.title_or_default()), title));
        let body = Paragraph::new(format!(
            "{}x{} @ {},{}",
            record.geometry.width, record.geometry.height, record.geometry.x, record.geometry.y
        ))
        .block(block);
        frame.render_widget(Clear, rect);
        frame.render_widget(body, rect);

        let handle_style = Style::default().bg(Color::Blue);
        for handle in desktop.visible_handles(&record.id) {
            if let Some(cell) = clip_to_area(handle.rect, area) {
                frame.buffer_mut().set_style(cell, handle_style);
            }
        }
    }

    if status_height > 0 {
        let line = Rect::new(full.x, full.bottom() - 1, full.width, 1);
        frame.render_widget(
            Paragraph::new(status).style(Style::default().add_modifier(Modifier::REVERSED)),
            line,
        );
    }
}
