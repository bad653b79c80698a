use crate::geometry::{Geometry, Point};
use crate::window::WindowId;

use super::ResizeEdge;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeHandle {
    pub edge: ResizeEdge,
    pub rect: Geometry,
}

/// Lay out the eight hit-targets just inside `rect`.
///
/// Corners are `thickness` squares; edges fill the span between them and are
/// omitted when the window is too small to leave any span.
pub fn handles_for_geometry(rect: Geometry, thickness: f64) -> Vec<ResizeHandle> {
    let mut handles = Vec::with_capacity(8);
    if rect.width <= 0.0 || rect.height <= 0.0 || thickness <= 0.0 {
        return handles;
    }
    let t_x = thickness.min(rect.width / 2.0);
    let t_y = thickness.min(rect.height / 2.0);
    let right = rect.right() - t_x;
    let bottom = rect.bottom() - t_y;
    let span_w = rect.width - 2.0 * t_x;
    let span_h = rect.height - 2.0 * t_y;

    for edge in ResizeEdge::ALL {
        let r = match edge {
            ResizeEdge::TopLeft => Geometry::new(rect.x, rect.y, t_x, t_y),
            ResizeEdge::TopRight => Geometry::new(right, rect.y, t_x, t_y),
            ResizeEdge::BottomLeft => Geometry::new(rect.x, bottom, t_x, t_y),
            ResizeEdge::BottomRight => Geometry::new(right, bottom, t_x, t_y),
            ResizeEdge::Top if span_w > 0.0 => Geometry::new(rect.x + t_x, rect.y, span_w, t_y),
            ResizeEdge::Bottom if span_w > 0.0 => Geometry::new(rect.x + t_x, bottom, span_w, t_y),
            ResizeEdge::Left if span_h > 0.0 => Geometry::new(rect.x, rect.y + t_y, t_x, span_h),
            ResizeEdge::Right if span_h > 0.0 => Geometry::new(right, rect.y + t_y, t_x, span_h),
            _ => continue,
        };
        handles.push(ResizeHandle { edge, rect: r });
    }
    handles
}

/// Per-window hit-target set owned by the resize manager.
///
/// Rects are derived from the store's geometry at hit-test time, so the set
/// only tracks identity and visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSet {
    pub window: WindowId,
    hovered: bool,
    resizing: bool,
}

impl HandleSet {
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            hovered: false,
            resizing: false,
        }
    }

    pub fn visible(&self) -> bool {
        self.hovered || self.resizing
    }

    pub fn hovered(&self) -> bool {
        self.hovered
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    pub fn set_resizing(&mut self, resizing: bool) {
        self.resizing = resizing;
    }

    pub fn hit_test(&self, rect: Geometry, thickness: f64, point: Point) -> Option<ResizeEdge> {
        handles_for_geometry(rect, thickness)
            .into_iter()
            .find(|handle| handle.rect.contains(point))
            .map(|handle| handle.edge)
    }
}
