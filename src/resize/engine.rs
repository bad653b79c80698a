use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeEdge {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    /// Corners first so hit-testing prefers them where they overlap edges.
    pub const ALL: [ResizeEdge; 8] = [
        ResizeEdge::TopLeft,
        ResizeEdge::TopRight,
        ResizeEdge::BottomLeft,
        ResizeEdge::BottomRight,
        ResizeEdge::Top,
        ResizeEdge::Bottom,
        ResizeEdge::Left,
        ResizeEdge::Right,
    ];

    pub fn owns_left(self) -> bool {
        matches!(
            self,
            ResizeEdge::Left | ResizeEdge::TopLeft | ResizeEdge::BottomLeft
        )
    }

    pub fn owns_right(self) -> bool {
        matches!(
            self,
            ResizeEdge::Right | ResizeEdge::TopRight | ResizeEdge::BottomRight
        )
    }

    pub fn owns_top(self) -> bool {
        matches!(
            self,
            ResizeEdge::Top | ResizeEdge::TopLeft | ResizeEdge::TopRight
        )
    }

    pub fn owns_bottom(self) -> bool {
        matches!(
            self,
            ResizeEdge::Bottom | ResizeEdge::BottomLeft | ResizeEdge::BottomRight
        )
    }

    pub fn is_corner(self) -> bool {
        (self.owns_left() || self.owns_right()) && (self.owns_top() || self.owns_bottom())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeEdge::Left => "left",
            ResizeEdge::Right => "right",
            ResizeEdge::Top => "top",
            ResizeEdge::Bottom => "bottom",
            ResizeEdge::TopLeft => "top-left",
            ResizeEdge::TopRight => "top-right",
            ResizeEdge::BottomLeft => "bottom-left",
            ResizeEdge::BottomRight => "bottom-right",
        }
    }
}

/// Pointer and geometry captured when a resize gesture begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeStart {
    pub start_x: f64,
    pub start_y: f64,
    pub start_width: f64,
    pub start_height: f64,
    pub start_left: f64,
    pub start_top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeConstraints {
    pub min_width: f64,
    pub min_height: f64,
    pub max_width: f64,
    pub max_height: f64,
}

impl ResizeConstraints {
    pub fn min(min_width: f64, min_height: f64) -> Self {
        Self {
            min_width,
            min_height,
            max_width: f64::INFINITY,
            max_height: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOutcome {
    pub new_width: f64,
    pub new_height: f64,
    pub new_x: f64,
    pub new_y: f64,
    pub changed_x: bool,
    pub changed_y: bool,
}

/// The minimum wins if a caller passes `min > max`.
fn clamp_dimension(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Compute the geometry produced by dragging `edge` to `pointer`.
///
/// Sizes are clamped before the origin shift is derived, so a left or top
/// edge that hits its minimum stops moving instead of pushing the opposite
/// edge. Edges not owned by `edge` keep their start values.
pub fn compute_resize(
    edge: ResizeEdge,
    pointer: Point,
    start: &ResizeStart,
    constraints: &ResizeConstraints,
) -> ResizeOutcome {
    let mut dx = pointer.x - start.start_x;
    let mut dy = pointer.y - start.start_y;
    if !dx.is_finite() {
        dx = 0.0;
    }
    if !dy.is_finite() {
        dy = 0.0;
    }

    let mut width = start.start_width;
    let mut height = start.start_height;
    if edge.owns_right() {
        width += dx;
    } else if edge.owns_left() {
        width -= dx;
    }
    if edge.owns_bottom() {
        height += dy;
    } else if edge.owns_top() {
        height -= dy;
    }

    let new_width = clamp_dimension(width, constraints.min_width, constraints.max_width);
    let new_height = clamp_dimension(height, constraints.min_height, constraints.max_height);

    let new_x = if edge.owns_left() {
        start.start_left + (start.start_width - new_width)
    } else {
        start.start_left
    };
    let new_y = if edge.owns_top() {
        start.start_top + (start.start_height - new_height)
    } else {
        start.start_top
    };

    ResizeOutcome {
        new_width,
        new_height,
        new_x,
        new_y,
        changed_x: new_x != start.start_left,
        changed_y: new_y != start.start_top,
    }
}
