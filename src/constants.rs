//! Shared crate-wide constants.

/// Minimum width a window may shrink to unless its spec overrides it.
pub const DEFAULT_MIN_WIDTH: f64 = 200.0;

/// Minimum height a window may shrink to unless its spec overrides it.
pub const DEFAULT_MIN_HEIGHT: f64 = 150.0;

/// Thickness of the invisible hit-targets laid along each window edge.
///
/// Corners use a square of this size; edge handles span the remaining
/// length between the corners.
pub const DEFAULT_HANDLE_THICKNESS: f64 = 8.0;

/// Height of the title region that starts a drag on pointer-down.
pub const DEFAULT_TITLE_BAR_HEIGHT: f64 = 32.0;

pub const DEFAULT_WORKSPACE_WIDTH: f64 = 1280.0;
pub const DEFAULT_WORKSPACE_HEIGHT: f64 = 800.0;

/// Weight kept from the previous average when smoothing frame latency.
///
/// The new sample contributes `1.0 - LATENCY_SMOOTHING`.
pub const LATENCY_SMOOTHING: f64 = 0.9;

/// Sizes reported by a size observer within this many pixels of the stored
/// size are treated as unchanged.
pub const SIZE_EPSILON: f64 = 0.5;
