//! Edge and corner resizing: the pure geometry calculation, the handle
//! hit-targets, and the manager that binds both to live windows.

mod engine;
mod handles;
mod manager;

pub use engine::{ResizeConstraints, ResizeEdge, ResizeOutcome, ResizeStart, compute_resize};
pub use handles::{HandleSet, ResizeHandle, handles_for_geometry};
pub use manager::{ResizeManager, ResizeStats};
