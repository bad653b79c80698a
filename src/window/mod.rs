mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH};
use crate::geometry::Geometry;
use crate::resize::ResizeEdge;

pub use store::{ObserverId, StoreObserver, WindowField, WindowPatch, WindowStore};

/// Stable identity of one simulated application window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WindowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Canonical per-window state held by the [`WindowStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub plugin_id: String,
    pub title: Option<String>,
    pub geometry: Geometry,
    pub min_width: f64,
    pub min_height: f64,
    pub resizable: bool,
    pub is_dragging: bool,
    pub is_resizing: bool,
    pub resize_handle: Option<ResizeEdge>,
}

impl WindowRecord {
    pub fn new(id: WindowId, spec: &WindowSpec) -> Self {
        Self {
            id,
            plugin_id: spec.plugin_id.clone(),
            title: spec.title.clone(),
            geometry: spec.geometry,
            min_width: spec.min_width,
            min_height: spec.min_height,
            resizable: spec.resizable,
            is_dragging: false,
            is_resizing: false,
            resize_handle: None,
        }
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.plugin_id)
    }
}

/// Launch parameters for a new window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    /// Explicit id; when absent the desktop derives one from the plugin id.
    pub id: Option<WindowId>,
    pub plugin_id: String,
    pub title: Option<String>,
    pub geometry: Geometry,
    pub min_width: f64,
    pub min_height: f64,
    pub resizable: bool,
}

impl WindowSpec {
    pub fn new(plugin_id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: None,
            plugin_id: plugin_id.into(),
            title: None,
            geometry,
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            resizable: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<WindowId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_min_size(mut self, min_width: f64, min_height: f64) -> Self {
        self.min_width = min_width;
        self.min_height = min_height;
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}
