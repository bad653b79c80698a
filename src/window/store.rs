use std::collections::HashMap;

use crate::error::StoreError;
use crate::geometry::Geometry;
use crate::resize::ResizeEdge;

use super::{WindowId, WindowRecord};

/// Callback fired after a committed mutation of one window's record.
pub type StoreObserver = Box<dyn FnMut(&WindowRecord)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Shallow patch merged into a [`WindowRecord`]. `None` leaves a field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub resizable: Option<bool>,
    pub is_dragging: Option<bool>,
    pub is_resizing: Option<bool>,
    pub resize_handle: Option<Option<ResizeEdge>>,
}

impl WindowPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width),
            height: Some(geometry.height),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn check_finite(&self, id: &WindowId) -> Result<(), StoreError> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ];
        for (field, value) in fields {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(StoreError::NonFinite {
                    id: id.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

/// Single-field form of [`WindowPatch`] used by [`WindowStore::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowField {
    X(f64),
    Y(f64),
    Width(f64),
    Height(f64),
    Resizable(bool),
    Dragging(bool),
    Resizing(bool),
    ResizeHandle(Option<ResizeEdge>),
}

impl From<WindowField> for WindowPatch {
    fn from(field: WindowField) -> Self {
        let mut patch = WindowPatch::default();
        match field {
            WindowField::X(v) => patch.x = Some(v),
            WindowField::Y(v) => patch.y = Some(v),
            WindowField::Width(v) => patch.width = Some(v),
            WindowField::Height(v) => patch.height = Some(v),
            WindowField::Resizable(v) => patch.resizable = Some(v),
            WindowField::Dragging(v) => patch.is_dragging = Some(v),
            WindowField::Resizing(v) => patch.is_resizing = Some(v),
            WindowField::ResizeHandle(v) => patch.resize_handle = Some(v),
        }
        patch
    }
}

/// Sole owner of canonical window geometry and flags.
///
/// Every mutation goes through [`set`](Self::set) or [`update`](Self::update),
/// which clamp the size to the record's minimum and then notify the
/// observers registered for that window, synchronously and in registration
/// order.
#[derive(Default)]
pub struct WindowStore {
    windows: HashMap<WindowId, WindowRecord>,
    observers: HashMap<WindowId, Vec<(ObserverId, StoreObserver)>>,
    next_observer: u64,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut record: WindowRecord) -> Result<(), StoreError> {
        if self.windows.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        WindowPatch::geometry(record.geometry).check_finite(&record.id)?;
        if !record.min_width.is_finite() || record.min_width < 0.0 {
            return Err(StoreError::NonFinite {
                id: record.id,
                field: "min_width",
            });
        }
        if !record.min_height.is_finite() || record.min_height < 0.0 {
            return Err(StoreError::NonFinite {
                id: record.id,
                field: "min_height",
            });
        }
        record.geometry.width = record.geometry.width.max(record.min_width);
        record.geometry.height = record.geometry.height.max(record.min_height);
        self.windows.insert(record.id.clone(), record);
        Ok(())
    }

    /// Drops the record together with every observer registered for it.
    pub fn remove(&mut self, id: &WindowId) -> Option<WindowRecord> {
        self.observers.remove(id);
        self.windows.remove(id)
    }

    pub fn get(&self, id: &WindowId) -> Option<&WindowRecord> {
        self.windows.get(id)
    }

    pub fn contains(&self, id: &WindowId) -> bool {
        self.windows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &WindowId> {
        self.windows.keys()
    }

    /// Shallow-merge `patch` into the record for `id`.
    ///
    /// Non-finite coordinates reject the whole patch. Width and height are
    /// clamped to the record's minimum before the write is committed.
    pub fn set(&mut self, id: &WindowId, patch: WindowPatch) -> Result<(), StoreError> {
        let Some(record) = self.windows.get_mut(id) else {
            return Err(StoreError::UnknownWindow(id.clone()));
        };
        patch.check_finite(id)?;

        let before = record.clone();
        if let Some(x) = patch.x {
            record.geometry.x = x;
        }
        if let Some(y) = patch.y {
            record.geometry.y = y;
        }
        if let Some(width) = patch.width {
            record.geometry.width = width.max(record.min_width);
        }
        if let Some(height) = patch.height {
            record.geometry.height = height.max(record.min_height);
        }
        if let Some(resizable) = patch.resizable {
            record.resizable = resizable;
        }
        if let Some(dragging) = patch.is_dragging {
            record.is_dragging = dragging;
        }
        if let Some(resizing) = patch.is_resizing {
            record.is_resizing = resizing;
        }
        if let Some(handle) = patch.resize_handle {
            record.resize_handle = handle;
        }

        if *record == before {
            return Ok(());
        }
        if let Some(observers) = self.observers.get_mut(id) {
            for (_, observer) in observers.iter_mut() {
                observer(record);
            }
        }
        Ok(())
    }

    pub fn update(&mut self, id: &WindowId, field: WindowField) -> Result<(), StoreError> {
        self.set(id, field.into())
    }

    pub fn observe(
        &mut self,
        id: &WindowId,
        observer: impl FnMut(&WindowRecord) + 'static,
    ) -> Result<ObserverId, StoreError> {
        if !self.windows.contains_key(id) {
            return Err(StoreError::UnknownWindow(id.clone()));
        }
        let observer_id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers
            .entry(id.clone())
            .or_default()
            .push((observer_id, Box::new(observer)));
        Ok(observer_id)
    }

    pub fn unobserve(&mut self, id: &WindowId, observer: ObserverId) -> bool {
        let Some(list) = self.observers.get_mut(id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(oid, _)| *oid != observer);
        list.len() != before
    }
}
