use crate::constants::{
    DEFAULT_HANDLE_THICKNESS, DEFAULT_MIN_HEIGHT, DEFAULT_MIN_WIDTH, DEFAULT_TITLE_BAR_HEIGHT,
    DEFAULT_WORKSPACE_HEIGHT, DEFAULT_WORKSPACE_WIDTH,
};
use crate::error::ConfigError;
use crate::geometry::Size;

/// Desktop-wide settings fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DesktopConfig {
    /// Minimum size applied to windows whose spec does not set one.
    pub min_width: f64,
    pub min_height: f64,
    pub handle_thickness: f64,
    pub title_bar_height: f64,
    /// Area a maximized window fills.
    pub workspace: Size,
    /// Mirror published events to a broadcast channel once one is attached.
    pub broadcast: bool,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
            handle_thickness: DEFAULT_HANDLE_THICKNESS,
            title_bar_height: DEFAULT_TITLE_BAR_HEIGHT,
            workspace: Size::new(DEFAULT_WORKSPACE_WIDTH, DEFAULT_WORKSPACE_HEIGHT),
            broadcast: false,
        }
    }
}

impl DesktopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("min_width", self.min_width)?;
        positive("min_height", self.min_height)?;
        positive("handle_thickness", self.handle_thickness)?;
        non_negative("title_bar_height", self.title_bar_height)?;
        positive("workspace.width", self.workspace.width)?;
        positive("workspace.height", self.workspace.height)?;
        if self.workspace.width < self.min_width || self.workspace.height < self.min_height {
            return Err(ConfigError::Invalid {
                field: "workspace",
                reason: "at least the minimum window size",
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "a finite number greater than zero",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "a finite number, zero or more",
        })
    }
}
