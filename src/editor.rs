use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub code: String,
}

impl MenuOption {
    pub fn new(label: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            width: right - left,
            height: bottom - top,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub position: Option<Position>,
    pub bounding_box: Option<BoundingBox>,
}

/// Live queries against the editor rendering the graph. Both hooks are
/// advisory: callers log and drop their errors.
pub trait Editor {
    /// Options currently offered by the dropdown widget of `field` on `block_id`.
    fn field_options(
        &self,
        _block_id: &str,
        _field: &str,
        _current: &str,
    ) -> Result<Option<Vec<MenuOption>>> {
        Ok(None)
    }

    fn geometry(&self, _block_id: &str) -> Result<Option<Geometry>> {
        Ok(None)
    }
}

/// No editor attached: every query falls back to project state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Editor for Headless {}
