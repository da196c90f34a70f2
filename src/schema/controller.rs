//! Jog controller state.

use serde::Serialize;

use super::validate::{Invalid, Record, Schema, Shape};

/// Jog target and axis locks of the manual controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    /// X jog input.
    pub x: f64,
    /// Y jog input.
    pub y: f64,
    /// Z jog input.
    pub z: f64,
    /// X axis frozen.
    pub freeze_x: bool,
    /// Y axis frozen.
    pub freeze_y: bool,
    /// Slow jog mode.
    pub slow: bool,
}

impl Shape for ControllerState {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            x: record.number("x")?,
            y: record.number("y")?,
            z: record.number("z")?,
            freeze_x: record.boolean("freezeX")?,
            freeze_y: record.boolean("freezeY")?,
            slow: record.boolean("slow")?,
        })
    }
}

impl Schema for ControllerState {
    const TAGS: &'static [&'static str] = &["controller"];
}
