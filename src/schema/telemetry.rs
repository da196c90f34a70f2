//! Machine telemetry broadcast by the controller without being asked.

use serde::Serialize;

use super::validate::{Invalid, Record, Schema, Shape};

/// Current tool position in machine coordinates (mm).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    /// X axis.
    pub x: f64,
    /// Y axis.
    pub y: f64,
    /// Z axis.
    pub z: f64,
}

impl Shape for Position {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            x: record.number("x")?,
            y: record.number("y")?,
            z: record.number("z")?,
        })
    }
}

impl Schema for Position {
    const TAGS: &'static [&'static str] = &["position"];
}

/// Operating mode reported in [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Jogging by hand.
    Manual,
    /// Running a loaded program.
    Program,
    /// Homing / calibration.
    Calibrate,
}

const MODES: &[(&str, Mode)] = &[
    ("manual", Mode::Manual),
    ("program", Mode::Program),
    ("calibrate", Mode::Calibrate),
];

/// Machine status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Operating mode.
    pub mode: Mode,
    /// Controller runs against mock motors.
    pub dev_mode: bool,
    /// A motion is in progress.
    pub in_opp: bool,
    /// Name of the running program, if any.
    pub current_prog: Option<String>,
    /// Axes have been calibrated since power-on.
    pub calibrated: bool,
    /// Total steps of the current program.
    pub steps_todo: i64,
    /// Steps executed so far.
    pub steps_done: i64,
    /// Spindle/power relay state, on controllers that report it.
    pub is_switched_on: Option<bool>,
}

impl Shape for Status {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            mode: record.one_of("mode", MODES)?,
            dev_mode: record.boolean("devMode")?,
            in_opp: record.boolean("inOpp")?,
            current_prog: record.optional("currentProg", Record::string)?,
            calibrated: record.boolean("calibrated")?,
            steps_todo: record.integer("stepsTodo")?,
            steps_done: record.integer("stepsDone")?,
            is_switched_on: record.optional("isSwitchedOn", Record::boolean)?,
        })
    }
}

impl Schema for Status {
    const TAGS: &'static [&'static str] = &["status"];
}

impl Status {
    /// Progress of the running program in `0.0..=1.0`, `None` when idle.
    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        if self.steps_todo <= 0 {
            return None;
        }
        Some((self.steps_done as f64 / self.steps_todo as f64).clamp(0.0, 1.0))
    }
}

/// Severity of an [`Info`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InfoLevel {
    /// Informational.
    Info,
    /// Something the operator should look at.
    Warning,
    /// An operation failed.
    Error,
}

const LEVELS: &[(&str, InfoLevel)] = &[
    ("info", InfoLevel::Info),
    ("warning", InfoLevel::Warning),
    ("error", InfoLevel::Error),
];

/// Free-form log line from the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    /// Severity.
    pub lvl: InfoLevel,
    /// Text.
    pub message: String,
}

impl Shape for Info {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            lvl: record.one_of("lvl", LEVELS)?,
            message: record.string("message")?,
        })
    }
}

impl Schema for Info {
    const TAGS: &'static [&'static str] = &["info"];
}

/// Greeting sent once per connection. `id` reappears as `to` on every
/// reply envelope addressed to this client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connected {
    /// Client id assigned by the controller.
    pub id: String,
}

impl Shape for Connected {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            id: record.string("id")?,
        })
    }
}

impl Schema for Connected {
    const TAGS: &'static [&'static str] = &["connected"];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_exact_fields() {
        let raw = json!({ "type": "position", "x": 10.1, "y": -15.6, "z": 42.1 });
        let pos = Position::validate(&raw).unwrap();
        assert_eq!(pos, Position { x: 10.1, y: -15.6, z: 42.1 });
    }

    #[test]
    fn test_position_ignores_extra_fields() {
        let raw = json!({ "type": "position", "x": 1, "y": 2, "z": 3, "feed": 400 });
        assert!(Position::matches(&raw));
    }

    #[test]
    fn test_position_rejects_string_coordinate() {
        let raw = json!({ "type": "position", "x": "1", "y": 2, "z": 3 });
        assert!(!Position::matches(&raw));
    }

    #[test]
    fn test_status_optional_fields() {
        let raw = json!({
            "type": "status",
            "mode": "program",
            "devMode": false,
            "inOpp": true,
            "currentProg": null,
            "calibrated": true,
            "stepsTodo": 200,
            "stepsDone": 50
        });
        let status = Status::validate(&raw).unwrap();
        assert_eq!(status.mode, Mode::Program);
        assert_eq!(status.current_prog, None);
        assert_eq!(status.is_switched_on, None);
        assert_eq!(status.progress(), Some(0.25));
    }

    #[test]
    fn test_status_rejects_unknown_mode() {
        let raw = json!({
            "type": "status",
            "mode": "turbo",
            "devMode": false,
            "inOpp": false,
            "calibrated": false,
            "stepsTodo": 0,
            "stepsDone": 0
        });
        assert!(!Status::matches(&raw));
    }

    #[test]
    fn test_status_missing_required_field() {
        let raw = json!({
            "type": "status",
            "mode": "manual",
            "devMode": false,
            "inOpp": false,
            "calibrated": false,
            "stepsTodo": 0
        });
        let err = Status::validate(&raw).unwrap_err();
        assert_eq!(err.path, "stepsDone");
    }

    #[test]
    fn test_info_levels() {
        let raw = json!({ "type": "info", "lvl": "warning", "message": "z endstop" });
        let info = Info::validate(&raw).unwrap();
        assert_eq!(info.lvl, InfoLevel::Warning);
        assert_eq!(info.message, "z endstop");
    }

    #[test]
    fn test_wrong_discriminant_rejected() {
        let raw = json!({ "type": "controller", "x": 1, "y": 2, "z": 3 });
        let err = Position::validate(&raw).unwrap_err();
        assert!(err.is_tag_mismatch());
    }
}
