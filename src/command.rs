//! Outbound operator commands.
//!
//! A [`Command`] serializes to exactly one JSON object per frame, shaped
//! `{"cmd": <family>, "action": <verb>, ...fields}`. Commands carry no
//! correlation id: the controller answers with a `reply` whose payload kind
//! identifies the family, and the last request of a family wins.

use serde::Serialize;

use crate::schema::{MessageKind, SystemSettings};

/// Operator intent, tagged by command family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    /// Jog controller toggles.
    Controller(ControllerCommand),
    /// Machine power.
    Control(ControlCommand),
    /// Program catalog and execution.
    Program(ProgramCommand),
    /// System and runtime settings.
    Settings(SettingsCommand),
}

/// `cmd: "controller"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControllerCommand {
    /// Lock or unlock the X axis.
    FreezeX {
        /// New lock state.
        freeze: bool,
    },
    /// Lock or unlock the Y axis.
    FreezeY {
        /// New lock state.
        freeze: bool,
    },
    /// Toggle slow jog.
    Slow {
        /// New slow state.
        slow: bool,
    },
}

/// `cmd: "control"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlCommand {
    /// Switch the power relay.
    OnOff {
        /// Desired relay state.
        on: bool,
    },
}

/// `cmd: "program"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProgramCommand {
    /// Request the program catalog.
    Get,
    /// Fetch one program's text.
    Load {
        /// File name.
        program_name: String,
    },
    /// Write a program.
    Save {
        /// File name.
        program_name: String,
        /// Full G-code text.
        program: String,
    },
    /// Remove a program.
    Delete {
        /// File name.
        program_name: String,
    },
    /// Run a program.
    Start {
        /// File name.
        program_name: String,
        /// Invert the Z axis.
        invert_z: bool,
        /// Scale factor.
        scale: f64,
    },
    /// Stop the running program.
    Cancel,
}

/// `cmd: "settings"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SettingsCommand {
    /// Request the system settings.
    GetSystem,
    /// Persist new system settings (fields flattened into the frame).
    SetSystem(SystemSettings),
    /// Request the runtime settings.
    GetRuntime,
    /// Apply runtime settings; absent fields are left unchanged.
    SetRuntime(RuntimeSettingsPatch),
}

/// Partial runtime settings for [`SettingsCommand::SetRuntime`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs, reason = "mirrors RuntimeSettings field by field")]
pub struct RuntimeSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_update_reduce: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rapid_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert_z: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_console_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_pos_update_reduce: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_input_enabled: Option<bool>,
}

impl RuntimeSettingsPatch {
    /// True when no field would be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Command {
    /// Serialize to the wire frame.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Stream on which the controller answers this command.
    ///
    /// `None` for controller and control commands: their effect only shows
    /// up in the next periodic `controller` or `status` broadcast.
    #[must_use]
    pub fn reply_kind(&self) -> Option<MessageKind> {
        match self {
            Self::Controller(_) | Self::Control(_) => None,
            Self::Program(cmd) => Some(match cmd {
                ProgramCommand::Get => MessageKind::AvailablePrograms,
                ProgramCommand::Load { .. } => MessageKind::ProgramLoaded,
                ProgramCommand::Save { .. } => MessageKind::ProgramSaved,
                ProgramCommand::Delete { .. } => MessageKind::ProgramDeleted,
                ProgramCommand::Start { .. } => MessageKind::ProgramStarted,
                ProgramCommand::Cancel => MessageKind::ProgramCancelled,
            }),
            Self::Settings(cmd) => Some(match cmd {
                SettingsCommand::GetSystem => MessageKind::SystemSettings,
                SettingsCommand::SetSystem(_) => MessageKind::SystemSettingsSaved,
                SettingsCommand::GetRuntime => MessageKind::RuntimeSettings,
                SettingsCommand::SetRuntime(_) => MessageKind::RuntimeSettingsSaved,
            }),
        }
    }
}

/// Anything that can put a command on the wire.
///
/// Implementations never block and never queue across connections. A
/// command sent while no connection is open is discarded.
pub trait CommandSink: Send + Sync + std::fmt::Debug {
    /// Transmit `command`, or discard it if the transport is gone.
    fn send(&self, command: &Command);
}
