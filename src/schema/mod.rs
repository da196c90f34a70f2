//! Message schema registry.
//!
//! Every inbound frame is a JSON object tagged by its `type` field. This
//! module defines one typed record per kind, a validator per kind
//! ([`Schema::validate`] / [`Schema::matches`]) and the registry entry
//! point [`validate`] that the router runs on each frame.
//!
//! # Registry order
//!
//! Top-level kinds are tried in a fixed order: state replicas first
//! (`position`, `status`, `controller`), then `info`, then `connected` and
//! the program catalog (`progsUpdate`, or a bare `availablePrograms`), and
//! the `reply` envelope last. A `reply` is validated as
//! an envelope first and then dispatched on the inner `msg.type`, because
//! program and settings replies share the envelope and diverge only there.
//!
//! Validation never panics and never partially accepts: a frame that
//! misses one expected field is rejected as a whole.

pub mod controller;
pub mod program;
pub mod settings;
pub mod telemetry;
pub mod validate;

use serde::Serialize;
use serde_json::Value;

pub use controller::ControllerState;
pub use program::{
    AvailablePrograms, LoadedProgram, ProgramCancelled, ProgramDeleted, ProgramInfo,
    ProgramSaved, ProgramStarted, ProgramsUpdate,
};
pub use settings::{
    DriverSettings, MotorSettings, RuntimeSettings, RuntimeSettingsSaved, StepperDriver,
    SystemSettings, SystemSettingsSaved,
};
pub use telemetry::{Connected, Info, InfoLevel, Mode, Position, Status};
pub use validate::{Invalid, Reason, Record, Schema, Shape};

/// A validated inbound message, tagged by the stream it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "msg", rename_all = "camelCase")]
pub enum Message {
    /// Tool position.
    Position(Position),
    /// Machine status.
    Status(Status),
    /// Jog controller state.
    Controller(ControllerState),
    /// Controller log line.
    Info(Info),
    /// Per-connection greeting.
    Session(Connected),
    /// Program catalog, solicited or not.
    AvailablePrograms(AvailablePrograms),
    /// Reply to a load request.
    ProgramLoaded(LoadedProgram),
    /// Reply to a save request.
    ProgramSaved(ProgramSaved),
    /// Reply to a delete request.
    ProgramDeleted(ProgramDeleted),
    /// Reply to a start request.
    ProgramStarted(ProgramStarted),
    /// Reply to a cancel request.
    ProgramCancelled(ProgramCancelled),
    /// Reply to `getSystem`.
    SystemSettings(SystemSettings),
    /// Reply to `setSystem`.
    SystemSettingsSaved(SystemSettingsSaved),
    /// Reply to `getRuntime`.
    RuntimeSettings(RuntimeSettings),
    /// Reply to `setRuntime`.
    RuntimeSettingsSaved(RuntimeSettingsSaved),
}

/// Names every per-kind stream. One variant per [`Message`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// `telemetry.position`
    Position,
    /// `telemetry.status`
    Status,
    /// `controller.controller`
    Controller,
    /// `telemetry.info`
    Info,
    /// `telemetry.session`
    Session,
    /// `program.available`
    AvailablePrograms,
    /// `program.loaded`
    ProgramLoaded,
    /// `program.saved`
    ProgramSaved,
    /// `program.deleted`
    ProgramDeleted,
    /// `program.started`
    ProgramStarted,
    /// `program.cancelled`
    ProgramCancelled,
    /// `settings.system`
    SystemSettings,
    /// `settings.system_saved`
    SystemSettingsSaved,
    /// `settings.runtime`
    RuntimeSettings,
    /// `settings.runtime_saved`
    RuntimeSettingsSaved,
}

impl MessageKind {
    /// Every kind, in registry order.
    pub const ALL: [Self; 15] = [
        Self::Position,
        Self::Status,
        Self::Controller,
        Self::Info,
        Self::Session,
        Self::AvailablePrograms,
        Self::ProgramLoaded,
        Self::ProgramSaved,
        Self::ProgramDeleted,
        Self::ProgramStarted,
        Self::ProgramCancelled,
        Self::SystemSettings,
        Self::SystemSettingsSaved,
        Self::RuntimeSettings,
        Self::RuntimeSettingsSaved,
    ];

    /// Stable name used in logs and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Status => "status",
            Self::Controller => "controller",
            Self::Info => "info",
            Self::Session => "session",
            Self::AvailablePrograms => "available-programs",
            Self::ProgramLoaded => "program-loaded",
            Self::ProgramSaved => "program-saved",
            Self::ProgramDeleted => "program-deleted",
            Self::ProgramStarted => "program-started",
            Self::ProgramCancelled => "program-cancelled",
            Self::SystemSettings => "system-settings",
            Self::SystemSettingsSaved => "system-settings-saved",
            Self::RuntimeSettings => "runtime-settings",
            Self::RuntimeSettingsSaved => "runtime-settings-saved",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown stream '{s}'"))
    }
}

impl Message {
    /// The stream this message is published on.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Position(_) => MessageKind::Position,
            Self::Status(_) => MessageKind::Status,
            Self::Controller(_) => MessageKind::Controller,
            Self::Info(_) => MessageKind::Info,
            Self::Session(_) => MessageKind::Session,
            Self::AvailablePrograms(_) => MessageKind::AvailablePrograms,
            Self::ProgramLoaded(_) => MessageKind::ProgramLoaded,
            Self::ProgramSaved(_) => MessageKind::ProgramSaved,
            Self::ProgramDeleted(_) => MessageKind::ProgramDeleted,
            Self::ProgramStarted(_) => MessageKind::ProgramStarted,
            Self::ProgramCancelled(_) => MessageKind::ProgramCancelled,
            Self::SystemSettings(_) => MessageKind::SystemSettings,
            Self::SystemSettingsSaved(_) => MessageKind::SystemSettingsSaved,
            Self::RuntimeSettings(_) => MessageKind::RuntimeSettings,
            Self::RuntimeSettingsSaved(_) => MessageKind::RuntimeSettingsSaved,
        }
    }
}

/// Validated `reply` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Client id the reply is addressed to (see [`Connected`]).
    pub to: String,
    /// Unwrapped payload.
    pub msg: Message,
}

type Validator = fn(&Value) -> Result<Message, Invalid>;

fn check<S: Schema>(raw: &Value, wrap: fn(S) -> Message) -> Result<Message, Invalid> {
    S::validate(raw).map(wrap)
}

/// Top-level kinds, in priority order. `reply` is handled after these.
const TOP_LEVEL: [Validator; 7] = [
    |raw| check(raw, Message::Position),
    |raw| check(raw, Message::Status),
    |raw| check(raw, Message::Controller),
    |raw| check(raw, Message::Info),
    |raw| check(raw, Message::Session),
    |raw| check(raw, |update: ProgramsUpdate| Message::AvailablePrograms(update.0)),
    |raw| check(raw, Message::AvailablePrograms),
];

/// Payload kinds that may appear inside a `reply` envelope.
const REPLY_PAYLOADS: [Validator; 10] = [
    |raw| check(raw, Message::AvailablePrograms),
    |raw| check(raw, Message::ProgramLoaded),
    |raw| check(raw, Message::ProgramSaved),
    |raw| check(raw, Message::ProgramDeleted),
    |raw| check(raw, Message::ProgramStarted),
    |raw| check(raw, Message::ProgramCancelled),
    |raw| check(raw, Message::SystemSettings),
    |raw| check(raw, Message::SystemSettingsSaved),
    |raw| check(raw, Message::RuntimeSettings),
    |raw| check(raw, Message::RuntimeSettingsSaved),
];

/// Run `validators` in order and return the first match.
///
/// When nothing matches, the error of the validator that recognised the
/// discriminant (and then failed on a field) is returned, otherwise an
/// unknown-kind error.
fn first_match(raw: &Value, validators: &[Validator]) -> Result<Message, Invalid> {
    let mut field_error = None;
    for validator in validators {
        match validator(raw) {
            Ok(msg) => return Ok(msg),
            Err(e) if e.is_tag_mismatch() => {}
            Err(e) => {
                field_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = field_error {
        return Err(e);
    }
    let found = raw.get("type").and_then(Value::as_str).unwrap_or_default();
    Err(Invalid::unknown_kind("type", found))
}

/// Validate a `reply` envelope and its payload.
pub fn validate_reply(raw: &Value) -> Result<Reply, Invalid> {
    let record = Record::new(raw)?;
    record.tag("type", &["reply"])?;
    let to = record.string("to")?;
    let inner = record.get("msg").ok_or_else(|| Invalid {
        path: "msg".to_string(),
        reason: Reason::Missing,
    })?;
    let msg = first_match(inner, &REPLY_PAYLOADS).map_err(|mut e| {
        e.path = if e.path.is_empty() {
            "msg".to_string()
        } else {
            format!("msg.{}", e.path)
        };
        e
    })?;
    Ok(Reply { to, msg })
}

/// Registry entry point: validate one parsed frame.
///
/// Returns the typed message (reply payloads unwrapped) or why it was
/// rejected.
pub fn validate(raw: &Value) -> Result<Message, Invalid> {
    match first_match(raw, &TOP_LEVEL) {
        Ok(msg) => Ok(msg),
        Err(e) if matches!(e.reason, Reason::UnknownKind { .. }) => {
            validate_reply(raw).map(|reply| reply.msg).map_err(|reply_err| {
                if reply_err.is_tag_mismatch() {
                    e
                } else {
                    reply_err
                }
            })
        }
        Err(e) => Err(e),
    }
}
