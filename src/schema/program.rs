//! Program catalog and program-command reply payloads.
//!
//! All of these except the catalog refresh arrive inside a `reply`
//! envelope; the catalog can also arrive unsolicited as `progsUpdate`.

use serde::Serialize;

use super::validate::{Invalid, Record, Schema, Shape};

/// One program file in the controller's input directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    /// File name.
    pub name: String,
    /// Directory the file lives in.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Number of G-code lines.
    pub lines_of_code: u64,
    /// Creation time, seconds since the Unix epoch.
    pub create_date_ts: u64,
    /// Last modification time, seconds since the Unix epoch.
    pub modified_date_ts: u64,
}

impl Shape for ProgramInfo {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            name: record.string("name")?,
            path: record.string("path")?,
            size: record.unsigned("size")?,
            lines_of_code: record.unsigned("linesOfCode")?,
            create_date_ts: record.unsigned("createDateTs")?,
            modified_date_ts: record.unsigned("modifiedDateTs")?,
        })
    }
}

/// Program catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailablePrograms {
    /// Programs found.
    pub progs: Vec<ProgramInfo>,
    /// Directories that were scanned.
    pub input_dir: Vec<String>,
}

impl Shape for AvailablePrograms {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            progs: record.shapes("progs")?,
            input_dir: record.strings("inputDir")?,
        })
    }
}

impl Schema for AvailablePrograms {
    const TAGS: &'static [&'static str] = &["availablePrograms", "WsAvailableProgramsMessage"];
}

/// Unsolicited catalog refresh; same payload as [`AvailablePrograms`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramsUpdate(pub AvailablePrograms);

impl Shape for ProgramsUpdate {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        AvailablePrograms::from_record(record).map(Self)
    }
}

impl Schema for ProgramsUpdate {
    const TAGS: &'static [&'static str] = &["progsUpdate"];
}

/// Program text returned by a load request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedProgram {
    /// File name.
    pub program_name: String,
    /// Full G-code text.
    pub program: String,
    /// Z axis inverted when the program was last run.
    pub invert_z: bool,
    /// Scale factor when the program was last run.
    pub scale: f64,
}

impl Shape for LoadedProgram {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            program_name: record.string("programName")?,
            program: record.string("program")?,
            invert_z: record.boolean("invertZ")?,
            scale: record.number("scale")?,
        })
    }
}

impl Schema for LoadedProgram {
    const TAGS: &'static [&'static str] = &["loadProgram"];
}

/// Outcome of a save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSaved {
    /// File name.
    pub program_name: String,
    /// Whether the file was written.
    pub ok: bool,
}

impl Shape for ProgramSaved {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            program_name: record.string("programName")?,
            ok: record.boolean("ok")?,
        })
    }
}

impl Schema for ProgramSaved {
    const TAGS: &'static [&'static str] = &["saveProgram"];
}

/// Outcome of a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDeleted {
    /// File name.
    pub program_name: String,
    /// Whether the file was removed.
    pub ok: bool,
}

impl Shape for ProgramDeleted {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            program_name: record.string("programName")?,
            ok: record.boolean("ok")?,
        })
    }
}

impl Schema for ProgramDeleted {
    const TAGS: &'static [&'static str] = &["deleteProgram"];
}

/// Acknowledgement that a program started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStarted {
    /// File name.
    pub program_name: String,
}

impl Shape for ProgramStarted {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            program_name: record.string("programName")?,
        })
    }
}

impl Schema for ProgramStarted {
    const TAGS: &'static [&'static str] = &["startProgram"];
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramCancelled {
    /// Whether a running program was stopped.
    pub ok: bool,
}

impl Shape for ProgramCancelled {
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
        Ok(Self {
            ok: record.boolean("ok")?,
        })
    }
}

impl Schema for ProgramCancelled {
    const TAGS: &'static [&'static str] = &["cancelProgram"];
}
