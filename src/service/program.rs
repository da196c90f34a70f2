//! Program catalog and program-command reply streams.
//!
//! `available` is a replica of the controller's catalog. Every other stream
//! is an event stream: a reply is delivered once, to whoever is listening
//! when it arrives.

use crate::schema::{
    AvailablePrograms, LoadedProgram, ProgramCancelled, ProgramDeleted, ProgramInfo,
    ProgramSaved, ProgramStarted,
};
use crate::stream::{Stream, StreamSource};

/// Write side.
#[derive(Debug)]
pub struct ProgramSources {
    pub(crate) available: StreamSource<AvailablePrograms>,
    pub(crate) loaded: StreamSource<LoadedProgram>,
    pub(crate) saved: StreamSource<ProgramSaved>,
    pub(crate) deleted: StreamSource<ProgramDeleted>,
    pub(crate) started: StreamSource<ProgramStarted>,
    pub(crate) cancelled: StreamSource<ProgramCancelled>,
}

impl ProgramSources {
    /// Fresh sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: StreamSource::latest(),
            loaded: StreamSource::event(),
            saved: StreamSource::event(),
            deleted: StreamSource::event(),
            started: StreamSource::event(),
            cancelled: StreamSource::event(),
        }
    }

    /// Read side for handles.
    #[must_use]
    pub fn streams(&self) -> ProgramStreams {
        ProgramStreams {
            available: self.available.stream(),
            loaded: self.loaded.stream(),
            saved: self.saved.stream(),
            deleted: self.deleted.stream(),
            started: self.started.stream(),
            cancelled: self.cancelled.stream(),
        }
    }
}

impl Default for ProgramSources {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side.
#[derive(Debug, Clone)]
pub struct ProgramStreams {
    /// Program catalog, latest value.
    pub available: Stream<AvailablePrograms>,
    /// Load replies.
    pub loaded: Stream<LoadedProgram>,
    /// Save replies.
    pub saved: Stream<ProgramSaved>,
    /// Delete replies.
    pub deleted: Stream<ProgramDeleted>,
    /// Start acknowledgements.
    pub started: Stream<ProgramStarted>,
    /// Cancel replies.
    pub cancelled: Stream<ProgramCancelled>,
}

impl ProgramStreams {
    /// A one-program catalog; every reply stream replays a success.
    ///
    /// Unlike the live handle, the reply streams here are latest-value:
    /// each subscriber gets the canned reply on subscribe, without sending
    /// a command first. Consumers that count replies per request see one
    /// extra value under the mock.
    #[must_use]
    pub fn mock() -> Self {
        let name = "demo.ngc".to_string();
        Self {
            available: Stream::constant(AvailablePrograms {
                progs: vec![ProgramInfo {
                    name: name.clone(),
                    path: "./gcode".to_string(),
                    size: 96,
                    lines_of_code: 4,
                    create_date_ts: 1_600_000_000,
                    modified_date_ts: 1_600_000_000,
                }],
                input_dir: vec!["./gcode".to_string()],
            }),
            loaded: Stream::constant(LoadedProgram {
                program_name: name.clone(),
                program: "G0 X0 Y0 Z5\nG1 Z0\nG1 X10 Y10\nG0 Z5\n".to_string(),
                invert_z: false,
                scale: 1.0,
            }),
            saved: Stream::constant(ProgramSaved {
                program_name: name.clone(),
                ok: true,
            }),
            deleted: Stream::constant(ProgramDeleted {
                program_name: name.clone(),
                ok: true,
            }),
            started: Stream::constant(ProgramStarted { program_name: name }),
            cancelled: Stream::constant(ProgramCancelled { ok: true }),
        }
    }
}
