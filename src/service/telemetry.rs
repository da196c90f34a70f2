//! Telemetry streams: position, status, session and the info log.

use crate::schema::{Connected, Info, InfoLevel, Mode, Position, Status};
use crate::stream::{Stream, StreamSource};

/// Write side, owned by the router of one connection.
#[derive(Debug)]
pub struct TelemetrySources {
    pub(crate) position: StreamSource<Position>,
    pub(crate) status: StreamSource<Status>,
    pub(crate) session: StreamSource<Connected>,
    pub(crate) info: StreamSource<Info>,
}

impl TelemetrySources {
    /// Fresh sources; `info_history` values of the info log are replayed.
    #[must_use]
    pub fn new(info_history: usize) -> Self {
        Self {
            position: StreamSource::latest(),
            status: StreamSource::latest(),
            session: StreamSource::latest(),
            info: StreamSource::history(info_history),
        }
    }

    /// Read side for handles.
    #[must_use]
    pub fn streams(&self) -> TelemetryStreams {
        TelemetryStreams {
            position: self.position.stream(),
            status: self.status.stream(),
            session: self.session.stream(),
            info: self.info.stream(),
        }
    }
}

/// Read side of the telemetry set.
#[derive(Debug, Clone)]
pub struct TelemetryStreams {
    /// Tool position, latest value.
    pub position: Stream<Position>,
    /// Machine status, latest value.
    pub status: Stream<Status>,
    /// Client id announced on connect, latest value.
    pub session: Stream<Connected>,
    /// Controller log, last N replayed.
    pub info: Stream<Info>,
}

impl TelemetryStreams {
    /// Canned values for offline use.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            position: Stream::constant(Position {
                x: 10.1,
                y: -15.6,
                z: 42.1,
            }),
            status: Stream::constant(Status {
                mode: Mode::Manual,
                dev_mode: false,
                in_opp: false,
                current_prog: None,
                calibrated: false,
                steps_todo: 1,
                steps_done: 0,
                is_switched_on: None,
            }),
            session: Stream::constant(Connected {
                id: "mock".to_string(),
            }),
            info: Stream::constant(Info {
                lvl: InfoLevel::Warning,
                message: "testMessage".to_string(),
            }),
        }
    }
}
