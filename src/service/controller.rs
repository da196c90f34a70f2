//! Jog controller stream.

use crate::schema::ControllerState;
use crate::stream::{Stream, StreamSource};

/// Write side.
#[derive(Debug)]
pub struct ControllerSources {
    pub(crate) controller: StreamSource<ControllerState>,
}

impl ControllerSources {
    /// Fresh, empty source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            controller: StreamSource::latest(),
        }
    }

    /// Read side for handles.
    #[must_use]
    pub fn streams(&self) -> ControllerStreams {
        ControllerStreams {
            controller: self.controller.stream(),
        }
    }
}

impl Default for ControllerSources {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side.
#[derive(Debug, Clone)]
pub struct ControllerStreams {
    /// Jog state, latest value.
    pub controller: Stream<ControllerState>,
}

impl ControllerStreams {
    /// Idle controller with nothing frozen.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            controller: Stream::constant(ControllerState {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                freeze_x: false,
                freeze_y: false,
                slow: false,
            }),
        }
    }
}
