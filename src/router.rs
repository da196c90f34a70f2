//! Channel router: one inbound frame in, at most one stream emission out.
//!
//! The router owns the write side of every stream of one connection. Each
//! text frame is parsed, run through the schema registry and published on
//! the stream of its kind. A frame that does not parse or matches no schema
//! is dropped with a debug log. Nothing here can close the connection.

use std::sync::Arc;

use serde_json::Value;

use crate::command::CommandSink;
use crate::schema::{self, MessageKind};
use crate::service::{ServiceHandle, ServiceSources};

/// Demultiplexer for one connection.
#[derive(Debug)]
pub struct Router {
    sources: ServiceSources,
}

impl Router {
    /// Router with fresh, empty streams.
    #[must_use]
    pub fn new(info_history: usize) -> Self {
        Self {
            sources: ServiceSources::new(info_history),
        }
    }

    /// Live handle reading this router's streams and sending via `sender`.
    #[must_use]
    pub fn handle(&self, sender: Arc<dyn CommandSink>) -> ServiceHandle {
        ServiceHandle::live(&self.sources, sender)
    }

    /// Route one text frame. Returns the stream that received it.
    pub fn route(&self, frame: &str) -> Option<MessageKind> {
        let raw: Value = match serde_json::from_str(frame) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("[Router] Dropping unparseable frame: {e}");
                return None;
            }
        };
        self.route_value(&raw)
    }

    /// Route an already-parsed frame.
    pub fn route_value(&self, raw: &Value) -> Option<MessageKind> {
        match schema::validate(raw) {
            Ok(message) => {
                let kind = self.sources.publish(message);
                log::trace!("[Router] -> {kind}");
                Some(kind)
            }
            Err(e) => {
                log::debug!("[Router] Dropping frame ({e}): {raw}");
                None
            }
        }
    }
}
