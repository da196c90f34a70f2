//! Service composition: the handle consumers program against.
//!
//! A [`ServiceHandle`] bundles the four per-feature stream sets with a
//! [`CommandSink`]. Two flavours share the same type:
//!
//! - **live**: streams fed by the router of one open connection, commands
//!   written to that connection's socket
//! - **mock**: every stream replays a canned value, commands are dropped
//!
//! A live handle is only valid for the lifetime of its connection. When the
//! connection closes, its sources are dropped with the router and its sender
//! starts discarding; the lifecycle publishes a fresh handle on reconnect.

pub mod controller;
pub mod program;
pub mod settings;
pub mod telemetry;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::command::{Command, CommandSink};
use crate::schema::{Message, MessageKind};
use crate::stream::Subscription;

pub use controller::{ControllerSources, ControllerStreams};
pub use program::{ProgramSources, ProgramStreams};
pub use settings::{SettingsSources, SettingsStreams};
pub use telemetry::{TelemetrySources, TelemetryStreams};

/// Write side of every stream of one connection.
#[derive(Debug)]
pub struct ServiceSources {
    /// Telemetry set.
    pub telemetry: TelemetrySources,
    /// Controller set.
    pub controller: ControllerSources,
    /// Program set.
    pub program: ProgramSources,
    /// Settings set.
    pub settings: SettingsSources,
}

impl ServiceSources {
    /// Fresh, empty sources.
    #[must_use]
    pub fn new(info_history: usize) -> Self {
        Self {
            telemetry: TelemetrySources::new(info_history),
            controller: ControllerSources::new(),
            program: ProgramSources::new(),
            settings: SettingsSources::new(),
        }
    }

    /// Emit `message` on the one stream of its kind.
    pub fn publish(&self, message: Message) -> MessageKind {
        let kind = message.kind();
        match message {
            Message::Position(v) => self.telemetry.position.emit(v),
            Message::Status(v) => self.telemetry.status.emit(v),
            Message::Session(v) => self.telemetry.session.emit(v),
            Message::Info(v) => self.telemetry.info.emit(v),
            Message::Controller(v) => self.controller.controller.emit(v),
            Message::AvailablePrograms(v) => self.program.available.emit(v),
            Message::ProgramLoaded(v) => self.program.loaded.emit(v),
            Message::ProgramSaved(v) => self.program.saved.emit(v),
            Message::ProgramDeleted(v) => self.program.deleted.emit(v),
            Message::ProgramStarted(v) => self.program.started.emit(v),
            Message::ProgramCancelled(v) => self.program.cancelled.emit(v),
            Message::SystemSettings(v) => self.settings.system.emit(v),
            Message::SystemSettingsSaved(v) => self.settings.system_saved.emit(v),
            Message::RuntimeSettings(v) => self.settings.runtime.emit(v),
            Message::RuntimeSettingsSaved(v) => self.settings.runtime_saved.emit(v),
        }
        kind
    }
}

/// Commands of a live handle go into the connection task's outbound queue.
#[derive(Debug)]
pub(crate) struct LiveSender {
    tx: mpsc::UnboundedSender<String>,
}

impl LiveSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl CommandSink for LiveSender {
    fn send(&self, command: &Command) {
        let frame = match command.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Failed to encode command {:?}: {e}", command);
                return;
            }
        };
        if self.tx.send(frame).is_err() {
            log::debug!("Connection closed, discarding command {:?}", command);
        }
    }
}

/// Sink of the mock handle.
#[derive(Debug)]
struct NullSender;

impl CommandSink for NullSender {
    fn send(&self, command: &Command) {
        log::debug!("Mock handle ignoring command {:?}", command);
    }
}

/// Everything a consumer needs: streams plus a way to send commands.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    /// Position, status, session, info log.
    pub telemetry: TelemetryStreams,
    /// Jog controller state.
    pub controller: ControllerStreams,
    /// Program catalog and replies.
    pub program: ProgramStreams,
    /// Settings replicas and outcomes.
    pub settings: SettingsStreams,
    sender: Arc<dyn CommandSink>,
    mock: bool,
}

impl ServiceHandle {
    /// Handle over `sources`, sending through `sender`.
    #[must_use]
    pub fn live(sources: &ServiceSources, sender: Arc<dyn CommandSink>) -> Self {
        Self {
            telemetry: sources.telemetry.streams(),
            controller: sources.controller.streams(),
            program: sources.program.streams(),
            settings: sources.settings.streams(),
            sender,
            mock: false,
        }
    }

    /// Canned handle. Every stream replays one value; commands go nowhere.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            telemetry: TelemetryStreams::mock(),
            controller: ControllerStreams::mock(),
            program: ProgramStreams::mock(),
            settings: SettingsStreams::mock(),
            sender: Arc::new(NullSender),
            mock: true,
        }
    }

    /// True for [`ServiceHandle::mock`] handles.
    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// Send `command` on this handle's connection.
    pub fn send(&self, command: &Command) {
        self.sender.send(command);
    }

    /// Subscribe to the stream of `kind`, receiving values wrapped as
    /// [`Message`]s. Used by consumers that treat streams uniformly.
    pub fn subscribe_kind<F>(&self, kind: MessageKind, mut sink: F) -> Subscription
    where
        F: FnMut(Message) + Send + 'static,
    {
        macro_rules! forward {
            ($stream:expr, $variant:path) => {
                $stream.subscribe(move |v| sink($variant(v.clone())))
            };
        }
        match kind {
            MessageKind::Position => forward!(self.telemetry.position, Message::Position),
            MessageKind::Status => forward!(self.telemetry.status, Message::Status),
            MessageKind::Session => forward!(self.telemetry.session, Message::Session),
            MessageKind::Info => forward!(self.telemetry.info, Message::Info),
            MessageKind::Controller => {
                forward!(self.controller.controller, Message::Controller)
            }
            MessageKind::AvailablePrograms => {
                forward!(self.program.available, Message::AvailablePrograms)
            }
            MessageKind::ProgramLoaded => forward!(self.program.loaded, Message::ProgramLoaded),
            MessageKind::ProgramSaved => forward!(self.program.saved, Message::ProgramSaved),
            MessageKind::ProgramDeleted => forward!(self.program.deleted, Message::ProgramDeleted),
            MessageKind::ProgramStarted => forward!(self.program.started, Message::ProgramStarted),
            MessageKind::ProgramCancelled => {
                forward!(self.program.cancelled, Message::ProgramCancelled)
            }
            MessageKind::SystemSettings => forward!(self.settings.system, Message::SystemSettings),
            MessageKind::SystemSettingsSaved => {
                forward!(self.settings.system_saved, Message::SystemSettingsSaved)
            }
            MessageKind::RuntimeSettings => {
                forward!(self.settings.runtime, Message::RuntimeSettings)
            }
            MessageKind::RuntimeSettingsSaved => {
                forward!(self.settings.runtime_saved, Message::RuntimeSettingsSaved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProgramCommand;
    use crate::schema::{Position, ProgramStarted};
    use crate::stream::Discipline;
    use std::sync::Mutex;

    #[test]
    fn test_stream_disciplines_per_set() {
        let sources = ServiceSources::new(25);
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ServiceHandle::live(&sources, Arc::new(LiveSender::new(tx)));

        assert_eq!(handle.telemetry.position.discipline(), Discipline::Latest);
        assert_eq!(handle.telemetry.session.discipline(), Discipline::Latest);
        assert_eq!(handle.telemetry.info.discipline(), Discipline::History(25));
        assert_eq!(handle.controller.controller.discipline(), Discipline::Latest);
        assert_eq!(handle.program.available.discipline(), Discipline::Latest);
        assert_eq!(handle.program.loaded.discipline(), Discipline::Event);
        assert_eq!(handle.program.cancelled.discipline(), Discipline::Event);
        assert_eq!(handle.settings.runtime.discipline(), Discipline::Latest);
        assert_eq!(handle.settings.system_saved.discipline(), Discipline::Event);
        assert!(!handle.is_mock());
    }

    #[test]
    fn test_publish_reaches_only_its_stream() {
        let sources = ServiceSources::new(25);
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ServiceHandle::live(&sources, Arc::new(LiveSender::new(tx)));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = MessageKind::ALL
            .into_iter()
            .map(|kind| {
                let seen = Arc::clone(&seen);
                handle.subscribe_kind(kind, move |msg| seen.lock().unwrap().push(msg.kind()))
            })
            .collect();

        let kind = sources.publish(Message::ProgramStarted(ProgramStarted {
            program_name: "demo.ngc".to_string(),
        }));
        assert_eq!(kind, MessageKind::ProgramStarted);
        assert_eq!(*seen.lock().unwrap(), vec![MessageKind::ProgramStarted]);
        drop(subs);
    }

    #[test]
    fn test_live_sender_writes_frames() {
        let sources = ServiceSources::new(25);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ServiceHandle::live(&sources, Arc::new(LiveSender::new(tx)));

        handle.send(&Command::Program(ProgramCommand::Get));
        assert_eq!(
            rx.try_recv().unwrap(),
            r#"{"cmd":"program","action":"get"}"#
        );
    }

    #[test]
    fn test_send_after_close_is_discarded() {
        let sources = ServiceSources::new(25);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ServiceHandle::live(&sources, Arc::new(LiveSender::new(tx)));
        drop(rx);
        handle.send(&Command::Program(ProgramCommand::Cancel));
    }

    #[test]
    fn test_mock_replays_canned_values_to_every_subscriber() {
        let mock = ServiceHandle::mock();
        assert!(mock.is_mock());
        for _ in 0..2 {
            let seen = Arc::new(Mutex::new(None));
            let sink = Arc::clone(&seen);
            let _sub = mock
                .telemetry
                .position
                .subscribe(move |p: &Position| *sink.lock().unwrap() = Some(p.clone()));
            assert_eq!(
                *seen.lock().unwrap(),
                Some(Position {
                    x: 10.1,
                    y: -15.6,
                    z: 42.1
                })
            );
        }
        mock.send(&Command::Program(ProgramCommand::Cancel));
    }

    #[test]
    fn test_mock_covers_every_kind() {
        let mock = ServiceHandle::mock();
        for kind in MessageKind::ALL {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let _sub = mock.subscribe_kind(kind, move |msg| sink.lock().unwrap().push(msg.kind()));
            assert_eq!(*seen.lock().unwrap(), vec![kind], "{kind}");
        }
    }

    #[test]
    fn test_mock_reply_streams_replay_instead_of_eventing() {
        let mock = ServiceHandle::mock();
        assert_eq!(mock.program.started.discipline(), Discipline::Latest);
        assert_eq!(mock.settings.system_saved.discipline(), Discipline::Latest);

        // A subscriber that never sent a command still sees a reply.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = mock
            .program
            .started
            .subscribe(move |s: &ProgramStarted| sink.lock().unwrap().push(s.program_name.clone()));
        assert_eq!(*seen.lock().unwrap(), vec!["demo.ngc".to_string()]);
    }
}
