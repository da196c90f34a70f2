//! gnc-link - typed realtime channel between a CNC controller and its
//! dashboard.
//!
//! One WebSocket connection carries JSON frames both ways. Inbound frames
//! are validated, demultiplexed into per-kind streams and exposed through a
//! [`ServiceHandle`] together with a command sender. A mock handle with
//! canned values has the same type as the live one.
//!
//! # Architecture
//!
//! - **Schema** - typed messages and their validators
//! - **Stream** - multicast primitive with latest / event / history delivery
//! - **Router** - frame in, one stream emission out
//! - **Service** - per-feature stream sets composed into a handle
//! - **Binding** - subscriptions that follow the active handle
//! - **Connection** - socket ownership and fixed-delay reconnects
//!
//! # Modules
//!
//! - [`schema`] - message registry
//! - [`command`] - outbound commands
//! - [`connection`] - lifecycle and the active handle
//! - [`config`] - configuration loading/saving

pub mod binding;
pub mod cli;
pub mod command;
pub mod config;
pub mod connection;
pub mod constants;
pub mod router;
pub mod schema;
pub mod service;
pub mod stream;
pub mod ws;

// Re-export commonly used types
pub use binding::{bind, bind_kind, Binding, Pipe};
pub use command::{Command, CommandSink};
pub use config::Config;
pub use connection::{ActiveHandle, Connection, ConnectionState};
pub use schema::{Message, MessageKind};
pub use service::ServiceHandle;
pub use stream::{Stream, StreamSource, Subscription};
