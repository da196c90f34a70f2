//! Command-line consumer of the channel.
//!
//! `gnc-link watch` binds every stream (or a chosen subset) and prints each
//! value as one JSON line on stdout. `gnc-link send` connects, issues one
//! command and prints the reply. `gnc-link config` prints the effective
//! configuration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::binding::{bind_kind, Binding, Pipe};
use crate::command::{
    Command, ControlCommand, ControllerCommand, ProgramCommand, RuntimeSettingsPatch,
    SettingsCommand,
};
use crate::config::Config;
use crate::connection::{wait_for_handle, ActiveHandle, Connection, ConnectionState};
use crate::constants::REPLY_TIMEOUT;
use crate::schema::{Message, MessageKind, Record, Shape, SystemSettings};
use crate::service::ServiceHandle;
use crate::stream::Stream;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "gnc-link")]
#[command(version)]
#[command(about = "Realtime channel to a gnc CNC controller")]
pub struct Cli {
    /// Connection overrides.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Flags that override the loaded configuration.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Full WebSocket URL (overrides --host).
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Controller host; connects to ws://<host>:1506/ws.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Delay between reconnect attempts.
    #[arg(long, global = true)]
    pub reconnect_delay_ms: Option<u64>,
}

impl GlobalArgs {
    /// Apply the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(host) = &self.host {
            config.host.clone_from(host);
            if self.url.is_none() {
                config.url = None;
            }
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = ms;
        }
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print every stream value as a JSON line until interrupted.
    Watch {
        /// Use canned values instead of connecting.
        #[arg(long)]
        mock: bool,

        /// Streams to watch (default: all), e.g. `position,info`.
        #[arg(long, value_delimiter = ',')]
        streams: Vec<MessageKind>,
    },
    /// Send one command and print the reply.
    Send {
        /// The command.
        #[command(subcommand)]
        command: SendCommand,
    },
    /// Print the effective configuration.
    Config {
        /// Also write it to the config file.
        #[arg(long)]
        save: bool,
    },
}

/// Commands `gnc-link send` can issue.
#[derive(Debug, Subcommand)]
pub enum SendCommand {
    /// Lock or unlock the X axis.
    FreezeX {
        /// New lock state.
        #[arg(action = clap::ArgAction::Set)]
        freeze: bool,
    },
    /// Lock or unlock the Y axis.
    FreezeY {
        /// New lock state.
        #[arg(action = clap::ArgAction::Set)]
        freeze: bool,
    },
    /// Toggle slow jog.
    Slow {
        /// New slow state.
        #[arg(action = clap::ArgAction::Set)]
        slow: bool,
    },
    /// Switch the power relay.
    Power {
        /// `on` or `off`.
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// List available programs.
    Programs,
    /// Fetch a program's text.
    Load {
        /// File name.
        name: String,
    },
    /// Upload a program from a local file.
    Save {
        /// File name on the controller.
        name: String,
        /// Local G-code file.
        file: PathBuf,
    },
    /// Delete a program.
    Delete {
        /// File name.
        name: String,
    },
    /// Start a program.
    Start {
        /// File name.
        name: String,
        /// Invert the Z axis.
        #[arg(long)]
        invert_z: bool,
        /// Scale factor.
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
    },
    /// Cancel the running program.
    Cancel,
    /// Fetch system settings.
    GetSystem,
    /// Upload system settings from a JSON file.
    SetSystem {
        /// JSON file in the `systemSettings` shape (without `type`).
        file: PathBuf,
    },
    /// Fetch runtime settings.
    GetRuntime,
    /// Change runtime settings; only the given fields are sent.
    SetRuntime(RuntimePatchArgs),
}

/// Fields of `send set-runtime`.
#[derive(Debug, Args)]
pub struct RuntimePatchArgs {
    /// Program directories (repeatable).
    #[arg(long)]
    pub input_dir: Vec<String>,
    /// Process every Nth controller input.
    #[arg(long)]
    pub input_update_reduce: Option<u32>,
    /// Feed speed when a program gives none.
    #[arg(long)]
    pub default_speed: Option<f64>,
    /// Rapid move speed.
    #[arg(long)]
    pub rapid_speed: Option<f64>,
    /// Program scale factor.
    #[arg(long)]
    pub scale: Option<f64>,
    /// Invert Z for programs.
    #[arg(long)]
    pub invert_z: Option<bool>,
    /// Mirror output on the controller console.
    #[arg(long)]
    pub show_console_output: Option<bool>,
    /// Print every Nth position update on the console.
    #[arg(long)]
    pub console_pos_update_reduce: Option<u32>,
    /// Enable the external jog input.
    #[arg(long)]
    pub external_input_enabled: Option<bool>,
}

impl SendCommand {
    /// Build the wire command, reading any referenced files.
    pub fn into_command(self) -> Result<Command> {
        Ok(match self {
            Self::FreezeX { freeze } => Command::Controller(ControllerCommand::FreezeX { freeze }),
            Self::FreezeY { freeze } => Command::Controller(ControllerCommand::FreezeY { freeze }),
            Self::Slow { slow } => Command::Controller(ControllerCommand::Slow { slow }),
            Self::Power { state } => Command::Control(ControlCommand::OnOff { on: state == "on" }),
            Self::Programs => Command::Program(ProgramCommand::Get),
            Self::Load { name } => Command::Program(ProgramCommand::Load { program_name: name }),
            Self::Save { name, file } => {
                let program = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                Command::Program(ProgramCommand::Save {
                    program_name: name,
                    program,
                })
            }
            Self::Delete { name } => Command::Program(ProgramCommand::Delete { program_name: name }),
            Self::Start {
                name,
                invert_z,
                scale,
            } => Command::Program(ProgramCommand::Start {
                program_name: name,
                invert_z,
                scale,
            }),
            Self::Cancel => Command::Program(ProgramCommand::Cancel),
            Self::GetSystem => Command::Settings(SettingsCommand::GetSystem),
            Self::SetSystem { file } => {
                Command::Settings(SettingsCommand::SetSystem(read_system_settings(&file)?))
            }
            Self::GetRuntime => Command::Settings(SettingsCommand::GetRuntime),
            Self::SetRuntime(args) => {
                let patch = RuntimeSettingsPatch {
                    input_dir: (!args.input_dir.is_empty()).then_some(args.input_dir),
                    input_update_reduce: args.input_update_reduce,
                    default_speed: args.default_speed,
                    rapid_speed: args.rapid_speed,
                    scale: args.scale,
                    invert_z: args.invert_z,
                    show_console_output: args.show_console_output,
                    console_pos_update_reduce: args.console_pos_update_reduce,
                    external_input_enabled: args.external_input_enabled,
                };
                if patch.is_empty() {
                    bail!("set-runtime needs at least one field");
                }
                Command::Settings(SettingsCommand::SetRuntime(patch))
            }
        })
    }
}

/// Read and validate a system settings JSON file.
fn read_system_settings(file: &std::path::Path) -> Result<SystemSettings> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not JSON", file.display()))?;
    let record = Record::new(&raw)?;
    SystemSettings::from_record(&record)
        .with_context(|| format!("{} is not a valid system settings file", file.display()))
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    cli.global.apply(&mut config);

    match cli.command {
        CliCommand::Watch { mock, streams } => watch(&config, mock, streams).await,
        CliCommand::Send { command } => send(&config, command.into_command()?).await,
        CliCommand::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = config.save_to(&Config::config_dir()?)?;
                log::info!("Saved config to {}", path.display());
            }
            Ok(())
        }
    }
}

/// One line of `watch` output.
#[derive(Debug, Serialize)]
struct Stamped<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    message: &'a Message,
    /// Program progress, on status lines only.
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<f64>,
}

fn stamp(message: &Message) -> Option<String> {
    let progress = match message {
        Message::Status(status) => status.progress(),
        _ => None,
    };
    let line = Stamped {
        at: Utc::now(),
        message,
        progress,
    };
    match serde_json::to_string(&line) {
        Ok(line) => Some(line),
        Err(e) => {
            log::warn!("Failed to print {} value: {e}", message.kind());
            None
        }
    }
}

/// Bind `kinds` (all when empty) on `active`, printing each value.
pub fn print_streams(active: &ActiveHandle, kinds: &[MessageKind]) -> Vec<Binding> {
    let kinds = if kinds.is_empty() {
        MessageKind::ALL.to_vec()
    } else {
        kinds.to_vec()
    };
    kinds
        .into_iter()
        .map(|kind| {
            bind_kind(
                active,
                kind,
                Pipe::identity().filter_map(|m: Message| stamp(&m)),
                |line| println!("{line}"),
            )
        })
        .collect()
}

async fn watch(config: &Config, mock: bool, kinds: Vec<MessageKind>) -> Result<()> {
    if mock {
        log::info!("Watching canned mock values");
        let active: ActiveHandle = Stream::constant(Some(ServiceHandle::mock()));
        let _bindings = print_streams(&active, &kinds);
        return Ok(());
    }

    let connection = Connection::spawn(config);
    let _state = connection
        .state()
        .subscribe(|state: &ConnectionState| log::info!("Connection {state}"));
    let bindings = print_streams(&connection.active(), &kinds);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    drop(bindings);
    connection.shutdown().await;
    Ok(())
}

async fn send(config: &Config, command: Command) -> Result<()> {
    let connection = Connection::spawn(config);
    let active = connection.active();

    let handle = tokio::time::timeout(REPLY_TIMEOUT, wait_for_handle(&active))
        .await
        .ok()
        .flatten()
        .with_context(|| format!("Could not connect to {}", config.endpoint()))?;

    let Some(kind) = command.reply_kind() else {
        handle.send(&command);
        connection.shutdown().await;
        return Ok(());
    };

    let reply = request(&handle, &command, kind).await;
    connection.shutdown().await;

    let reply = reply.with_context(|| format!("No {kind} reply within {REPLY_TIMEOUT:?}"))?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

/// Send `command` and wait for the next value on the `kind` stream.
///
/// Values replayed when subscribing predate the command and are skipped.
pub async fn request(handle: &ServiceHandle, command: &Command, kind: MessageKind) -> Option<Message> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let armed = Arc::new(AtomicBool::new(false));
    let sink_armed = Arc::clone(&armed);
    let _subscription = handle.subscribe_kind(kind, move |message| {
        if sink_armed.load(Ordering::Acquire) {
            let _ = tx.send(message);
        }
    });
    armed.store(true, Ordering::Release);

    handle.send(command);
    tokio::time::timeout(REPLY_TIMEOUT, rx.recv())
        .await
        .ok()
        .flatten()
}
