//! Application-wide constants for gnc-link.
//!
//! Centralizes wire constants and timing values so the lifecycle, router
//! and CLI agree on them.
//!
//! # Categories
//!
//! - **Endpoint**: where the controller serves its WebSocket
//! - **Timing**: reconnect delay and CLI reply timeout
//! - **Streams**: retained history sizes

use std::time::Duration;

// ============================================================================
// Endpoint
// ============================================================================

/// TCP port the controller's web UI listens on.
pub const DEFAULT_PORT: u16 = 1506;

/// Host-relative path of the realtime channel.
pub const WS_PATH: &str = "/ws";

/// Host used when neither config nor CLI name one.
pub const DEFAULT_HOST: &str = "localhost";

// ============================================================================
// Timing
// ============================================================================

/// Fixed delay between a connection closing and the next attempt.
///
/// No backoff and no retry limit.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// How long `gnc-link send` waits for the reply to its command.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Streams
// ============================================================================

/// Number of info/warning/error messages replayed to late subscribers.
pub const INFO_HISTORY_LEN: usize = 25;
