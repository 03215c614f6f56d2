//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::commands::{CommandOutcome, HotkeyAction};
use crate::events::IndicatorEvent;
use crate::presence::ParticipantKey;
use crate::roster::{EntityHandle, EntityInfo, Position};
use crate::service::EngineStatus;

/// Requests from the game host or overlay to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// A participant started or stopped talking
    SetActive { key: ParticipantKey, active: bool },

    /// Chat message that may be a `/voice` command
    Command { text: String },

    /// Decoded key press
    Hotkey { action: HotkeyAction },

    /// Add or refresh a live entity
    UpsertEntity { entity: EntityInfo },

    /// Entity despawned
    RemoveEntity { key: ParticipantKey },

    /// Local viewer moved; `None` when there is no camera
    SetViewer { position: Option<Position> },

    /// Switch the connection to push notifications
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Request applied, nothing to report
    Ok,

    /// Lines to echo back in chat; `handled` is false for ordinary chat
    CommandResult {
        handled: bool,
        lines: Vec<String>,
        settings_changed: bool,
    },

    /// Entity stored under this handle
    EntityStored { handle: EntityHandle },

    /// Whether the entity existed
    EntityRemoved { removed: bool },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Reply to a command or hotkey; `None` means nothing was done
    pub fn command_result(outcome: Option<CommandOutcome>) -> Self {
        match outcome {
            Some(outcome) => Response::CommandResult {
                handled: true,
                lines: outcome.lines,
                settings_changed: outcome.changed,
            },
            None => Response::CommandResult {
                handled: false,
                lines: Vec::new(),
                settings_changed: false,
            },
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Badge or panel event
    Indicator { event: IndicatorEvent },
    /// Events were dropped because the client fell behind
    Lagged { skipped: u64 },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    #[serde(flatten)]
    pub engine: EngineStatus,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            engine: EngineStatus::default(),
        }
    }
}
