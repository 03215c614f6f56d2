//! voice-presence: reconciles live voice activity into per-player
//! "is talking" indicators
//!
//! Voice start/stop reports feed a [`presence::PresenceRegistry`]; on a fixed
//! cadence the [`engine::PresenceEngine`] resolves active speakers against the
//! roster and creates, updates or destroys one indicator per speaker through a
//! [`indicator::Renderer`]. The daemon binary hosts the engine behind a Unix
//! socket.

pub mod commands;
pub mod config;
pub mod engine;
pub mod events;
pub mod indicator;
pub mod ipc;
pub mod lifecycle;
pub mod panel;
pub mod presence;
pub mod roster;
pub mod service;
pub mod settings;

pub use engine::PresenceEngine;
pub use indicator::{Renderer, RenderError};
pub use presence::ParticipantKey;
pub use roster::Roster;
