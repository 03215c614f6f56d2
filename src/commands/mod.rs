//! Command surface for indicator settings
//!
//! Chat messages starting with `/voice` are parsed into commands and
//! applied to the settings store. Hotkeys map onto the same settings.
//! Whenever an outcome reports `changed`, the caller must invalidate all
//! indicators so they are rebuilt with the new settings.

mod hotkeys;

use crate::indicator::IndicatorMode;
use crate::settings::{SettingsStore, MAX_HEIGHT, MAX_SIZE, MIN_HEIGHT, MIN_SIZE};

pub use hotkeys::{HotkeyAction, HotkeyHandler, HEIGHT_STEP, TOGGLE_COOLDOWN};

/// A parsed `/voice` command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    Help,
    ToggleMode,
    SetMode(IndicatorMode),
    ShowHeight,
    SetHeight(f32),
    AdjustHeight(f32),
    ShowSize,
    SetSize(f32),
    AdjustSize(f32),
}

/// Invalid command arguments
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid mode '{0}'. Use: off, text, or image")]
    InvalidMode(String),

    #[error("Invalid height value '{0}'. Use a number between 1.0 and 10.0")]
    InvalidHeight(String),

    #[error("Invalid size value '{0}'. Use a number between 0.5 and 5.0")]
    InvalidSize(String),
}

/// Result of applying a command: chat lines to show and whether settings changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub lines: Vec<String>,
    pub changed: bool,
}

impl CommandOutcome {
    fn message(line: String, changed: bool) -> Self {
        Self {
            lines: vec![line],
            changed,
        }
    }
}

/// Parse a chat message
///
/// Returns `None` when the message is not a `/voice` command and should be
/// sent on as normal chat.
pub fn parse(message: &str) -> Option<Result<VoiceCommand, CommandError>> {
    let mut parts = message.split_whitespace();
    if !parts.next()?.eq_ignore_ascii_case("/voice") {
        return None;
    }

    let Some(sub) = parts.next() else {
        return Some(Ok(VoiceCommand::Help));
    };
    let arg = parts.next();

    let command = match sub.to_ascii_lowercase().as_str() {
        "mode" => match arg {
            None => Ok(VoiceCommand::ToggleMode),
            Some(arg) => parse_mode(arg).map(VoiceCommand::SetMode),
        },
        "height" => match arg {
            None => Ok(VoiceCommand::ShowHeight),
            Some(arg) => parse_value(arg, VoiceCommand::SetHeight, VoiceCommand::AdjustHeight)
                .ok_or_else(|| CommandError::InvalidHeight(arg.to_string())),
        },
        "size" => match arg {
            None => Ok(VoiceCommand::ShowSize),
            Some(arg) => parse_value(arg, VoiceCommand::SetSize, VoiceCommand::AdjustSize)
                .ok_or_else(|| CommandError::InvalidSize(arg.to_string())),
        },
        _ => Ok(VoiceCommand::Help),
    };
    Some(command)
}

fn parse_mode(arg: &str) -> Result<IndicatorMode, CommandError> {
    match arg.to_ascii_lowercase().as_str() {
        "off" | "none" | "0" => Ok(IndicatorMode::None),
        "text" | "1" => Ok(IndicatorMode::Text),
        "image" | "icon" | "2" => Ok(IndicatorMode::Image),
        _ => Err(CommandError::InvalidMode(arg.to_string())),
    }
}

/// Signed values are relative adjustments, unsigned ones absolute
fn parse_value(
    arg: &str,
    absolute: fn(f32) -> VoiceCommand,
    relative: fn(f32) -> VoiceCommand,
) -> Option<VoiceCommand> {
    let value: f32 = arg.parse().ok().filter(|v: &f32| v.is_finite())?;
    if arg.starts_with('+') || arg.starts_with('-') {
        Some(relative(value))
    } else {
        Some(absolute(value))
    }
}

/// Apply `command` to the settings store
pub fn apply(command: VoiceCommand, store: &mut SettingsStore) -> CommandOutcome {
    match command {
        VoiceCommand::Help => CommandOutcome {
            lines: help_lines(store),
            changed: false,
        },
        VoiceCommand::ToggleMode => {
            let mode = store.toggle_mode();
            CommandOutcome::message(format!("Voice indicator mode: {mode}"), true)
        }
        VoiceCommand::SetMode(mode) => {
            store.set_mode(mode);
            CommandOutcome::message(format!("Voice indicator mode set to: {mode}"), true)
        }
        VoiceCommand::ShowHeight => CommandOutcome::message(
            format!(
                "Current height: {:.1} (range: {MIN_HEIGHT:.1} - {MAX_HEIGHT:.1})",
                store.get().height
            ),
            false,
        ),
        VoiceCommand::SetHeight(height) => {
            let height = store.set_height(height);
            CommandOutcome::message(format!("Indicator height set to: {height:.1}"), true)
        }
        VoiceCommand::AdjustHeight(delta) => {
            let height = store.set_height(store.get().height + delta);
            CommandOutcome::message(format!("Indicator height: {height:.1}"), true)
        }
        VoiceCommand::ShowSize => CommandOutcome::message(
            format!(
                "Current size: {:.1} (range: {MIN_SIZE:.1} - {MAX_SIZE:.1})",
                store.get().size
            ),
            false,
        ),
        VoiceCommand::SetSize(size) => {
            let size = store.set_size(size);
            CommandOutcome::message(format!("Indicator size set to: {size:.1}"), true)
        }
        VoiceCommand::AdjustSize(delta) => {
            let size = store.set_size(store.get().size + delta);
            CommandOutcome::message(format!("Indicator size: {size:.1}"), true)
        }
    }
}

/// Parse and apply a chat message in one step
///
/// Returns `None` for ordinary chat. Parse errors become a single error line.
pub fn handle_message(message: &str, store: &mut SettingsStore) -> Option<CommandOutcome> {
    match parse(message)? {
        Ok(command) => Some(apply(command, store)),
        Err(e) => Some(CommandOutcome::message(e.to_string(), false)),
    }
}

fn help_lines(store: &SettingsStore) -> Vec<String> {
    let settings = store.get();
    vec![
        "=== Voice Indicator Commands ===".to_string(),
        "/voice mode [off|text|image] - Set display mode".to_string(),
        format!("/voice height [value] - Set height ({MIN_HEIGHT:.1}-{MAX_HEIGHT:.1})"),
        format!("/voice size [value] - Set size ({MIN_SIZE:.1}-{MAX_SIZE:.1})"),
        "/voice help - Show this help".to_string(),
        format!(
            "Current: Mode={}, Height={:.1}, Size={:.1}",
            settings.mode, settings.height, settings.size
        ),
    ]
}
