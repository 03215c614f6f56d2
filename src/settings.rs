//! Persisted indicator display settings
//!
//! Settings are stored as pretty JSON next to the daemon's other data and
//! written back on every change. Persistence problems are logged and never
//! stop the overlay from working with the in-memory values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::indicator::{Appearance, IndicatorMode};

pub const MIN_HEIGHT: f32 = 1.0;
pub const MAX_HEIGHT: f32 = 10.0;
pub const MIN_SIZE: f32 = 0.5;
pub const MAX_SIZE: f32 = 5.0;

/// User-facing display settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    /// Display mode for badges
    #[serde(rename = "IndicatorMode")]
    pub mode: IndicatorMode,
    /// Height of the badge above the player's head (in units)
    #[serde(rename = "IndicatorHeight")]
    pub height: f32,
    /// Size multiplier for the badge
    #[serde(rename = "IndicatorSize")]
    pub size: f32,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            mode: IndicatorMode::Text,
            height: 4.0,
            size: 1.5,
        }
    }
}

impl IndicatorSettings {
    /// Placement values passed through to badge styles
    pub fn appearance(&self) -> Appearance {
        Appearance {
            height: self.height,
            size: self.size,
        }
    }

    /// Clamp values loaded from disk into their valid ranges
    fn sanitized(mut self) -> Self {
        self.height = clamp_height(self.height);
        self.size = clamp_size(self.size);
        self
    }
}

pub fn clamp_height(height: f32) -> f32 {
    if height.is_nan() {
        return IndicatorSettings::default().height;
    }
    height.clamp(MIN_HEIGHT, MAX_HEIGHT)
}

pub fn clamp_size(size: f32) -> f32 {
    if size.is_nan() {
        return IndicatorSettings::default().size;
    }
    size.clamp(MIN_SIZE, MAX_SIZE)
}

/// Settings plus the file they persist to
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: IndicatorSettings,
}

impl SettingsStore {
    /// Load settings from `path`, creating the file with defaults if missing
    ///
    /// An unreadable or malformed file falls back to defaults.
    pub fn open(path: &Path) -> Self {
        let settings = if path.exists() {
            match read_settings(path) {
                Ok(settings) => {
                    info!(?path, "settings loaded");
                    settings
                }
                Err(e) => {
                    error!(?path, ?e, "failed to load settings, using defaults");
                    IndicatorSettings::default()
                }
            }
        } else {
            info!(?path, "creating default settings");
            IndicatorSettings::default()
        };

        let store = Self {
            path: Some(path.to_owned()),
            settings,
        };
        if !path.exists() {
            store.persist();
        }
        store
    }

    /// Store that never touches the filesystem
    pub fn in_memory(settings: IndicatorSettings) -> Self {
        Self {
            path: None,
            settings: settings.sanitized(),
        }
    }

    pub fn get(&self) -> IndicatorSettings {
        self.settings
    }

    pub fn set_mode(&mut self, mode: IndicatorMode) {
        self.settings.mode = mode;
        self.persist();
    }

    /// Advance to the next mode in the cycle and return it
    pub fn toggle_mode(&mut self) -> IndicatorMode {
        self.set_mode(self.settings.mode.next());
        self.settings.mode
    }

    /// Set the height, clamped; returns the stored value
    pub fn set_height(&mut self, height: f32) -> f32 {
        self.settings.height = clamp_height(height);
        self.persist();
        self.settings.height
    }

    /// Set the size, clamped; returns the stored value
    pub fn set_size(&mut self, size: f32) -> f32 {
        self.settings.size = clamp_size(size);
        self.persist();
        self.settings.size
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_settings(path, &self.settings) {
            error!(?path, ?e, "failed to save settings");
        }
    }
}

fn read_settings(path: &Path) -> Result<IndicatorSettings> {
    let json = std::fs::read_to_string(path).context("failed to read settings file")?;
    let settings: IndicatorSettings =
        serde_json::from_str(&json).context("failed to parse settings file")?;
    Ok(settings.sanitized())
}

fn write_settings(path: &Path, settings: &IndicatorSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create settings directory")?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).context("failed to write settings file")?;
    Ok(())
}
