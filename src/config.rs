//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "VOICE_PRESENCE_DATA_DIR";

/// Image shown by badges in image mode
pub const INDICATOR_IMAGE_FILE: &str = "voice-indicator.png";

/// Cadences of the reconciliation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Interval between reconciliation ticks
    pub tick_interval: Duration,
    /// Minimum age of the roster snapshot before it is re-enumerated
    pub snapshot_refresh: Duration,
    /// How long an inactive presence record is kept
    pub grace_window: Duration,
    /// Time each "is talking" frame stays on screen
    pub frame_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            snapshot_refresh: Duration::from_secs(2),
            grace_window: Duration::from_secs(5),
            frame_interval: Duration::from_millis(500),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted display settings
    pub settings_path: PathBuf,

    /// Badge image used in image mode
    pub image_path: PathBuf,

    pub timing: Timing,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("voice-presence")
            }
        };

        Ok(Self::in_dir(data_dir))
    }

    /// Configuration rooted at `data_dir`
    pub fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            socket_path: data_dir.join("daemon.sock"),
            settings_path: data_dir.join("settings.json"),
            image_path: data_dir.join(INDICATOR_IMAGE_FILE),
            data_dir,
            timing: Timing::default(),
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).context("failed to create data directory")?;
        Ok(())
    }
}
