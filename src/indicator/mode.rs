//! Display mode selection with image-to-text fallback

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Display mode as configured by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorMode {
    /// No badges at all
    None,
    /// Animated "is talking..." text
    #[default]
    Text,
    /// Icon sprite
    Image,
}

impl IndicatorMode {
    /// Next mode in the toggle cycle: None -> Text -> Image -> None
    pub fn next(self) -> Self {
        match self {
            IndicatorMode::None => IndicatorMode::Text,
            IndicatorMode::Text => IndicatorMode::Image,
            IndicatorMode::Image => IndicatorMode::None,
        }
    }
}

impl std::fmt::Display for IndicatorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorMode::None => write!(f, "Off"),
            IndicatorMode::Text => write!(f, "Text"),
            IndicatorMode::Image => write!(f, "Image"),
        }
    }
}

/// Mode a badge is actually rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Text,
    Image,
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Text => write!(f, "Text"),
            DisplayMode::Image => write!(f, "Image"),
        }
    }
}

/// Resolves the configured mode against image asset availability
#[derive(Debug)]
pub struct ModePolicy {
    image_available: bool,
    fallback_logged: bool,
}

impl ModePolicy {
    /// `image_available` is decided once, at startup
    pub fn new(image_available: bool) -> Self {
        Self {
            image_available,
            fallback_logged: false,
        }
    }

    pub fn image_available(&self) -> bool {
        self.image_available
    }

    /// Effective mode for `configured`; `None` means no badges
    pub fn effective(&mut self, configured: IndicatorMode) -> Option<DisplayMode> {
        match configured {
            IndicatorMode::None => None,
            IndicatorMode::Text => Some(DisplayMode::Text),
            IndicatorMode::Image if self.image_available => Some(DisplayMode::Image),
            IndicatorMode::Image => {
                if !self.fallback_logged {
                    warn!("voice indicator image not loaded, falling back to text mode");
                    self.fallback_logged = true;
                }
                Some(DisplayMode::Text)
            }
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Check that the indicator image exists and is a PNG
///
/// Failures are logged and reported as unavailable.
pub fn probe_image_asset(path: &Path) -> bool {
    match std::fs::read(path) {
        Ok(bytes) if bytes.starts_with(&PNG_SIGNATURE) => {
            debug!(?path, bytes = bytes.len(), "voice indicator image loaded");
            true
        }
        Ok(_) => {
            error!(?path, "failed to load voice indicator image: not a PNG");
            false
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(?path, "voice indicator image not found");
            false
        }
        Err(e) => {
            error!(?path, ?e, "error loading voice indicator image");
            false
        }
    }
}
