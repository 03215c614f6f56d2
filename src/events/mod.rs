//! Events module for overlay clients
//!
//! Provides structured event types for badge creation, refresh and
//! removal, speaker panel changes and settings changes. Events are
//! broadcast to every subscribed IPC client.

use serde::{Deserialize, Serialize};

use crate::indicator::{DisplayMode, IndicatorMode, IndicatorStyle, RenderHandle};
use crate::panel::PanelView;
use crate::presence::ParticipantKey;

/// Events emitted while driving the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorEvent {
    /// A badge must be created above a participant
    IndicatorCreated {
        handle: RenderHandle,
        key: ParticipantKey,
        mode: DisplayMode,
        style: IndicatorStyle,
    },

    /// An existing badge changed frame, color or attachment
    IndicatorUpdated {
        handle: RenderHandle,
        style: IndicatorStyle,
    },

    /// A badge must be removed
    IndicatorDestroyed { handle: RenderHandle },

    /// Speaker panel content changed
    SpeakersChanged { panel: PanelView },

    /// Display settings changed
    SettingsChanged {
        mode: IndicatorMode,
        height: f32,
        size: f32,
    },
}

impl std::fmt::Display for IndicatorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorEvent::IndicatorCreated { handle, key, mode, .. } => {
                write!(f, "INDICATOR_CREATED ({handle} key={key} {mode})")
            }
            IndicatorEvent::IndicatorUpdated { handle, .. } => {
                write!(f, "INDICATOR_UPDATED ({handle})")
            }
            IndicatorEvent::IndicatorDestroyed { handle } => {
                write!(f, "INDICATOR_DESTROYED ({handle})")
            }
            IndicatorEvent::SpeakersChanged { panel } => {
                write!(f, "SPEAKERS_CHANGED ({} speaking)", panel.lines.len())
            }
            IndicatorEvent::SettingsChanged { mode, height, size } => {
                write!(f, "SETTINGS_CHANGED ({mode} height={height:.1} size={size:.1})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = IndicatorEvent::IndicatorDestroyed {
            handle: RenderHandle(7),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("indicator_destroyed"));
        assert!(json.contains("7"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"settings_changed","mode":"image","height":4.0,"size":1.5}"#;
        let event: IndicatorEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            IndicatorEvent::SettingsChanged {
                mode: IndicatorMode::Image,
                ..
            }
        ));
    }

    #[test]
    fn test_event_display() {
        let event = IndicatorEvent::IndicatorDestroyed {
            handle: RenderHandle(3),
        };
        assert_eq!(event.to_string(), "INDICATOR_DESTROYED (#3)");
    }
}
