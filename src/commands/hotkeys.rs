//! Hotkey actions for the overlay
//!
//! Key presses arrive from the host over IPC already decoded into actions.
//! Mode toggling is rate limited so a held key does not cycle every frame.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CommandOutcome;
use crate::settings::SettingsStore;

/// Minimum time between two accepted mode toggles
pub const TOGGLE_COOLDOWN: Duration = Duration::from_millis(500);

/// Height change per raise/lower press
pub const HEIGHT_STEP: f32 = 0.1;

/// Prefix on every hotkey notification
const NOTIFICATION_PREFIX: &str = "[Voice Indicator]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    /// Cycle Text -> Image -> Off
    ToggleMode,
    RaiseHeight,
    LowerHeight,
}

/// Applies hotkey actions to the settings store
#[derive(Debug, Default)]
pub struct HotkeyHandler {
    last_toggle: Option<Instant>,
}

impl HotkeyHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one key press at `now`
    ///
    /// Returns `None` when the press is swallowed by the toggle cooldown.
    pub fn handle(
        &mut self,
        action: HotkeyAction,
        now: Instant,
        store: &mut SettingsStore,
    ) -> Option<CommandOutcome> {
        match action {
            HotkeyAction::ToggleMode => {
                if let Some(last) = self.last_toggle {
                    if now.saturating_duration_since(last) <= TOGGLE_COOLDOWN {
                        debug!("mode toggle ignored during cooldown");
                        return None;
                    }
                }
                self.last_toggle = Some(now);
                let mode = store.toggle_mode();
                Some(CommandOutcome::message(
                    format!("{NOTIFICATION_PREFIX} Voice indicator: {mode}"),
                    true,
                ))
            }
            HotkeyAction::RaiseHeight => Some(self.adjust_height(HEIGHT_STEP, store)),
            HotkeyAction::LowerHeight => Some(self.adjust_height(-HEIGHT_STEP, store)),
        }
    }

    fn adjust_height(&self, delta: f32, store: &mut SettingsStore) -> CommandOutcome {
        let height = store.set_height(store.get().height + delta);
        CommandOutcome::message(
            format!("{NOTIFICATION_PREFIX} Indicator height: {height:.1}"),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::IndicatorMode;
    use crate::settings::{IndicatorSettings, MAX_HEIGHT};

    #[test]
    fn test_toggle_cooldown() {
        let t0 = Instant::now();
        let mut store = SettingsStore::in_memory(IndicatorSettings::default());
        let mut handler = HotkeyHandler::new();

        assert!(handler.handle(HotkeyAction::ToggleMode, t0, &mut store).is_some());
        assert_eq!(store.get().mode, IndicatorMode::Image);

        let held = t0 + Duration::from_millis(300);
        assert!(handler.handle(HotkeyAction::ToggleMode, held, &mut store).is_none());
        assert_eq!(store.get().mode, IndicatorMode::Image);

        let later = t0 + Duration::from_millis(600);
        let outcome = handler
            .handle(HotkeyAction::ToggleMode, later, &mut store)
            .unwrap();
        assert_eq!(outcome.lines, vec!["[Voice Indicator] Voice indicator: Off"]);
        assert!(outcome.changed);
    }

    #[test]
    fn test_height_steps() {
        let t0 = Instant::now();
        let mut store = SettingsStore::in_memory(IndicatorSettings::default());
        let mut handler = HotkeyHandler::new();

        let outcome = handler
            .handle(HotkeyAction::RaiseHeight, t0, &mut store)
            .unwrap();
        assert_eq!(outcome.lines, vec!["[Voice Indicator] Indicator height: 4.1"]);

        // Height keys are not rate limited
        handler.handle(HotkeyAction::LowerHeight, t0, &mut store);
        handler.handle(HotkeyAction::LowerHeight, t0, &mut store);
        assert!((store.get().height - 3.9).abs() < 1e-4);
    }

    #[test]
    fn test_height_clamped_at_max() {
        let t0 = Instant::now();
        let mut store = SettingsStore::in_memory(IndicatorSettings {
            height: MAX_HEIGHT,
            ..IndicatorSettings::default()
        });
        let mut handler = HotkeyHandler::new();
        handler.handle(HotkeyAction::RaiseHeight, t0, &mut store);
        assert_eq!(store.get().height, MAX_HEIGHT);
    }
}
