//! Renderer that forwards draw commands to overlay clients
//!
//! The daemon does not draw anything itself. It allocates render handles,
//! tracks which are live, and broadcasts create/update/destroy events for
//! subscribed clients (the in-game overlay) to act on.

use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::trace;

use super::{DisplayMode, IndicatorStyle, RenderError, RenderHandle, Renderer};
use crate::events::IndicatorEvent;
use crate::presence::ParticipantKey;

pub struct BroadcastRenderer {
    next_handle: u64,
    live: HashSet<RenderHandle>,
    event_tx: broadcast::Sender<IndicatorEvent>,
}

impl BroadcastRenderer {
    pub fn new(event_tx: broadcast::Sender<IndicatorEvent>) -> Self {
        Self {
            next_handle: 0,
            live: HashSet::new(),
            event_tx,
        }
    }

    /// Number of handles created and not yet destroyed
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn emit(&self, event: IndicatorEvent) {
        trace!(%event, "broadcasting indicator event");
        // No subscribers is fine, the overlay may not be connected yet
        let _ = self.event_tx.send(event);
    }
}

impl Renderer for BroadcastRenderer {
    fn create_indicator(
        &mut self,
        key: ParticipantKey,
        mode: DisplayMode,
        style: &IndicatorStyle,
    ) -> Result<RenderHandle, RenderError> {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.live.insert(handle);
        self.emit(IndicatorEvent::IndicatorCreated {
            handle,
            key,
            mode,
            style: style.clone(),
        });
        Ok(handle)
    }

    fn update_indicator(
        &mut self,
        handle: RenderHandle,
        style: &IndicatorStyle,
    ) -> Result<(), RenderError> {
        if !self.live.contains(&handle) {
            return Err(RenderError::UnknownHandle(handle));
        }
        self.emit(IndicatorEvent::IndicatorUpdated {
            handle,
            style: style.clone(),
        });
        Ok(())
    }

    fn destroy_indicator(&mut self, handle: RenderHandle) -> Result<(), RenderError> {
        if !self.live.remove(&handle) {
            return Err(RenderError::UnknownHandle(handle));
        }
        self.emit(IndicatorEvent::IndicatorDestroyed { handle });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{AttachPoint, Color};

    fn style() -> IndicatorStyle {
        IndicatorStyle {
            label: Some("Ana is talking".into()),
            font_size: Some(1.2),
            color: Color::WHITE,
            attach: AttachPoint::Body,
            height: 4.0,
            scale: 1.0,
        }
    }

    #[test]
    fn test_handle_lifecycle_events() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut renderer = BroadcastRenderer::new(tx);

        let handle = renderer
            .create_indicator(ParticipantKey(1), DisplayMode::Text, &style())
            .unwrap();
        renderer.update_indicator(handle, &style()).unwrap();
        renderer.destroy_indicator(handle).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            IndicatorEvent::IndicatorCreated { key: ParticipantKey(1), .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            IndicatorEvent::IndicatorUpdated { .. }
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            IndicatorEvent::IndicatorDestroyed { handle }
        );
        assert_eq!(renderer.live_count(), 0);
    }

    #[test]
    fn test_double_destroy_rejected() {
        let (tx, _rx) = broadcast::channel(16);
        let mut renderer = BroadcastRenderer::new(tx);
        let handle = renderer
            .create_indicator(ParticipantKey(1), DisplayMode::Image, &style())
            .unwrap();

        assert!(renderer.destroy_indicator(handle).is_ok());
        assert_eq!(
            renderer.destroy_indicator(handle),
            Err(RenderError::UnknownHandle(handle))
        );
        assert!(renderer.update_indicator(handle, &style()).is_err());
    }

    #[test]
    fn test_works_without_subscribers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let mut renderer = BroadcastRenderer::new(tx);
        assert!(renderer
            .create_indicator(ParticipantKey(2), DisplayMode::Text, &style())
            .is_ok());
    }
}
