//! Engine service task
//!
//! Owns the engine together with everything it borrows per tick (roster
//! arena, settings, renderer) and runs the reconciliation cadence. Other
//! tasks talk to it through a [`ServiceHandle`]: activity reports go over the
//! lock-free feed, everything else through control messages with oneshot
//! replies, so all engine state stays on this one task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::commands::{self, CommandOutcome, HotkeyAction, HotkeyHandler};
use crate::config::Timing;
use crate::engine::PresenceEngine;
use crate::events::IndicatorEvent;
use crate::indicator::{BroadcastRenderer, DisplayMode, IndicatorMode, ModePolicy};
use crate::panel::PanelView;
use crate::presence::{ActivityFeed, ActivitySender, ParticipantKey};
use crate::roster::{EntityArena, EntityHandle, EntityInfo, Position};
use crate::settings::SettingsStore;

const CONTROL_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Snapshot of engine state published after every tick and control message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Mode as configured by the user
    pub mode: IndicatorMode,
    pub height: f32,
    pub size: f32,
    /// Mode badges are rendered in; `None` when badges are off
    pub effective_mode: Option<DisplayMode>,
    pub image_available: bool,
    /// Live badges
    pub indicators: usize,
    /// Entries in the speaker panel
    pub speakers: usize,
    /// Presence records still tracked, including ones in their grace window
    pub tracked: usize,
    /// Entities in the roster
    pub entities: usize,
}

/// The service task has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine service is not running")]
pub struct ServiceStopped;

/// Messages handled on the engine task
#[derive(Debug)]
enum Control {
    Command {
        text: String,
        reply: oneshot::Sender<Option<CommandOutcome>>,
    },
    Hotkey {
        action: HotkeyAction,
        reply: oneshot::Sender<Option<CommandOutcome>>,
    },
    UpsertEntity {
        entity: EntityInfo,
        reply: oneshot::Sender<EntityHandle>,
    },
    RemoveEntity {
        key: ParticipantKey,
        reply: oneshot::Sender<bool>,
    },
    SetViewer {
        position: Option<Position>,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable client side of the service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    control_tx: mpsc::Sender<Control>,
    activity: ActivitySender,
    events: broadcast::Sender<IndicatorEvent>,
    status: Arc<RwLock<EngineStatus>>,
}

impl ServiceHandle {
    /// Report a participant starting or stopping speech
    pub fn report_activity(&self, key: ParticipantKey, is_active: bool) -> bool {
        self.activity.report(key, is_active)
    }

    /// Run a chat message through the command parser
    ///
    /// `None` means the message was ordinary chat.
    pub async fn command(&self, text: String) -> Result<Option<CommandOutcome>, ServiceStopped> {
        self.call(|reply| Control::Command { text, reply }).await
    }

    /// Apply a hotkey; `None` when swallowed by the toggle cooldown
    pub async fn hotkey(
        &self,
        action: HotkeyAction,
    ) -> Result<Option<CommandOutcome>, ServiceStopped> {
        self.call(|reply| Control::Hotkey { action, reply }).await
    }

    pub async fn upsert_entity(&self, entity: EntityInfo) -> Result<EntityHandle, ServiceStopped> {
        self.call(|reply| Control::UpsertEntity { entity, reply }).await
    }

    pub async fn remove_entity(&self, key: ParticipantKey) -> Result<bool, ServiceStopped> {
        self.call(|reply| Control::RemoveEntity { key, reply }).await
    }

    pub async fn set_viewer(&self, position: Option<Position>) -> Result<(), ServiceStopped> {
        self.call(|reply| Control::SetViewer { position, reply }).await
    }

    /// Latest published status
    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    /// Receive every indicator event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<IndicatorEvent> {
        self.events.subscribe()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Result<T, ServiceStopped> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceStopped)?;
        rx.await.map_err(|_| ServiceStopped)
    }
}

pub struct EngineService {
    engine: PresenceEngine,
    roster: EntityArena,
    settings: SettingsStore,
    renderer: BroadcastRenderer,
    feed: ActivityFeed,
    hotkeys: HotkeyHandler,
    control_rx: mpsc::Receiver<Control>,
    events: broadcast::Sender<IndicatorEvent>,
    status: Arc<RwLock<EngineStatus>>,
    tick_interval: Duration,
    panel: PanelView,
}

impl EngineService {
    /// Create the service and the handle used to reach it
    pub fn new(
        timing: &Timing,
        policy: ModePolicy,
        settings: SettingsStore,
    ) -> (Self, ServiceHandle) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (activity, feed) = ActivityFeed::channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let status = Arc::new(RwLock::new(EngineStatus::default()));

        let service = Self {
            engine: PresenceEngine::new(timing, policy),
            roster: EntityArena::new(),
            settings,
            renderer: BroadcastRenderer::new(events.clone()),
            feed,
            hotkeys: HotkeyHandler::new(),
            control_rx,
            events: events.clone(),
            status: Arc::clone(&status),
            tick_interval: timing.tick_interval,
            panel: PanelView::default(),
        };
        let handle = ServiceHandle {
            control_tx,
            activity,
            events,
            status,
        };
        (service, handle)
    }

    /// Run until `shutdown` fires or every handle is dropped
    ///
    /// All badges are released and presence state cleared before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.tick_interval.as_millis() as u64, "engine service started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.step(Instant::now()).await;
                }
                control = self.control_rx.recv() => {
                    match control {
                        Some(control) => self.handle_control(control).await,
                        None => {
                            debug!("all service handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    debug!("engine service received shutdown");
                    break;
                }
            }
        }

        self.stop().await;
        info!("engine service stopped");
    }

    /// One reconciliation tick at `now`
    async fn step(&mut self, now: Instant) {
        self.engine.drain(&mut self.feed);
        let settings = self.settings.get();
        self.engine
            .tick(now, &settings, &self.roster, &mut self.renderer);

        let panel = self.engine.panel(&self.roster);
        if panel != self.panel {
            self.panel = panel.clone();
            self.emit(IndicatorEvent::SpeakersChanged { panel });
        }

        self.publish_status().await;
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::Command { text, reply } => {
                let outcome = commands::handle_message(&text, &mut self.settings);
                if let Some(outcome) = &outcome {
                    self.apply_outcome(outcome);
                }
                let _ = reply.send(outcome);
            }
            Control::Hotkey { action, reply } => {
                let outcome = self
                    .hotkeys
                    .handle(action, Instant::now(), &mut self.settings);
                if let Some(outcome) = &outcome {
                    self.apply_outcome(outcome);
                }
                let _ = reply.send(outcome);
            }
            Control::UpsertEntity { entity, reply } => {
                debug!(key = %entity.key, name = %entity.name, "entity upserted");
                let _ = reply.send(self.roster.upsert(entity));
            }
            Control::RemoveEntity { key, reply } => {
                let removed = self.roster.remove(key);
                debug!(%key, removed, "entity removed");
                let _ = reply.send(removed);
            }
            Control::SetViewer { position, reply } => {
                self.roster.set_viewer(position);
                let _ = reply.send(());
            }
        }
        self.publish_status().await;
    }

    /// Rebuild every badge after a settings change
    fn apply_outcome(&mut self, outcome: &CommandOutcome) {
        if !outcome.changed {
            return;
        }
        let released = self.engine.invalidate_all(&mut self.renderer);
        let settings = self.settings.get();
        info!(
            mode = %settings.mode,
            height = settings.height,
            size = settings.size,
            released,
            "indicator settings changed"
        );
        self.emit(IndicatorEvent::SettingsChanged {
            mode: settings.mode,
            height: settings.height,
            size: settings.size,
        });
    }

    async fn stop(&mut self) {
        self.engine.shutdown(&mut self.renderer);
        if self.renderer.live_count() > 0 {
            warn!(live = self.renderer.live_count(), "render handles still live after shutdown");
        }
        if !self.panel.lines.is_empty() {
            self.panel = PanelView::default();
            self.emit(IndicatorEvent::SpeakersChanged {
                panel: self.panel.clone(),
            });
        }
        self.publish_status().await;
    }

    async fn publish_status(&self) {
        let settings = self.settings.get();
        let status = EngineStatus {
            mode: settings.mode,
            height: settings.height,
            size: settings.size,
            effective_mode: self.engine.effective_mode(),
            image_available: self.engine.image_available(),
            indicators: self.engine.indicator_count(),
            speakers: self.panel.lines.len(),
            tracked: self.engine.presence().len(),
            entities: self.roster.len(),
        };
        *self.status.write().await = status;
    }

    fn emit(&self, event: IndicatorEvent) {
        let _ = self.events.send(event);
    }
}
