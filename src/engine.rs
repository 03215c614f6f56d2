//! Presence reconciliation engine
//!
//! Owns the presence registry, the roster snapshot and every rendered
//! badge, and runs the fixed-cadence tick that keeps them in sync. The
//! roster and renderer are borrowed per call so tests can drive several
//! independent engines side by side.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Timing;
use crate::indicator::{
    DisplayMode, IndicatorReconciler, IndicatorRecord, ModePolicy, Renderer, TickContext,
    TickReport,
};
use crate::panel::PanelView;
use crate::presence::{ActivityFeed, ParticipantKey, PresenceRegistry};
use crate::roster::{EntitySnapshotCache, Roster};
use crate::settings::IndicatorSettings;

pub struct PresenceEngine {
    presence: PresenceRegistry,
    snapshots: EntitySnapshotCache,
    reconciler: IndicatorReconciler,
    policy: ModePolicy,
    tick_interval: Duration,
    last_tick: Option<Instant>,
    /// Effective mode used by the last tick; `None` until the first tick
    last_mode: Option<Option<DisplayMode>>,
    /// Active set computed by the last tick
    active: BTreeSet<ParticipantKey>,
}

impl PresenceEngine {
    pub fn new(timing: &Timing, policy: ModePolicy) -> Self {
        Self {
            presence: PresenceRegistry::with_grace_window(timing.grace_window),
            snapshots: EntitySnapshotCache::with_interval(timing.snapshot_refresh),
            reconciler: IndicatorReconciler::with_frame_interval(timing.frame_interval),
            policy,
            tick_interval: timing.tick_interval,
            last_tick: None,
            last_mode: None,
            active: BTreeSet::new(),
        }
    }

    /// Report that `key` started or stopped talking
    pub fn set_active(&mut self, key: ParticipantKey, is_active: bool, now: Instant) {
        self.presence.set_active(key, is_active, now);
    }

    /// Apply queued activity reports
    pub fn drain(&mut self, feed: &mut ActivityFeed) -> usize {
        feed.drain_into(&mut self.presence)
    }

    /// True if a tick interval has passed since the last tick
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.tick_interval,
        }
    }

    /// Tick only if the cadence allows it
    ///
    /// Hosts with a per-frame callback call this every frame.
    pub fn poll(
        &mut self,
        now: Instant,
        settings: &IndicatorSettings,
        roster: &dyn Roster,
        renderer: &mut dyn Renderer,
    ) -> Option<TickReport> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.tick(now, settings, roster, renderer))
    }

    /// Run one reconciliation pass
    ///
    /// When the effective mode differs from the previous tick and badges
    /// exist, every badge is destroyed and this tick does nothing else; the
    /// next tick recreates badges in the new mode.
    pub fn tick(
        &mut self,
        now: Instant,
        settings: &IndicatorSettings,
        roster: &dyn Roster,
        renderer: &mut dyn Renderer,
    ) -> TickReport {
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);

        let mode = self.policy.effective(settings.mode);
        let previous = self.last_mode.replace(mode);
        let active = self.presence.active_keys(now);
        self.snapshots.refresh_if_stale(now, roster);

        // Badges from the old mode are torn down on their own tick. With
        // nothing rendered there is nothing to tear down, so reconcile now.
        let mode_changed = previous.is_some_and(|previous| previous != mode);
        if mode_changed && !self.reconciler.is_empty() {
            info!(?previous, ?mode, "display mode changed, invalidating indicators");
            let destroyed: Vec<ParticipantKey> = self.reconciler.keys().collect();
            self.reconciler.invalidate_all(renderer);
            self.active = active;
            return TickReport {
                destroyed,
                ..TickReport::default()
            };
        }

        let ctx = TickContext {
            elapsed,
            mode,
            appearance: settings.appearance(),
        };
        let report = self
            .reconciler
            .reconcile(&ctx, &active, &self.snapshots, roster, renderer);

        if report.changed() {
            debug!(
                created = report.created.len(),
                destroyed = report.destroyed.len(),
                failed = report.failed.len(),
                indicators = self.reconciler.len(),
                "reconciled indicators"
            );
        }

        self.active = active;
        report
    }

    /// Destroy every badge now; active speakers get new ones next tick
    ///
    /// Called by the command surface after any settings change.
    pub fn invalidate_all(&mut self, renderer: &mut dyn Renderer) -> usize {
        self.reconciler.invalidate_all(renderer)
    }

    /// Release every badge and forget all presence state
    ///
    /// Safe to call repeatedly.
    pub fn shutdown(&mut self, renderer: &mut dyn Renderer) {
        let released = self.reconciler.invalidate_all(renderer);
        self.presence.clear();
        self.snapshots.clear();
        self.active.clear();
        self.last_tick = None;
        self.last_mode = None;
        if released > 0 {
            info!(released, "released indicators on shutdown");
        }
    }

    /// Speaker panel for the active set of the last tick
    pub fn panel(&self, roster: &dyn Roster) -> PanelView {
        PanelView::compose(&self.active, &self.snapshots, roster)
    }

    pub fn record(&self, key: ParticipantKey) -> Option<&IndicatorRecord> {
        self.reconciler.record(key)
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Active set as of the last tick
    pub fn active(&self) -> &BTreeSet<ParticipantKey> {
        &self.active
    }

    pub fn indicator_count(&self) -> usize {
        self.reconciler.len()
    }

    /// Effective mode used by the last tick
    pub fn effective_mode(&self) -> Option<DisplayMode> {
        self.last_mode.flatten()
    }

    pub fn image_available(&self) -> bool {
        self.policy.image_available()
    }
}
