//! Per-tick reconciliation of speakers against rendered badges
//!
//! Every participant key is in one of three states:
//! - Inactive: not in the active set, no record
//! - ActiveUnresolved: active but no live entity (or mode is off), no record
//! - ActiveRendered: active, resolved, one record holding a render handle
//!
//! A record owns its render handle. Releasing a handle consumes the record,
//! so a handle can only be destroyed once.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    Appearance, DisplayMode, IndicatorStyle, RenderHandle, Renderer, TalkingAnimation,
    DEFAULT_FRAME_INTERVAL,
};
use crate::presence::ParticipantKey;
use crate::roster::{EntityInfo, EntitySnapshotCache, Roster};

/// Inputs shared by every key during one tick
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Time since the previous tick
    pub elapsed: Duration,
    /// Effective display mode; `None` suppresses creation
    pub mode: Option<DisplayMode>,
    pub appearance: Appearance,
}

/// What one tick did, per key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub created: Vec<ParticipantKey>,
    pub updated: Vec<ParticipantKey>,
    pub destroyed: Vec<ParticipantKey>,
    /// Active keys left without a badge because they did not resolve
    pub unresolved: Vec<ParticipantKey>,
    /// Keys whose renderer call failed this tick
    pub failed: Vec<ParticipantKey>,
}

impl TickReport {
    /// True if the tick created or destroyed anything
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.destroyed.is_empty() || !self.failed.is_empty()
    }
}

/// A rendered badge for one participant
#[derive(Debug)]
pub struct IndicatorRecord {
    mode: DisplayMode,
    entity_key: ParticipantKey,
    handle: RenderHandle,
    animation: TalkingAnimation,
    style: IndicatorStyle,
}

impl IndicatorRecord {
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Key used to look the bound entity up in the snapshot
    pub fn entity_key(&self) -> ParticipantKey {
        self.entity_key
    }

    pub fn handle(&self) -> RenderHandle {
        self.handle
    }

    /// Current animation frame; image badges do not animate
    pub fn frame(&self) -> Option<usize> {
        match self.mode {
            DisplayMode::Text => Some(self.animation.frame()),
            DisplayMode::Image => None,
        }
    }

    pub fn animation_timer(&self) -> Duration {
        self.animation.timer()
    }

    /// Style most recently sent to the renderer
    pub fn style(&self) -> &IndicatorStyle {
        &self.style
    }

    /// Destroy the render handle, consuming the record
    fn release(self, renderer: &mut dyn Renderer) {
        if let Err(e) = renderer.destroy_indicator(self.handle) {
            warn!(key = %self.entity_key, handle = %self.handle, ?e, "failed to destroy indicator");
        }
    }
}

/// Owner of every rendered badge
#[derive(Debug)]
pub struct IndicatorReconciler {
    records: BTreeMap<ParticipantKey, IndicatorRecord>,
    frame_interval: Duration,
}

impl IndicatorReconciler {
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            records: BTreeMap::new(),
            frame_interval,
        }
    }

    pub fn record(&self, key: ParticipantKey) -> Option<&IndicatorRecord> {
        self.records.get(&key)
    }

    /// Keys that currently have a badge
    pub fn keys(&self) -> impl Iterator<Item = ParticipantKey> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bring badges in line with `active`
    ///
    /// Each key is handled on its own; a failure for one key never stops
    /// the others.
    pub fn reconcile(
        &mut self,
        ctx: &TickContext,
        active: &BTreeSet<ParticipantKey>,
        snapshots: &EntitySnapshotCache,
        roster: &dyn Roster,
        renderer: &mut dyn Renderer,
    ) -> TickReport {
        let mut report = TickReport::default();

        for &key in active {
            let entity = snapshots.resolve_live(key, roster);
            let rendered = self.records.contains_key(&key);

            match (rendered, entity) {
                (false, None) => report.unresolved.push(key),
                (false, Some(entity)) => self.create(key, &entity, ctx, renderer, &mut report),
                (true, None) => {
                    debug!(%key, "speaker no longer resolvable");
                    self.destroy(key, renderer);
                    report.destroyed.push(key);
                }
                (true, Some(entity)) => self.update(key, &entity, ctx, renderer, &mut report),
            }
        }

        let departed: Vec<ParticipantKey> = self
            .records
            .keys()
            .filter(|key| !active.contains(key))
            .copied()
            .collect();
        for key in departed {
            self.destroy(key, renderer);
            report.destroyed.push(key);
        }

        report
    }

    fn create(
        &mut self,
        key: ParticipantKey,
        entity: &EntityInfo,
        ctx: &TickContext,
        renderer: &mut dyn Renderer,
        report: &mut TickReport,
    ) {
        let Some(mode) = ctx.mode else {
            return;
        };

        let animation = TalkingAnimation::new(self.frame_interval);
        let style = IndicatorStyle::build(mode, entity, animation.frame(), ctx.appearance);

        match renderer.create_indicator(key, mode, &style) {
            Ok(handle) => {
                debug!(%key, %handle, %mode, "indicator created");
                self.records.insert(
                    key,
                    IndicatorRecord {
                        mode,
                        entity_key: key,
                        handle,
                        animation,
                        style,
                    },
                );
                report.created.push(key);
            }
            Err(e) => {
                warn!(%key, ?e, "failed to create indicator");
                report.failed.push(key);
            }
        }
    }

    fn update(
        &mut self,
        key: ParticipantKey,
        entity: &EntityInfo,
        ctx: &TickContext,
        renderer: &mut dyn Renderer,
        report: &mut TickReport,
    ) {
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };

        if record.mode == DisplayMode::Text {
            record.animation.advance(ctx.elapsed);
        }
        let style =
            IndicatorStyle::build(record.mode, entity, record.animation.frame(), ctx.appearance);

        match renderer.update_indicator(record.handle, &style) {
            Ok(()) => {
                record.style = style;
                report.updated.push(key);
            }
            Err(e) => {
                // The renderer no longer has this handle, drop without destroying
                warn!(%key, handle = %record.handle, ?e, "failed to update indicator, dropping");
                self.records.remove(&key);
                report.failed.push(key);
            }
        }
    }

    fn destroy(&mut self, key: ParticipantKey, renderer: &mut dyn Renderer) {
        if let Some(record) = self.records.remove(&key) {
            debug!(%key, handle = %record.handle, "indicator destroyed");
            record.release(renderer);
        }
    }

    /// Destroy every badge; returns how many were released
    ///
    /// Active keys get fresh badges on the next reconcile. Safe to call
    /// when already empty.
    pub fn invalidate_all(&mut self, renderer: &mut dyn Renderer) -> usize {
        let records = std::mem::take(&mut self.records);
        let released = records.len();
        for record in records.into_values() {
            record.release(renderer);
        }
        if released > 0 {
            debug!(released, "all indicators invalidated");
        }
        released
    }
}

impl Default for IndicatorReconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::testing::{Call, RecordingRenderer};
    use crate::roster::{EntityArena, Team};
    use std::time::Instant;

    fn player(key: u64) -> EntityInfo {
        EntityInfo {
            key: ParticipantKey(key),
            name: format!("player-{key}"),
            number: key as u32,
            team: Team::Red,
            body: None,
        }
    }

    fn ctx(mode: Option<DisplayMode>, elapsed_ms: u64) -> TickContext {
        TickContext {
            elapsed: Duration::from_millis(elapsed_ms),
            mode,
            appearance: Appearance {
                height: 4.0,
                size: 1.5,
            },
        }
    }

    fn keys(ids: &[u64]) -> BTreeSet<ParticipantKey> {
        ids.iter().map(|id| ParticipantKey(*id)).collect()
    }

    struct Fixture {
        arena: EntityArena,
        snapshots: EntitySnapshotCache,
        renderer: RecordingRenderer,
        reconciler: IndicatorReconciler,
    }

    impl Fixture {
        fn with_players(ids: &[u64]) -> Self {
            let mut arena = EntityArena::new();
            for id in ids {
                arena.upsert(player(*id));
            }
            let mut snapshots = EntitySnapshotCache::new();
            snapshots.refresh(Instant::now(), &arena);
            Self {
                arena,
                snapshots,
                renderer: RecordingRenderer::default(),
                reconciler: IndicatorReconciler::new(),
            }
        }

        fn run(&mut self, ctx: TickContext, active: &BTreeSet<ParticipantKey>) -> TickReport {
            self.reconciler.reconcile(
                &ctx,
                active,
                &self.snapshots,
                &self.arena,
                &mut self.renderer,
            )
        }
    }

    #[test]
    fn test_creates_for_resolvable_speaker() {
        let mut fx = Fixture::with_players(&[1]);
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1]));

        assert_eq!(report.created, vec![ParticipantKey(1)]);
        let record = fx.reconciler.record(ParticipantKey(1)).unwrap();
        assert_eq!(record.mode(), DisplayMode::Text);
        assert_eq!(record.frame(), Some(0));
        assert_eq!(
            record.style().label.as_deref(),
            Some("player-1 is talking")
        );
    }

    #[test]
    fn test_unresolved_speaker_gets_no_record() {
        let mut fx = Fixture::with_players(&[]);
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[8]));

        assert_eq!(report.unresolved, vec![ParticipantKey(8)]);
        assert!(fx.reconciler.is_empty());
        assert!(fx.renderer.calls.is_empty());
    }

    #[test]
    fn test_none_mode_creates_nothing() {
        let mut fx = Fixture::with_players(&[1]);
        let report = fx.run(ctx(None, 200), &keys(&[1]));

        assert!(report.created.is_empty());
        assert!(fx.reconciler.is_empty());
        assert_eq!(fx.renderer.creates(), 0);
    }

    #[test]
    fn test_second_tick_only_updates() {
        let mut fx = Fixture::with_players(&[1, 2]);
        let active = keys(&[1, 2]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        assert!(!report.changed());
        assert_eq!(report.updated.len(), 2);
        assert_eq!(fx.renderer.creates(), 2);
        assert_eq!(fx.renderer.updates(), 2);
        assert_eq!(fx.renderer.destroys(), 0);
    }

    #[test]
    fn test_departed_speaker_destroyed_once() {
        let mut fx = Fixture::with_players(&[1]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1]));
        let handle = fx.reconciler.record(ParticipantKey(1)).unwrap().handle();

        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[]));
        assert_eq!(report.destroyed, vec![ParticipantKey(1)]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[]));

        assert_eq!(fx.renderer.destroys(), 1);
        assert_eq!(fx.renderer.calls.last(), Some(&Call::Destroy(handle)));
        assert!(fx.renderer.live.is_empty());
    }

    #[test]
    fn test_despawned_entity_destroys_indicator() {
        let mut fx = Fixture::with_players(&[1]);
        let active = keys(&[1]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        // Snapshot still holds the old handle; revalidation fails
        fx.arena.remove(ParticipantKey(1));
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        assert_eq!(report.destroyed, vec![ParticipantKey(1)]);
        assert!(fx.reconciler.is_empty());

        // Still unresolvable, nothing recreated
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &active);
        assert_eq!(report.unresolved, vec![ParticipantKey(1)]);
        assert_eq!(fx.renderer.creates(), 1);
    }

    #[test]
    fn test_animation_advances_on_update() {
        let mut fx = Fixture::with_players(&[1]);
        let active = keys(&[1]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);
        fx.run(ctx(Some(DisplayMode::Text), 500), &active);

        let record = fx.reconciler.record(ParticipantKey(1)).unwrap();
        assert_eq!(record.frame(), Some(1));
        assert_eq!(
            record.style().label.as_deref(),
            Some("player-1 is talking.")
        );
    }

    #[test]
    fn test_image_records_do_not_animate() {
        let mut fx = Fixture::with_players(&[1]);
        let active = keys(&[1]);
        fx.run(ctx(Some(DisplayMode::Image), 200), &active);
        fx.run(ctx(Some(DisplayMode::Image), 600), &active);

        let record = fx.reconciler.record(ParticipantKey(1)).unwrap();
        assert_eq!(record.frame(), None);
        assert_eq!(record.animation_timer(), Duration::ZERO);
    }

    #[test]
    fn test_update_refreshes_color() {
        let mut fx = Fixture::with_players(&[1]);
        let active = keys(&[1]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        fx.arena.get_mut(ParticipantKey(1)).unwrap().team = Team::Blue;
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        let record = fx.reconciler.record(ParticipantKey(1)).unwrap();
        assert_eq!(record.style().color, crate::indicator::Color::BLUE);
    }

    #[test]
    fn test_failed_create_retried_next_tick() {
        let mut fx = Fixture::with_players(&[1]);
        fx.renderer.fail_creates = true;
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1]));
        assert_eq!(report.failed, vec![ParticipantKey(1)]);
        assert!(fx.reconciler.is_empty());

        fx.renderer.fail_creates = false;
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1]));
        assert_eq!(report.created, vec![ParticipantKey(1)]);
    }

    #[test]
    fn test_failed_update_drops_record_without_destroy() {
        let mut fx = Fixture::with_players(&[1, 2]);
        let active = keys(&[1, 2]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        fx.renderer.fail_updates = true;
        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &active);

        assert_eq!(report.failed.len(), 2);
        assert!(fx.reconciler.is_empty());
        assert_eq!(fx.renderer.destroys(), 0);
    }

    #[test]
    fn test_failed_destroy_still_forgets_record() {
        let mut fx = Fixture::with_players(&[1, 2]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1, 2]));

        // Renderer already lost the handle, so destroy fails
        let handle = fx.reconciler.record(ParticipantKey(1)).unwrap().handle();
        fx.renderer.live.remove(&handle);

        let report = fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[2]));
        assert_eq!(report.destroyed, vec![ParticipantKey(1)]);
        assert!(fx.reconciler.record(ParticipantKey(1)).is_none());
        assert_eq!(fx.renderer.destroys(), 1);

        // Not destroyed a second time
        fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[2]));
        assert_eq!(fx.renderer.destroys(), 1);
        assert_eq!(fx.reconciler.len(), 1);
    }

    #[test]
    fn test_invalidate_all_releases_every_handle() {
        let mut fx = Fixture::with_players(&[1, 2, 3]);
        fx.run(ctx(Some(DisplayMode::Text), 200), &keys(&[1, 2, 3]));

        assert_eq!(fx.reconciler.invalidate_all(&mut fx.renderer), 3);
        assert_eq!(fx.reconciler.invalidate_all(&mut fx.renderer), 0);
        assert!(fx.renderer.live.is_empty());
        assert_eq!(fx.renderer.destroys(), 3);
    }

    #[test]
    fn test_at_most_one_record_per_key() {
        let mut fx = Fixture::with_players(&[1, 2, 3]);
        let sequences = [
            keys(&[1]),
            keys(&[1, 2]),
            keys(&[2, 3]),
            keys(&[1, 2, 3]),
            keys(&[]),
            keys(&[3]),
        ];
        for active in sequences.iter().cycle().take(18) {
            fx.run(ctx(Some(DisplayMode::Text), 200), active);
            assert_eq!(fx.renderer.live.len(), fx.reconciler.len());
            assert_eq!(fx.reconciler.len(), active.len());
        }
    }
}
