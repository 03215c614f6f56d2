//! Single-writer queue between voice event sources and the registry
//!
//! Voice start/stop events may be produced on any thread. They are stamped
//! with the time they were reported and queued; the engine task drains the
//! queue into its registry at the start of every tick, so the registry itself
//! never needs a lock.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::{ParticipantKey, PresenceRegistry};

/// One voice start/stop event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityReport {
    pub key: ParticipantKey,
    pub is_active: bool,
    /// When the event was reported, not when it was drained
    pub at: Instant,
}

/// Cloneable handle given to activity sources
#[derive(Debug, Clone)]
pub struct ActivitySender {
    tx: mpsc::UnboundedSender<ActivityReport>,
}

impl ActivitySender {
    /// Report a participant starting or stopping speech now
    ///
    /// Returns false if the engine side of the feed is gone.
    pub fn report(&self, key: ParticipantKey, is_active: bool) -> bool {
        self.report_at(key, is_active, Instant::now())
    }

    /// Report with an explicit timestamp
    pub fn report_at(&self, key: ParticipantKey, is_active: bool, at: Instant) -> bool {
        let sent = self
            .tx
            .send(ActivityReport { key, is_active, at })
            .is_ok();
        if !sent {
            warn!(%key, "activity feed closed, report dropped");
        }
        sent
    }
}

/// Receiving side of the activity queue, owned by the engine task
#[derive(Debug)]
pub struct ActivityFeed {
    rx: mpsc::UnboundedReceiver<ActivityReport>,
}

impl ActivityFeed {
    /// Create a connected sender/feed pair
    pub fn channel() -> (ActivitySender, ActivityFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ActivitySender { tx }, ActivityFeed { rx })
    }

    /// Apply every queued report to `registry` in arrival order
    ///
    /// Returns the number of reports applied. Never waits.
    pub fn drain_into(&mut self, registry: &mut PresenceRegistry) -> usize {
        let mut applied = 0;
        while let Ok(report) = self.rx.try_recv() {
            registry.set_active(report.key, report.is_active, report.at);
            applied += 1;
        }
        if applied > 0 {
            trace!(applied, "drained activity reports");
        }
        applied
    }
}
