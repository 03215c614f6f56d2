//! Timer-driven "is talking..." animation for text badges

use std::time::Duration;

/// Label suffixes cycled by a text badge
pub const TALKING_FRAMES: [&str; 4] = [
    "is talking",
    "is talking.",
    "is talking..",
    "is talking...",
];

/// Time each frame stays on screen
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(500);

/// Frame index plus the time accumulated towards the next frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TalkingAnimation {
    timer: Duration,
    frame: usize,
    interval: Duration,
}

impl TalkingAnimation {
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: Duration::ZERO,
            frame: 0,
            interval,
        }
    }

    /// Accumulate `elapsed`; returns true when the frame changed
    ///
    /// The timer resets to zero on a frame change, so at most one frame is
    /// advanced per call no matter how long the gap between ticks was.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.timer += elapsed;
        if self.timer >= self.interval {
            self.timer = Duration::ZERO;
            self.frame = (self.frame + 1) % TALKING_FRAMES.len();
            true
        } else {
            false
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn timer(&self) -> Duration {
        self.timer
    }

    /// Full badge text for `name` at `frame`
    pub fn label(name: &str, frame: usize) -> String {
        format!("{} {}", name, TALKING_FRAMES[frame % TALKING_FRAMES.len()])
    }
}

impl Default for TalkingAnimation {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}
