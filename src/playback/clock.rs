use std::time::{Duration, Instant};

/// Longest frame gap fed to a sequencer in one tick. Anything longer (a
/// backgrounded window, a debugger pause) is treated as this much time.
pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Converts per-frame timestamps into clamped delta seconds.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    last: Option<Instant>,
    max_delta: Duration,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::with_max_delta(DEFAULT_MAX_FRAME_DELTA)
    }

    pub fn with_max_delta(max_delta: Duration) -> Self {
        Self {
            last: None,
            max_delta,
        }
    }

    pub fn max_delta(&self) -> Duration {
        self.max_delta
    }

    /// Seconds since the previous call, at most `max_delta`. The first call
    /// after construction or [`reset`](Self::reset) returns 0.
    pub fn delta(&mut self, now: Instant) -> f64 {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last).min(self.max_delta),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        delta.as_secs_f64()
    }

    /// Forgets the last timestamp. Call when resuming after a pause so the
    /// paused interval is not counted.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
