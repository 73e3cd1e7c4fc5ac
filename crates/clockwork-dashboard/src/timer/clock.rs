use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Wall-clock time derived from the runtime's monotonic clock.
///
/// Anchoring to `tokio::time::Instant` keeps recorded end times consistent
/// with tick counting, including under a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            mono_anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.mono_anchor.elapsed()).unwrap_or(TimeDelta::zero());
        self.wall_anchor + elapsed
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
