use std::time::Duration;

use chrono::Utc;

use crate::models::Timestamp;

/// Wall-clock source. Timers themselves run on the tokio timer, which tests pause and advance.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }
}

/// Delay until `fire_at`, clamped so a past deadline fires immediately.
pub fn delay_until(fire_at: Timestamp, now: Timestamp) -> Duration {
    let millis = fire_at.saturating_sub(now).max(0);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
pub use manual::ManualClock;
