//! Fixed-cadence tick pacing.
//!
//! Portable pacing without async/await or platform-specific timers. The
//! caller sleeps for the returned duration between ticks.

use embassy_time::{Duration, Instant};

/// Result of a schedule step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    /// The deadline for the next tick.
    pub next_deadline: Instant,
    /// How long to wait until the next tick (zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Drift-corrected tick scheduler.
///
/// If a tick overruns by more than two periods (a blocking refresh, for
/// example) the schedule restarts from `now` instead of firing a burst of
/// catch-up ticks.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    next_tick: Option<Instant>,
    period: Duration,
}

impl TickScheduler {
    pub const fn new(period: Duration) -> Self {
        Self {
            next_tick: None,
            period,
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Account for a tick that ran at `now`
    pub fn step(&mut self, now: Instant) -> TickTiming {
        let max_drift = Duration::from_millis(self.period.as_millis() * 2);
        let scheduled = match self.next_tick {
            Some(deadline) if now <= deadline + max_drift => deadline,
            _ => now,
        };

        let next = scheduled + self.period;
        self.next_tick = Some(next);

        let sleep_duration = if next > now {
            next - now
        } else {
            Duration::from_millis(0)
        };

        TickTiming {
            next_deadline: next,
            sleep_duration,
        }
    }
}
