//! Countdown state derived from settings and the local date and time.

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    calendar::{days_between, in_time_range},
    settings::EventSettings,
};

/// What the strip should show right now.
///
/// Recomputed every tick, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    pub today: NaiveDate,
    /// Days until the event; negative once it has passed
    pub days_remaining: i64,
    /// Days from the start day to the event, at least one
    pub countdown_length: i64,
    /// `0 <= days_remaining <= countdown_length`
    pub in_countdown_window: bool,
    /// Blocks lit, in `0..=countdown_length`
    ///
    /// Forward countdowns light elapsed days, reverse countdowns light the
    /// days still to go.
    pub active_blocks: i64,
    /// Local time of day is inside the daily active window
    pub in_time_range: bool,
    pub is_reverse: bool,
}

impl CountdownState {
    pub fn compute(settings: &EventSettings, now: NaiveDateTime) -> Self {
        let today = now.date();
        let days_remaining = days_between(today, settings.important_date);
        let countdown_length = settings.countdown_length().max(1);

        let lit = if settings.is_reverse {
            days_remaining
        } else {
            countdown_length - days_remaining
        };

        Self {
            today,
            days_remaining,
            countdown_length,
            in_countdown_window: (0..=countdown_length).contains(&days_remaining),
            active_blocks: lit.clamp(0, countdown_length),
            in_time_range: in_time_range(settings.start_time, settings.end_time, now.time()),
            is_reverse: settings.is_reverse,
        }
    }

    pub const fn remaining_blocks(&self) -> i64 {
        self.countdown_length - self.active_blocks
    }
}
