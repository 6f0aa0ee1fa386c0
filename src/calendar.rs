//! Date parsing, day arithmetic and time-of-day windows.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Settings dates are `YYYY-MM-DD`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Settings times are 24-hour `HH:MM`
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).ok()
}

pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), TIME_FORMAT).ok()
}

/// Whole days from `from` to `to`; negative when `to` is earlier
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Whether `now` falls in the half-open window `[start, end)`
///
/// A window whose end is before its start wraps over midnight. Equal
/// bounds mean the window never closes.
pub fn in_time_range(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start == end {
        true
    } else if start < end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

/// Fixed offset from UTC, in minutes east
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtcOffset {
    minutes: i32,
}

/// Real offsets stay within +-14:00
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

impl UtcOffset {
    pub const UTC: Self = Self { minutes: 0 };

    pub const fn from_minutes(minutes: i32) -> Option<Self> {
        if minutes.abs() > MAX_OFFSET_MINUTES {
            None
        } else {
            Some(Self { minutes })
        }
    }

    pub const fn minutes(self) -> i32 {
        self.minutes
    }

    /// Parse `"+HH:MM"`, `"-HH:MM"` or `"+HHMM"`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.is_ascii() {
            return None;
        }
        let (sign, rest) = match input.as_bytes().first()? {
            b'+' => (1, &input[1..]),
            b'-' => (-1, &input[1..]),
            _ => return None,
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None if rest.len() == 4 => rest.split_at(2),
            None => return None,
        };
        let hours: i32 = hours.parse().ok()?;
        let minutes: i32 = minutes.parse().ok()?;
        if !(0..60).contains(&minutes) {
            return None;
        }
        Self::from_minutes(sign * (hours * 60 + minutes))
    }

    /// Shift a UTC timestamp into this offset
    pub fn to_local(self, utc: NaiveDateTime) -> NaiveDateTime {
        utc.checked_add_signed(TimeDelta::minutes(i64::from(self.minutes)))
            .unwrap_or(utc)
    }
}
