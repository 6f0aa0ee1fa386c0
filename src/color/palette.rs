//! Colors that change once per calendar day.
//!
//! The seed is derived from the date itself, so the "random" colors for a
//! given day are the same on every boot and every tick of that day.

use chrono::{Datelike, NaiveDate};

use crate::{
    color::{Hsv, Rgb, hsv2rgb},
    math8::mix64,
};

/// Hue distance between the two countdown colors
const SECONDARY_HUE_OFFSET: u8 = 128;

/// Daily colors for countdown blocks and the breathing glow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayPalette {
    date: NaiveDate,
    /// Color of even blocks when custom colors are off
    pub primary: Rgb,
    /// Color of odd blocks when custom colors are off
    pub secondary: Rgb,
    /// Breathing base color, each channel in 0.01-0.98
    pub breath: [f32; 3],
}

impl DayPalette {
    /// Derive the palette for `date`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn for_date(date: NaiveDate) -> Self {
        let seed = mix64(date.num_days_from_ce() as u64);
        let hue = (seed & 0xFF) as u8;

        let primary = hsv2rgb(Hsv {
            hue,
            sat: 255,
            val: 255,
        });
        let secondary = hsv2rgb(Hsv {
            hue: hue.wrapping_add(SECONDARY_HUE_OFFSET),
            sat: 255,
            val: 255,
        });

        let fraction = |shift: u32| ((seed >> shift) % 98 + 1) as f32 / 100.0;
        let breath = [fraction(16), fraction(32), fraction(48)];

        Self {
            date,
            primary,
            secondary,
            breath,
        }
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }
}
