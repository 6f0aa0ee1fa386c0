//! Single color fills: blank, fault and the update indicator.

use embassy_time::{Duration, Instant};

use super::Effect;
use crate::color::{self, Rgb};

/// Fills all LEDs with one color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolidEffect {
    color: Rgb,
}

impl SolidEffect {
    pub const fn new(color: Rgb) -> Self {
        Self { color }
    }

    pub const fn off() -> Self {
        Self::new(color::OFF)
    }

    pub const fn color(&self) -> Rgb {
        self.color
    }
}

impl Effect for SolidEffect {
    fn render(&mut self, _now: Instant, leds: &mut [Rgb]) {
        leds.fill(self.color);
    }
}

/// Whole-strip on/off blinking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashEffect {
    color: Rgb,
    /// Time spent in each of the on and off halves
    half_period: Duration,
}

impl FlashEffect {
    pub const fn new(color: Rgb, half_period: Duration) -> Self {
        Self { color, half_period }
    }

    /// Whether the strip is in the lit half at `now`
    pub fn is_on(&self, now: Instant) -> bool {
        let half = self.half_period.as_millis().max(1);
        (now.as_millis() / half) % 2 == 0
    }
}

impl Effect for FlashEffect {
    fn render(&mut self, now: Instant, leds: &mut [Rgb]) {
        let color = if self.is_on(now) { self.color } else { color::OFF };
        leds.fill(color);
    }
}
