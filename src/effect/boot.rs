//! Boot-time visuals: the self-test wave and the stage progress bar.

use embassy_time::{Duration, Instant};

use super::Effect;
use crate::{
    color::{self, Rgb},
    math8::progress8,
};

/// Number of segments in the boot progress bar
pub const PROGRESS_SEGMENTS: u8 = 10;

/// Fills the strip pixel by pixel from the start over `duration`
#[derive(Debug, Clone, Copy)]
pub struct WaveEffect {
    color: Rgb,
    started: Instant,
    duration: Duration,
}

impl WaveEffect {
    pub const fn new(color: Rgb, started: Instant, duration: Duration) -> Self {
        Self {
            color,
            started,
            duration,
        }
    }

    pub fn is_done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration
    }
}

impl Effect for WaveEffect {
    fn render(&mut self, now: Instant, leds: &mut [Rgb]) {
        let progress = progress8(now.saturating_duration_since(self.started), self.duration);
        let lit = leds.len() * usize::from(progress) / 255;
        for (i, led) in leds.iter_mut().enumerate() {
            *led = if i < lit { self.color } else { color::OFF };
        }
    }
}

/// Segmented bar, one segment per completed boot stage.
///
/// The last pixel of each segment stays dark so segments read separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBarEffect {
    color: Rgb,
    lit: u8,
}

impl ProgressBarEffect {
    /// `lit` is clamped to [`PROGRESS_SEGMENTS`]
    pub fn new(color: Rgb, lit: u8) -> Self {
        Self {
            color,
            lit: lit.min(PROGRESS_SEGMENTS),
        }
    }

    pub const fn lit(&self) -> u8 {
        self.lit
    }
}

impl Effect for ProgressBarEffect {
    fn render(&mut self, _now: Instant, leds: &mut [Rgb]) {
        leds.fill(color::OFF);
        let segment = leds.len() / usize::from(PROGRESS_SEGMENTS);
        if segment == 0 {
            return;
        }
        for index in 0..usize::from(self.lit) {
            let start = index * segment;
            let end = start + segment - 1;
            leds[start..end].fill(self.color);
        }
    }
}
