//! Breathing glow shown outside the countdown window.
//!
//! Brightness swells and fades with a sine, while a Gaussian falloff
//! around a slowly wandering center keeps the glow local. The width of the
//! bell tracks the breath, so the glow widens as it dims.

use core::f32::consts::{PI, TAU};

use embassy_time::{Duration, Instant};
use libm::{expf, sinf};

use super::Effect;
use crate::color::{Rgb, clamp_channel};

/// One full breath
pub const BREATH_PERIOD: Duration = Duration::from_secs(8);

/// One full sweep of the glow center
pub const DRIFT_PERIOD: Duration = Duration::from_secs(90);

/// Peak brightness multiplier is `32 * 9`
const BRIGHTNESS_BASE: f32 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathingEffect {
    /// Channel fractions of the day's base color
    base: [f32; 3],
    from_pi: bool,
}

#[allow(clippy::cast_precision_loss)]
fn phase_of(now: Instant, period: Duration) -> f32 {
    let period = period.as_millis().max(1);
    TAU * (now.as_millis() % period) as f32 / period as f32
}

impl BreathingEffect {
    pub const fn new(base: [f32; 3], from_pi: bool) -> Self {
        Self { base, from_pi }
    }

    /// Pixel position the glow is centered on
    #[allow(clippy::cast_precision_loss)]
    pub fn center(pixels: usize, now: Instant) -> f32 {
        let half = pixels as f32 / 2.0;
        half + half / 2.0 * sinf(phase_of(now, DRIFT_PERIOD))
    }
}

impl Effect for BreathingEffect {
    #[allow(clippy::cast_precision_loss)]
    fn render(&mut self, now: Instant, leds: &mut [Rgb]) {
        let pixels = leds.len();
        let phase = phase_of(now, BREATH_PERIOD);
        let center = Self::center(pixels, now);
        let swell = BRIGHTNESS_BASE * (1.0 + 4.0 * (sinf(phase + PI) + 1.0));
        let width = 1.0 + 20.0 * (sinf(phase) + 1.0);

        for i in 0..pixels {
            let distance = center - i as f32;
            let brightness = swell * expf(-(distance * distance) / (width * width));
            let index = if self.from_pi { pixels - 1 - i } else { i };
            leds[index] = Rgb {
                r: clamp_channel(self.base[0] * brightness),
                g: clamp_channel(self.base[1] * brightness),
                b: clamp_channel(self.base[2] * brightness),
            };
        }
    }
}
