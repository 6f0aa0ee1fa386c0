//! Countdown blocks
//!
//! The strip is split into one block per countdown day. Block 0 sits at
//! the controller end when `from_pi` is set, otherwise at the far end.
//! Forward countdowns fill from block 0, reverse countdowns from the last
//! block.

use embassy_time::Instant;

use super::Effect;
use crate::{
    color::{self, DayPalette, Rgb, lerp_colors},
    countdown::CountdownState,
    settings::EventSettings,
};

/// Share of each blink half-period spent cross-fading
const FLASH_FADE_DIVISOR: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownEffect {
    blocks: usize,
    active: usize,
    reverse: bool,
    from_pi: bool,
    /// Even and odd block colors
    colors: [Rgb; 2],
    marker: Option<Rgb>,
    /// Blink half-period of the leading block
    flash_ms: Option<u64>,
}

impl CountdownEffect {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(settings: &EventSettings, state: &CountdownState, palette: &DayPalette) -> Self {
        let colors = if settings.use_custom_colors {
            [settings.primary_color, settings.secondary_color]
        } else {
            [palette.primary, palette.secondary]
        };
        Self {
            blocks: state.countdown_length.max(1) as usize,
            active: state.active_blocks.max(0) as usize,
            reverse: state.is_reverse,
            from_pi: settings.from_pi,
            colors,
            marker: settings.with_marker.then_some(settings.marker_color),
            flash_ms: settings.is_flashing.then(|| settings.flash_interval_ms()),
        }
    }

    /// Logical block indices that are lit
    pub fn lit_blocks(&self) -> core::ops::Range<usize> {
        let active = self.active.min(self.blocks);
        if self.reverse {
            self.blocks - active..self.blocks
        } else {
            0..active
        }
    }

    /// Block that blinks: the most recently lit one in a forward countdown,
    /// the next to go out in a reverse one
    pub fn leading_block(&self) -> Option<usize> {
        let lit = self.lit_blocks();
        if lit.is_empty() {
            None
        } else if self.reverse {
            Some(lit.start)
        } else {
            Some(lit.end - 1)
        }
    }

    /// Logical pixel range of `block` on a strip of `pixels`
    fn block_span(&self, block: usize, pixels: usize) -> core::ops::Range<usize> {
        let size = (pixels / self.blocks).max(1);
        let start = (block * size).min(pixels);
        let end = if block + 1 == self.blocks {
            pixels
        } else {
            ((block + 1) * size).min(pixels)
        };
        start..end
    }

    /// Brightness of the leading block, 0.0 to 1.0
    ///
    /// The block is on for one half-period and off for the next. The last
    /// quarter of each half cross-fades into the other state.
    #[allow(clippy::cast_precision_loss)]
    pub fn leading_block_level(&self, now: Instant) -> f32 {
        let Some(half) = self.flash_ms else {
            return 1.0;
        };
        let half = half.max(1);
        let fade = (half / FLASH_FADE_DIVISOR).max(1);
        let into_half = now.as_millis() % half;
        let on = (now.as_millis() / half) % 2 == 0;
        let fading = into_half.saturating_sub(half - fade) as f32 / fade as f32;
        if on { 1.0 - fading } else { fading }
    }
}

impl Effect for CountdownEffect {
    fn render(&mut self, now: Instant, leds: &mut [Rgb]) {
        leds.fill(color::OFF);
        let pixels = leds.len();
        let lit = self.lit_blocks();
        let leading = self.leading_block();
        let level = self.leading_block_level(now);

        for block in 0..self.blocks {
            let span = self.block_span(block, pixels);
            if span.start >= pixels {
                break;
            }
            if lit.contains(&block) {
                let block_color = self.colors[block % 2];
                let shown = if leading == Some(block) {
                    lerp_colors(color::OFF, block_color, level)
                } else {
                    block_color
                };
                leds[span].fill(shown);
            } else if let Some(marker) = self.marker {
                leds[span.start] = marker;
            }
        }

        if !self.from_pi {
            leds.reverse();
        }
    }
}
