use embassy_time::{Duration, Instant};
use log::info;

use crate::{
    color::{self, DayPalette},
    countdown::CountdownState,
    effect::{
        BreathingEffect, CountdownEffect, EffectSlot, FlashEffect, RenderMode, SolidEffect,
    },
    settings::EventSettings,
    surface::PixelFrame,
};

/// Blink half-period of the update indicator
pub const UPDATE_FLASH_PERIOD: Duration = Duration::from_millis(500);

/// Animation engine - turns a render mode into pixel frames
///
/// Owns the frame under construction. Each render hands a filled frame
/// out by value; the frame displaced on the strip comes back through
/// [`reclaim`](Self::reclaim) so steady-state rendering does not allocate.
pub struct AnimationEngine {
    pixels: usize,
    spare: Option<PixelFrame>,
    palette: Option<DayPalette>,
    mode: Option<RenderMode>,
}

impl AnimationEngine {
    pub const fn new(pixels: usize) -> Self {
        Self {
            pixels,
            spare: None,
            palette: None,
            mode: None,
        }
    }

    /// Pick the mode for this tick
    ///
    /// A flagged fault wins, then a lit room or a closed daily window
    /// blanks the strip. Otherwise the countdown window decides.
    pub const fn select_mode(state: &CountdownState, dark: bool, fault: bool) -> RenderMode {
        if fault {
            RenderMode::Fault
        } else if !dark || !state.in_time_range {
            RenderMode::Blank
        } else if state.in_countdown_window {
            RenderMode::Countdown
        } else {
            RenderMode::Breathing
        }
    }

    /// Palette for `date`, derived once per calendar day
    pub fn palette_for(&mut self, date: chrono::NaiveDate) -> DayPalette {
        match self.palette {
            Some(palette) if palette.date() == date => palette,
            _ => {
                let palette = DayPalette::for_date(date);
                info!(
                    "palette for {date}: primary {} secondary {}",
                    color::format_rgb(palette.primary),
                    color::format_rgb(palette.secondary)
                );
                self.palette = Some(palette);
                palette
            }
        }
    }

    /// Render one frame in `mode`
    pub fn render(
        &mut self,
        mode: RenderMode,
        settings: &EventSettings,
        state: &CountdownState,
        now: Instant,
    ) -> PixelFrame {
        if self.mode != Some(mode) {
            info!("render mode -> {}", mode.as_str());
            self.mode = Some(mode);
        }

        let slot = match mode {
            RenderMode::Countdown => {
                let palette = self.palette_for(state.today);
                EffectSlot::Countdown(CountdownEffect::new(settings, state, &palette))
            }
            RenderMode::Breathing => {
                let palette = self.palette_for(state.today);
                EffectSlot::Breathing(BreathingEffect::new(palette.breath, settings.from_pi))
            }
            RenderMode::Blank => EffectSlot::Solid(SolidEffect::off()),
            RenderMode::Fault => EffectSlot::Solid(SolidEffect::new(color::ERROR)),
            RenderMode::Updating => {
                EffectSlot::Flash(FlashEffect::new(color::UPDATE, UPDATE_FLASH_PERIOD))
            }
        };
        self.render_effect(slot, now)
    }

    /// Render an arbitrary effect, used for boot visuals
    pub fn render_effect(&mut self, mut effect: EffectSlot, now: Instant) -> PixelFrame {
        let mut frame = self.take_frame();
        effect.render(now, &mut frame);
        frame
    }

    /// Hand back a frame the strip no longer shows
    pub fn reclaim(&mut self, frame: Option<PixelFrame>) {
        if let Some(frame) = frame
            && frame.len() == self.pixels
        {
            self.spare = Some(frame);
        }
    }

    pub const fn mode(&self) -> Option<RenderMode> {
        self.mode
    }

    pub const fn pixels(&self) -> usize {
        self.pixels
    }

    fn take_frame(&mut self) -> PixelFrame {
        self.spare
            .take()
            .unwrap_or_else(|| PixelFrame::new(self.pixels))
    }
}
