//! Effect system with compile-time known effect variants
//!
//! All effects are stored in an enum to avoid boxing.
//! Each effect implements the `Effect` trait and renders from an explicit
//! `now`, so the same inputs always give the same frame.

mod boot;
mod breathing;
mod countdown;
mod solid;

use embassy_time::Instant;

pub use boot::{PROGRESS_SEGMENTS, ProgressBarEffect, WaveEffect};
pub use breathing::BreathingEffect;
pub use countdown::CountdownEffect;
pub use solid::{FlashEffect, SolidEffect};

use crate::color::Rgb;

const MODE_NAME_COUNTDOWN: &str = "countdown";
const MODE_NAME_BREATHING: &str = "breathing";
const MODE_NAME_BLANK: &str = "blank";
const MODE_NAME_FAULT: &str = "fault";
const MODE_NAME_UPDATING: &str = "updating";

pub trait Effect {
    /// Render a single frame
    fn render(&mut self, now: Instant, leds: &mut [Rgb]);
}

/// What the running loop asks the animation engine to show
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Dark room, inside the daily window, inside the countdown window
    Countdown,
    /// Dark room, inside the daily window, outside the countdown window
    Breathing,
    /// Lit room or outside the daily window
    Blank,
    /// An unrecovered fault is flagged
    Fault,
    /// A program update is in flight
    Updating,
}

impl RenderMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Countdown => MODE_NAME_COUNTDOWN,
            Self::Breathing => MODE_NAME_BREATHING,
            Self::Blank => MODE_NAME_BLANK,
            Self::Fault => MODE_NAME_FAULT,
            Self::Updating => MODE_NAME_UPDATING,
        }
    }

    /// Whether any pixel can be lit in this mode
    pub const fn is_lit(self) -> bool {
        !matches!(self, Self::Blank)
    }
}

/// Effect slot - enum containing all possible effects
#[derive(Debug, Clone)]
pub enum EffectSlot {
    Countdown(CountdownEffect),
    Breathing(BreathingEffect),
    Solid(SolidEffect),
    Flash(FlashEffect),
    Wave(WaveEffect),
    Progress(ProgressBarEffect),
}

impl EffectSlot {
    /// Render the current effect
    pub fn render(&mut self, now: Instant, leds: &mut [Rgb]) {
        match self {
            Self::Countdown(effect) => effect.render(now, leds),
            Self::Breathing(effect) => effect.render(now, leds),
            Self::Solid(effect) => effect.render(now, leds),
            Self::Flash(effect) => effect.render(now, leds),
            Self::Wave(effect) => effect.render(now, leds),
            Self::Progress(effect) => effect.render(now, leds),
        }
    }
}
