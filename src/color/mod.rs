mod palette;
mod utils;

pub use palette::DayPalette;
use smart_leds::{RGB8, hsv::Hsv as HSV};
pub use utils::{
    ColorParseError, RgbString, clamp_channel, format_rgb, hsv2rgb, lerp_colors, parse_rgb,
};

pub type Rgb = RGB8;
pub type Hsv = HSV;

/// All channels off
pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

/// Solid color shown on fatal errors
pub const ERROR: Rgb = Rgb { r: 255, g: 0, b: 0 };

/// Self-test wave and boot progress
pub const PROGRESS: Rgb = Rgb { r: 0, g: 255, b: 0 };

/// Flashing indicator while an update is in flight
pub const UPDATE: Rgb = Rgb { r: 0, g: 0, b: 255 };

/// Second self-test flash
pub const SELF_TEST_YELLOW: Rgb = Rgb {
    r: 155,
    g: 155,
    b: 0,
};
