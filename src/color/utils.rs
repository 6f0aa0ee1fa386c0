use core::fmt::Write;

pub use smart_leds::hsv::hsv2rgb;
use thiserror::Error;

use crate::color::Rgb;

/// Longest encoded color is `(255,255,255)`
pub type RgbString = heapless::String<16>;

/// Why a `"(r,g,b)"` string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("expected three comma separated channels")]
    ChannelCount,
    #[error("channel is not an integer")]
    NotANumber,
    #[error("channel value {0} is outside 0-255")]
    OutOfRange(i64),
}

/// Linear interpolation per channel, `t` in 0.0-1.0
pub fn lerp_colors(a: Rgb, b: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let lerp = |x: u8, y: u8| clamp_channel(f32::from(x) + (f32::from(y) - f32::from(x)) * t);
    Rgb {
        r: lerp(a.r, b.r),
        g: lerp(a.g, b.g),
        b: lerp(a.b, b.b),
    }
}

/// Clamp a computed channel value into 0-255, truncating the fraction
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_channel(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0) as u8
}

/// Parse a color encoded as `"(r,g,b)"`
///
/// Whitespace around channels is accepted, as is a missing pair of
/// parentheses.
pub fn parse_rgb(input: &str) -> Result<Rgb, ColorParseError> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut channels = [0u8; 3];
    let mut parts = inner.split(',');
    for channel in &mut channels {
        let part = parts.next().ok_or(ColorParseError::ChannelCount)?;
        let value: i64 = part
            .trim()
            .parse()
            .map_err(|_| ColorParseError::NotANumber)?;
        *channel = u8::try_from(value).map_err(|_| ColorParseError::OutOfRange(value))?;
    }
    if parts.next().is_some() {
        return Err(ColorParseError::ChannelCount);
    }

    Ok(Rgb {
        r: channels[0],
        g: channels[1],
        b: channels[2],
    })
}

/// Encode a color the way the settings document does
pub fn format_rgb(color: Rgb) -> RgbString {
    let mut out = RgbString::new();
    // 16 bytes always fit three u8 channels
    let _ = write!(out, "({},{},{})", color.r, color.g, color.b);
    out
}
