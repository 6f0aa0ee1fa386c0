//! Pixel frames and the flush to hardware.

use alloc::{vec, vec::Vec};
use core::ops::{Deref, DerefMut};

use crate::{OutputDriver, color::Rgb, error::FatalHardwareFault};

/// One rendered frame, exactly one color per pixel.
///
/// Frames are moved, never shared: the animation engine fills one and hands
/// it to [`PixelSurface::flush`], which gives back the frame it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame(Vec<Rgb>);

impl PixelFrame {
    /// All-off frame of `pixels` colors
    pub fn new(pixels: usize) -> Self {
        Self(vec![Rgb::default(); pixels])
    }

    pub fn filled(pixels: usize, color: Rgb) -> Self {
        Self(vec![color; pixels])
    }

    pub fn as_slice(&self) -> &[Rgb] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Rgb> {
        self.0
    }

    /// Number of pixels that are not off
    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|c| **c != Rgb::default()).count()
    }
}

impl Deref for PixelFrame {
    type Target = [Rgb];

    fn deref(&self) -> &[Rgb] {
        &self.0
    }
}

impl DerefMut for PixelFrame {
    fn deref_mut(&mut self) -> &mut [Rgb] {
        &mut self.0
    }
}

/// The strip as the rest of the program sees it
pub struct PixelSurface<D> {
    driver: D,
    pixels: usize,
    shown: Option<PixelFrame>,
}

impl<D: OutputDriver> PixelSurface<D> {
    pub const fn new(driver: D, pixels: usize) -> Self {
        Self {
            driver,
            pixels,
            shown: None,
        }
    }

    pub const fn pixels(&self) -> usize {
        self.pixels
    }

    /// Write `frame` to the strip.
    ///
    /// On success the frame becomes the shown frame and the one it replaced
    /// is returned for reuse. On failure the frame is dropped and the
    /// previously shown frame is kept.
    pub fn flush(&mut self, frame: PixelFrame) -> Result<Option<PixelFrame>, FatalHardwareFault> {
        self.driver.write(&frame)?;
        Ok(self.shown.replace(frame))
    }

    /// Fill the whole strip with one color
    pub fn fill(&mut self, color: Rgb) -> Result<(), FatalHardwareFault> {
        self.flush(PixelFrame::filled(self.pixels, color)).map(|_| ())
    }

    pub fn clear(&mut self) -> Result<(), FatalHardwareFault> {
        self.fill(Rgb::default())
    }

    /// Last frame that reached the strip
    pub const fn shown(&self) -> Option<&PixelFrame> {
        self.shown.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
