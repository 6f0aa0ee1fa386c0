//! Debounced dark/light detection from an analog light sensor.

use log::{debug, info};

use crate::{error::SensorFault, hal::AnalogInput};

/// Debounced ambient light state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightLevel {
    Dark,
    #[default]
    Light,
}

impl LightLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

/// Light sensor with sample-count hysteresis.
///
/// A reported level changes only after `window` consecutive samples land
/// on the other side of the threshold. Faulty samples leave everything as
/// it was.
pub struct LightSensor<A> {
    input: A,
    threshold: u16,
    window: u32,
    max_valid: u16,
    level: LightLevel,
    /// Consecutive samples disagreeing with `level`
    candidate: u32,
    /// Consecutive samples agreeing with `level`
    stable_for: u32,
}

impl<A: AnalogInput> LightSensor<A> {
    /// Readings above `threshold` are dark. A window of zero acts as one.
    pub fn new(input: A, threshold: u16, window: u32) -> Self {
        Self {
            input,
            threshold,
            window: window.max(1),
            max_valid: u16::MAX,
            level: LightLevel::Light,
            candidate: 0,
            stable_for: 0,
        }
    }

    /// Readings above `max_valid` are rejected as faults
    #[must_use]
    pub fn with_max_valid(mut self, max_valid: u16) -> Self {
        self.max_valid = max_valid;
        self
    }

    /// Take one sample and return the debounced level
    pub fn read(&mut self) -> Result<LightLevel, SensorFault> {
        let raw = self.input.read()?;
        if raw > self.max_valid {
            return Err(SensorFault::OutOfRange(raw));
        }

        let sample = if raw > self.threshold {
            LightLevel::Dark
        } else {
            LightLevel::Light
        };

        if sample == self.level {
            self.candidate = 0;
            self.stable_for = self.stable_for.saturating_add(1);
        } else {
            self.candidate += 1;
            self.stable_for = 0;
            if self.candidate >= self.window {
                info!(
                    "light level {} -> {} (raw {raw})",
                    self.level.as_str(),
                    sample.as_str()
                );
                self.level = sample;
                self.stable_for = self.candidate;
                self.candidate = 0;
            } else {
                debug!("light sample {raw} disagrees ({}/{})", self.candidate, self.window);
            }
        }

        Ok(self.level)
    }

    pub const fn level(&self) -> LightLevel {
        self.level
    }

    pub fn is_dark(&self) -> bool {
        self.level == LightLevel::Dark
    }

    /// Samples in a row that agreed with the current level
    pub const fn stable_for(&self) -> u32 {
        self.stable_for
    }

    /// Whether the current level has held for a full window
    pub const fn is_stable(&self) -> bool {
        self.stable_for >= self.window
    }

    pub const fn window(&self) -> u32 {
        self.window
    }

    pub fn into_inner(self) -> A {
        self.input
    }
}
