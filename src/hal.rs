//! Hardware and network seams.
//!
//! The controller never touches a peripheral directly. A board support
//! crate implements these traits for the real device; tests implement them
//! with in-memory fakes.

use alloc::{format, vec::Vec};
use core::fmt::Debug;

use chrono::NaiveDateTime;
use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use smart_leds::SmartLedsWrite;

use crate::{
    OutputDriver,
    color::Rgb,
    error::{ConnectivityError, FatalHardwareFault, SensorFault, StorageError},
};

/// Single-color on-board status LED
pub trait StatusIndicator {
    fn set(&mut self, on: bool);
}

/// One analog input channel
pub trait AnalogInput {
    /// Sample the channel once
    fn read(&mut self) -> Result<u16, SensorFault>;
}

/// Station-mode wireless radio
pub trait WifiRadio {
    /// Start associating with an access point. Must not block.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// Whether the radio is currently associated and has an address
    fn is_associated(&mut self) -> bool;

    /// Drop any association or pending attempt
    fn disconnect(&mut self);
}

/// Response to an HTTP GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Blocking HTTP client
pub trait HttpClient {
    /// Perform a GET, giving up after `timeout`
    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse, ConnectivityError>;
}

/// Network time source
pub trait SntpClient {
    /// Query the current UTC time
    fn query(&mut self, timeout: Duration) -> Result<NaiveDateTime, ConnectivityError>;
}

/// Battery-less wall clock kept by the device
pub trait RealTimeClock {
    fn now_utc(&self) -> NaiveDateTime;

    fn set_utc(&mut self, now: NaiveDateTime);
}

/// Flat file store holding the program image, its backup and cached data
pub trait Storage {
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Replace `to` with `from` in one step. `from` no longer exists afterwards.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError>;

    fn remove(&mut self, path: &str) -> Result<(), StorageError>;

    fn exists(&self, path: &str) -> bool;
}

/// Monotonic time, blocking delays and reset
pub trait Platform: DelayNs {
    fn now(&self) -> Instant;

    /// Restart the device. Real hardware never returns from this.
    fn reboot(&mut self);
}

/// Adapter exposing any `smart-leds` writer as an [`OutputDriver`]
pub struct SmartLedsOutput<W> {
    writer: W,
}

impl<W> SmartLedsOutput<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> OutputDriver for SmartLedsOutput<W>
where
    W: SmartLedsWrite<Color = Rgb>,
    W::Error: Debug,
{
    fn write(&mut self, colors: &[Rgb]) -> Result<(), FatalHardwareFault> {
        self.writer
            .write(colors.iter().copied())
            .map_err(|err| FatalHardwareFault::Strip(format!("{err:?}")))
    }
}
