#![no_std]

//! Event countdown light controller
//!
//! Drives a long addressable LED strip that counts down the days to a
//! configured date. Settings and program updates are pulled from a remote
//! location over an intermittent wireless link.
//!
//! Every piece of hardware the controller touches is behind a trait in
//! [`hal`], so the whole control program runs against mocks on a host.

extern crate alloc;

pub mod calendar;
pub mod color;
pub mod config;
pub mod config_service;
pub mod countdown;
pub mod effect;
pub mod error;
pub mod hal;
pub mod light_sensor;
pub mod logging;
pub mod math8;
pub mod network;
pub mod renderer;
pub mod retry;
pub mod scheduler;
pub mod settings;
pub mod supervisor;
pub mod surface;
pub mod time_service;
pub mod update;

pub use color::Rgb;
pub use config::{DeviceConfig, RetryPolicy};
pub use config_service::ConfigService;
pub use countdown::CountdownState;
pub use effect::RenderMode;
pub use error::{Error, ErrorKind};
pub use light_sensor::{LightLevel, LightSensor};
pub use network::{ConnectionState, NetworkLink};
pub use renderer::AnimationEngine;
pub use settings::EventSettings;
pub use supervisor::{Board, BootOutcome, BootStage, Peripherals, Supervisor, TickOutcome};
pub use surface::{PixelFrame, PixelSurface};
pub use time_service::TimeService;
pub use update::{UpdateManager, UpdatePhase};

pub use embassy_time::{Duration, Instant};

/// Version of the running program.
///
/// Used as the current version until an update writes its own version file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Abstract LED driver trait
///
/// Implement this trait to support different hardware platforms.
/// The pixel surface is generic over this trait.
pub trait OutputDriver {
    /// Write colors to the LED strip
    fn write(&mut self, colors: &[Rgb]) -> Result<(), error::FatalHardwareFault>;
}
