//! Device-local configuration.
//!
//! These values are flashed with the program, unlike [`EventSettings`]
//! which are fetched at runtime.
//!
//! [`EventSettings`]: crate::settings::EventSettings

use alloc::string::{String, ToString};

use embassy_time::Duration;

/// Default reading above which the room counts as dark
pub const LIGHT_THRESHOLD: u16 = 700;

/// Default number of consistent samples before the light state flips
pub const CONSECUTIVE_READINGS_NEEDED: u32 = 25;

/// Default loop cadence
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

/// Default UDP-free geolocation lookup returning `{"timezone": ...}`
pub const GEOLOCATION_URL: &str = "http://ipwhois.app/json/";

/// Default offset lookup; `{zone}` is replaced by the zone name
pub const OFFSET_URL_TEMPLATE: &str = "http://worldtimeapi.org/api/timezone/{zone}";

/// Default manifest location; `{channel}` is replaced by the update branch
pub const MANIFEST_URL_TEMPLATE: &str =
    "https://raw.githubusercontent.com/fboucher/DaysUntilNextEvent/{channel}/firmware/manifest.json";

/// Bounded retry parameters shared by every networked component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts,
            delay,
            timeout,
        }
    }

    pub const fn attempts(&self) -> u32 {
        if self.attempts == 0 { 1 } else { self.attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(10))
    }
}

/// Where the update manager and settings cache keep their files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub program: String,
    pub staging: String,
    pub backup: String,
    pub version: String,
    pub pending_update: String,
    pub settings_cache: String,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            program: "main.bin".to_string(),
            staging: "main_new.bin".to_string(),
            backup: "main_backup_auto.bin".to_string(),
            version: "version.txt".to_string(),
            pending_update: "update_pending.json".to_string(),
            settings_cache: "settings.json".to_string(),
        }
    }
}

/// Everything the controller needs to know before it reaches the network
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub ssid: String,
    pub password: String,
    /// Number of pixels on the strip
    pub pixels: usize,
    /// Remote settings document
    pub settings_url: String,
    pub manifest_url_template: String,
    pub geolocation_url: String,
    pub offset_url_template: String,
    /// Offset used when timezone resolution fails
    pub default_utc_offset_minutes: i32,

    pub light_threshold: u16,
    pub light_stability_window: u32,
    /// Highest reading the sensor can legitimately produce
    pub light_max_valid: u16,

    pub tick_period: Duration,
    /// Ticks between heartbeat log lines
    pub heartbeat_ticks: u64,
    /// Consecutive failed ticks before the error color is shown
    pub fault_tick_limit: u32,

    /// Association attempts and per-attempt timeout
    pub wifi: RetryPolicy,
    /// HTTP and time requests
    pub http: RetryPolicy,
    /// Pause between the fatal indicator and the reboot
    pub fatal_reboot_delay: Duration,

    /// Smallest program payload accepted from an update
    pub min_payload_size: usize,
    /// Boots a new version gets to become healthy
    pub max_update_boot_attempts: u32,
    /// Time a new version gets to become healthy within one boot
    pub update_grace_period: Duration,

    pub paths: StoragePaths,
}

impl DeviceConfig {
    /// Create a configuration with defaults for everything but the essentials
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        pixels: usize,
        settings_url: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            pixels,
            settings_url: settings_url.into(),
            manifest_url_template: MANIFEST_URL_TEMPLATE.to_string(),
            geolocation_url: GEOLOCATION_URL.to_string(),
            offset_url_template: OFFSET_URL_TEMPLATE.to_string(),
            default_utc_offset_minutes: 0,
            light_threshold: LIGHT_THRESHOLD,
            light_stability_window: CONSECUTIVE_READINGS_NEEDED,
            light_max_valid: u16::MAX,
            tick_period: TICK_PERIOD,
            heartbeat_ticks: 10_000,
            fault_tick_limit: 20,
            wifi: RetryPolicy::new(5, Duration::from_secs(2), Duration::from_secs(15)),
            http: RetryPolicy::default(),
            fatal_reboot_delay: Duration::from_secs(30),
            min_payload_size: 1000,
            max_update_boot_attempts: 2,
            update_grace_period: Duration::from_secs(300),
            paths: StoragePaths::default(),
        }
    }

    #[must_use]
    pub fn with_manifest_url_template(mut self, template: impl Into<String>) -> Self {
        self.manifest_url_template = template.into();
        self
    }

    #[must_use]
    pub fn with_timezone_urls(
        mut self,
        geolocation: impl Into<String>,
        offset_template: impl Into<String>,
    ) -> Self {
        self.geolocation_url = geolocation.into();
        self.offset_url_template = offset_template.into();
        self
    }

    #[must_use]
    pub const fn with_default_utc_offset(mut self, minutes: i32) -> Self {
        self.default_utc_offset_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_light_sensor(mut self, threshold: u16, stability_window: u32) -> Self {
        self.light_threshold = threshold;
        self.light_stability_window = stability_window;
        self
    }

    #[must_use]
    pub const fn with_wifi_policy(mut self, policy: RetryPolicy) -> Self {
        self.wifi = policy;
        self
    }

    #[must_use]
    pub const fn with_http_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = policy;
        self
    }

    #[must_use]
    pub const fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    #[must_use]
    pub const fn with_update_limits(
        mut self,
        min_payload_size: usize,
        max_boot_attempts: u32,
        grace_period: Duration,
    ) -> Self {
        self.min_payload_size = min_payload_size;
        self.max_update_boot_attempts = max_boot_attempts;
        self.update_grace_period = grace_period;
        self
    }

    #[must_use]
    pub fn with_paths(mut self, paths: StoragePaths) -> Self {
        self.paths = paths;
        self
    }
}
