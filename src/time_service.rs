//! Timezone resolution and wall-clock synchronization.

use alloc::string::String;

use chrono::{Datelike, NaiveDateTime};
use log::{info, warn};
use serde::Deserialize;

use crate::{
    calendar::UtcOffset,
    config::{DeviceConfig, RetryPolicy},
    error::{ConnectivityError, RemoteDataError},
    hal::{HttpClient, Platform, RealTimeClock, SntpClient, WifiRadio},
    network::NetworkLink,
    retry::retry,
};

/// A clock reading before this year has never been synchronized
pub const MIN_VALID_YEAR: i32 = 2024;

#[derive(Deserialize)]
struct GeoLocation {
    timezone: Option<String>,
}

#[derive(Deserialize)]
struct ZoneInfo {
    utc_offset: String,
}

/// Keeps the device clock in UTC and converts to local time on demand
pub struct TimeService<S, C> {
    sntp: S,
    rtc: C,
    policy: RetryPolicy,
    geolocation_url: String,
    offset_url_template: String,
    default_offset: UtcOffset,
    offset: UtcOffset,
}

impl<S: SntpClient, C: RealTimeClock> TimeService<S, C> {
    pub fn new(sntp: S, rtc: C, config: &DeviceConfig) -> Self {
        let default_offset =
            UtcOffset::from_minutes(config.default_utc_offset_minutes).unwrap_or(UtcOffset::UTC);
        Self {
            sntp,
            rtc,
            policy: config.http,
            geolocation_url: config.geolocation_url.clone(),
            offset_url_template: config.offset_url_template.clone(),
            default_offset,
            offset: default_offset,
        }
    }

    /// Look up the local offset from the device's public address.
    ///
    /// Best effort: any failure leaves the configured default in force.
    pub fn resolve_timezone<R, H, P>(&mut self, link: &mut NetworkLink<R, H>, platform: &mut P) -> UtcOffset
    where
        R: WifiRadio,
        H: HttpClient,
        P: Platform,
    {
        self.offset = match self.lookup_offset(link, platform) {
            Ok(offset) => {
                info!("utc offset {} min", offset.minutes());
                offset
            }
            Err(err) => {
                warn!(
                    "timezone lookup failed ({err}), using default offset {} min",
                    self.default_offset.minutes()
                );
                self.default_offset
            }
        };
        self.offset
    }

    fn lookup_offset<R, H, P>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        platform: &mut P,
    ) -> Result<UtcOffset, crate::Error>
    where
        R: WifiRadio,
        H: HttpClient,
        P: Platform,
    {
        let body = link.get_with_retry(platform, &self.policy, &self.geolocation_url)?;
        let location: GeoLocation = serde_json::from_slice(&body).map_err(RemoteDataError::from)?;
        let zone = location
            .timezone
            .filter(|zone| !zone.is_empty())
            .ok_or(RemoteDataError::InvalidField {
                field: "timezone",
                reason: String::from("missing"),
            })?;
        info!("detected timezone {zone}");

        let url = self.offset_url_template.replace("{zone}", &zone);
        let body = link.get_with_retry(platform, &self.policy, &url)?;
        let zone_info: ZoneInfo = serde_json::from_slice(&body).map_err(RemoteDataError::from)?;
        UtcOffset::parse(&zone_info.utc_offset).ok_or_else(|| {
            RemoteDataError::InvalidField {
                field: "utc_offset",
                reason: zone_info.utc_offset.clone(),
            }
            .into()
        })
    }

    /// Set the device clock from the network time source.
    ///
    /// Refused while the link is down. A failure keeps the clock running
    /// on its last good sync.
    pub fn sync_clock<R, H, P>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        platform: &mut P,
    ) -> Result<NaiveDateTime, ConnectivityError>
    where
        R: WifiRadio,
        H: HttpClient,
        P: Platform,
    {
        if !link.is_connected() {
            return Err(ConnectivityError::NotConnected);
        }
        let timeout = self.policy.timeout;
        let sntp = &mut self.sntp;
        let now = retry(platform, &self.policy, "time sync", |_, _| sntp.query(timeout))?;
        self.rtc.set_utc(now);
        info!("clock synchronized to {now} UTC");
        Ok(now)
    }

    pub fn utc_now(&self) -> NaiveDateTime {
        self.rtc.now_utc()
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.offset.to_local(self.rtc.now_utc())
    }

    /// Whether the clock has ever been set
    pub fn clock_is_valid(&self) -> bool {
        self.rtc.now_utc().year() >= MIN_VALID_YEAR
    }

    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn rtc(&self) -> &C {
        &self.rtc
    }

    pub fn rtc_mut(&mut self) -> &mut C {
        &mut self.rtc
    }
}
