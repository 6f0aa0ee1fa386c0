//! Remote settings retrieval with last-known-good fallback.

use alloc::string::String;

use log::{debug, error, info, warn};

use crate::{
    Error,
    config::{DeviceConfig, RetryPolicy},
    error::StorageError,
    hal::{HttpClient, Platform, Storage, WifiRadio},
    network::NetworkLink,
    settings::EventSettings,
};

/// Where the settings in force came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    /// Built-in defaults, nothing fetched or cached yet
    Defaults,
    /// Local copy of an earlier successful fetch
    Cache,
    /// Fetched during this boot
    Remote,
}

/// Sole owner of the active [`EventSettings`].
///
/// A fetch either replaces the settings as a whole or leaves them exactly
/// as they were.
pub struct ConfigService {
    url: String,
    cache_path: String,
    policy: RetryPolicy,
    settings: EventSettings,
    source: SettingsSource,
}

impl ConfigService {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            url: config.settings_url.clone(),
            cache_path: config.paths.settings_cache.clone(),
            policy: config.http,
            settings: EventSettings::default(),
            source: SettingsSource::Defaults,
        }
    }

    pub const fn settings(&self) -> &EventSettings {
        &self.settings
    }

    pub const fn source(&self) -> SettingsSource {
        self.source
    }

    /// Adopt the cached copy of the last good document, if any
    pub fn load_cached<S: Storage>(&mut self, storage: &S) -> Result<(), Error> {
        let body = match storage.read(&self.cache_path) {
            Ok(body) => body,
            Err(StorageError::NotFound(path)) => {
                debug!("no cached settings at `{path}`");
                return Err(StorageError::NotFound(path).into());
            }
            Err(err) => return Err(err.into()),
        };
        let settings = EventSettings::parse(&body)?;
        info!("loaded cached settings");
        self.settings = settings;
        self.source = SettingsSource::Cache;
        Ok(())
    }

    /// Download, validate and adopt the remote document.
    ///
    /// Any failure is logged and the previous settings stay in force.
    pub fn fetch<R, H, S, P>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        storage: &mut S,
        platform: &mut P,
    ) -> Result<&EventSettings, Error>
    where
        R: WifiRadio,
        H: HttpClient,
        S: Storage,
        P: Platform,
    {
        info!("fetching settings");
        let body = match link.get_with_retry(platform, &self.policy, &self.url) {
            Ok(body) => body,
            Err(err) => {
                warn!("settings fetch failed, keeping previous settings: {err}");
                return Err(err.into());
            }
        };

        let settings = match EventSettings::parse(&body) {
            Ok(settings) => settings,
            Err(err) => {
                error!("settings document rejected, keeping previous settings: {err}");
                return Err(err.into());
            }
        };

        info!("settings fetched successfully");
        settings.log_fields();

        match settings.to_json() {
            Ok(encoded) => {
                if let Err(err) = storage.write(&self.cache_path, &encoded) {
                    warn!("could not cache settings: {err}");
                }
            }
            Err(err) => warn!("could not encode settings for cache: {err}"),
        }

        self.settings = settings;
        self.source = SettingsSource::Remote;
        Ok(&self.settings)
    }
}
