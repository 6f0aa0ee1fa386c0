//! Wireless link supervision and guarded HTTP access.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use embassy_time::Duration;
use log::{debug, info, warn};

use crate::{
    config::RetryPolicy,
    error::ConnectivityError,
    hal::{HttpClient, Platform, WifiRadio},
    retry::{retry, sleep},
};

/// How often association is polled while connecting
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Link state as seen by every networked component
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Every attempt of the last connect failed
    Failed(String),
}

impl ConnectionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed(_) => "failed",
        }
    }
}

/// Owns the radio and the HTTP client.
///
/// No request leaves the device unless the link reports itself connected.
pub struct NetworkLink<R, H> {
    radio: R,
    http: H,
    ssid: String,
    password: String,
    retry_delay: Duration,
    state: ConnectionState,
}

impl<R: WifiRadio, H: HttpClient> NetworkLink<R, H> {
    pub fn new(radio: R, http: H, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            radio,
            http,
            ssid: ssid.into(),
            password: password.into(),
            retry_delay: Duration::from_secs(2),
            state: ConnectionState::Disconnected,
        }
    }

    /// Pause between association attempts
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Associate with the configured network.
    ///
    /// Each attempt polls the radio until `timeout`, then drops the attempt
    /// and waits the fixed retry delay. Exhausting `max_attempts` leaves the
    /// link in [`ConnectionState::Failed`].
    pub fn connect<P: Platform>(
        &mut self,
        platform: &mut P,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<(), ConnectivityError> {
        info!("connecting to `{}`", self.ssid);
        self.state = ConnectionState::Connecting;

        let policy = RetryPolicy::new(max_attempts, self.retry_delay, timeout);
        let radio = &mut self.radio;
        let (ssid, password) = (self.ssid.as_str(), self.password.as_str());

        let result = retry(platform, &policy, "wifi connect", |platform, attempt| {
            debug!("wifi attempt {attempt}/{}", policy.attempts());
            let outcome = associate(radio, platform, ssid, password, timeout);
            if outcome.is_err() {
                radio.disconnect();
            }
            outcome
        });

        match result {
            Ok(()) => {
                info!("connected to `{}`", self.ssid);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Failed(err.to_string());
                Err(ConnectivityError::AttemptsExhausted {
                    ssid: self.ssid.clone(),
                    attempts: policy.attempts(),
                })
            }
        }
    }

    /// Cheap check used before every network call
    ///
    /// Notices a dropped association and moves the state to
    /// [`ConnectionState::Disconnected`].
    pub fn is_connected(&mut self) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        if self.radio.is_associated() {
            true
        } else {
            warn!("wifi association lost");
            self.state = ConnectionState::Disconnected;
            false
        }
    }

    /// Connect only if the link is not already up
    pub fn ensure_connected<P: Platform>(
        &mut self,
        platform: &mut P,
        policy: &RetryPolicy,
    ) -> Result<(), ConnectivityError> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect(platform, policy.timeout, policy.attempts())
    }

    /// Single GET, refused while disconnected. Only 200 counts as success.
    pub fn get(&mut self, url: &str, timeout: Duration) -> Result<Vec<u8>, ConnectivityError> {
        if !self.is_connected() {
            return Err(ConnectivityError::NotConnected);
        }
        let response = self.http.get(url, timeout)?;
        if response.status != 200 {
            return Err(ConnectivityError::Status(response.status));
        }
        Ok(response.body)
    }

    /// GET with bounded retry. Gives up at once if the link is down.
    pub fn get_with_retry<P: Platform>(
        &mut self,
        platform: &mut P,
        policy: &RetryPolicy,
        url: &str,
    ) -> Result<Vec<u8>, ConnectivityError> {
        if !self.is_connected() {
            return Err(ConnectivityError::NotConnected);
        }
        retry(platform, policy, url, |_, _| self.get(url, policy.timeout))
    }

    pub fn disconnect(&mut self) {
        self.radio.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }
}

/// One association attempt, polled until it succeeds or `timeout` passes
fn associate<R: WifiRadio, P: Platform>(
    radio: &mut R,
    platform: &mut P,
    ssid: &str,
    password: &str,
    timeout: Duration,
) -> Result<(), ConnectivityError> {
    radio.begin(ssid, password)?;
    let started = platform.now();
    loop {
        if radio.is_associated() {
            return Ok(());
        }
        if platform.now().saturating_duration_since(started) >= timeout {
            return Err(ConnectivityError::Timeout(timeout.as_millis()));
        }
        sleep(platform, POLL_INTERVAL);
    }
}
