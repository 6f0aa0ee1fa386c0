//! Shared test infrastructure for the controller integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::{
    cell::Cell,
    collections::{BTreeMap, HashMap, VecDeque},
    rc::Rc,
};

use chrono::{NaiveDate, NaiveDateTime};
use countdown_light::{
    DeviceConfig, Duration, Instant, OutputDriver, RetryPolicy,
    color::Rgb,
    error::{ConnectivityError, FatalHardwareFault, SensorFault, StorageError},
    hal::{
        AnalogInput, HttpClient, HttpResponse, Platform, RealTimeClock, SntpClient,
        StatusIndicator, Storage, WifiRadio,
    },
    logging::LogSink,
    supervisor::{Board, Peripherals},
};
use embedded_hal::delay::DelayNs;

pub const PIXELS: usize = 24;
pub const SETTINGS_URL: &str = "http://settings.test/settings.json";
pub const MANIFEST_TEMPLATE: &str = "http://updates.test/{channel}/manifest.json";
pub const GEO_URL: &str = "http://geo.test/json/";
pub const OFFSET_TEMPLATE: &str = "http://tz.test/{zone}";
pub const PAYLOAD_URL: &str = "http://updates.test/main/program.bin";

pub const DARK: u16 = 900;
pub const BRIGHT: u16 = 100;

// ============================================================================
// Time helpers
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(hour, minute, 0).unwrap()
}

/// Small retry budgets and short delays so tests stay fast
pub fn test_config() -> DeviceConfig {
    DeviceConfig::new("home", "secret", PIXELS, SETTINGS_URL)
        .with_manifest_url_template(MANIFEST_TEMPLATE)
        .with_timezone_urls(GEO_URL, OFFSET_TEMPLATE)
        .with_light_sensor(700, 3)
        .with_wifi_policy(RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_secs(1),
        ))
        .with_http_policy(RetryPolicy::new(
            2,
            Duration::from_millis(100),
            Duration::from_secs(1),
        ))
        .with_update_limits(16, 2, Duration::from_secs(60))
}

pub fn settings_json(start: &str, target: &str) -> String {
    format!(
        r#"{{"ImportantDate":"{target}","StartFromDay":"{start}","UseCustomColors":true,"PrimaryRGBColor":"(255,0,0)","SecondaryRGBColor":"(0,255,0)","StartTime":"00:00","EndTime":"23:59","IsFlashing":false}}"#
    )
}

pub fn christmas_settings() -> String {
    settings_json("2025-12-01", "2025-12-25")
}

// ============================================================================
// Mock platform
// ============================================================================

/// Monotonic clock that only moves when something sleeps
#[derive(Default)]
pub struct FakePlatform {
    pub now_ns: u64,
    pub reboots: u32,
}

impl FakePlatform {
    pub fn advance(&mut self, duration: Duration) {
        self.now_ns += duration.as_micros() * 1000;
    }
}

impl DelayNs for FakePlatform {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ns += u64::from(ms) * 1_000_000;
    }
}

impl Platform for FakePlatform {
    fn now(&self) -> Instant {
        Instant::from_micros(self.now_ns / 1000)
    }

    fn reboot(&mut self) {
        self.reboots += 1;
    }
}

// ============================================================================
// Mock strip and indicator
// ============================================================================

/// Strip that remembers every frame written to it
#[derive(Default)]
pub struct RecordingStrip {
    pub frames: Vec<Vec<Rgb>>,
    pub fail: bool,
}

impl RecordingStrip {
    pub fn last(&self) -> Option<&[Rgb]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl OutputDriver for RecordingStrip {
    fn write(&mut self, colors: &[Rgb]) -> Result<(), FatalHardwareFault> {
        if self.fail {
            return Err(FatalHardwareFault::Strip("data line stuck".into()));
        }
        self.frames.push(colors.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIndicator {
    pub on: bool,
}

impl StatusIndicator for FakeIndicator {
    fn set(&mut self, on: bool) {
        self.on = on;
    }
}

// ============================================================================
// Mock light sensor
// ============================================================================

/// Analog input whose reading the test controls; `None` fails the read
#[derive(Clone)]
pub struct SharedAnalog(pub Rc<Cell<Option<u16>>>);

impl SharedAnalog {
    pub fn new(value: u16) -> Self {
        Self(Rc::new(Cell::new(Some(value))))
    }

    pub fn set(&self, value: u16) {
        self.0.set(Some(value));
    }

    pub fn fail(&self) {
        self.0.set(None);
    }
}

impl AnalogInput for SharedAnalog {
    fn read(&mut self) -> Result<u16, SensorFault> {
        self.0.get().ok_or(SensorFault::ReadFailed)
    }
}

/// Plays back a fixed sequence of readings, repeating the last one
pub struct SequenceAnalog {
    readings: VecDeque<u16>,
    last: u16,
}

impl SequenceAnalog {
    pub fn new(readings: &[u16]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
            last: 0,
        }
    }
}

impl AnalogInput for SequenceAnalog {
    fn read(&mut self) -> Result<u16, SensorFault> {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

// ============================================================================
// Mock radio and HTTP
// ============================================================================

/// Radio that associates on the first poll once `fail_first` attempts
/// have been burned
#[derive(Default)]
pub struct ScriptedRadio {
    pub fail_first: u32,
    pub never_associate: bool,
    pub begins: u32,
    pub disconnects: u32,
    pub associated: bool,
    pending: bool,
}

impl ScriptedRadio {
    pub fn failing_first(attempts: u32) -> Self {
        Self {
            fail_first: attempts,
            ..Self::default()
        }
    }

    pub fn dead() -> Self {
        Self {
            never_associate: true,
            ..Self::default()
        }
    }

    /// Simulate the access point going away
    pub fn drop_association(&mut self) {
        self.associated = false;
        self.pending = false;
    }
}

impl WifiRadio for ScriptedRadio {
    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        self.begins += 1;
        self.pending = true;
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        if !self.associated
            && self.pending
            && !self.never_associate
            && self.begins > self.fail_first
        {
            self.associated = true;
        }
        self.associated
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.associated = false;
        self.pending = false;
    }
}

type Reply = Result<HttpResponse, ConnectivityError>;

/// HTTP client answering from per-URL scripts.
///
/// Queued replies are used first; after that the standing reply for the
/// URL, if any. Unknown URLs fail with a transport error.
#[derive(Default)]
pub struct ScriptedHttp {
    standing: HashMap<String, Reply>,
    queued: HashMap<String, VecDeque<Reply>>,
    pub requests: Vec<String>,
}

impl ScriptedHttp {
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(url, body);
        self
    }

    pub fn set_body(&mut self, url: &str, body: impl Into<Vec<u8>>) {
        self.standing
            .insert(url.to_string(), Ok(HttpResponse::ok(body)));
    }

    pub fn set_reply(&mut self, url: &str, reply: Reply) {
        self.standing.insert(url.to_string(), reply);
    }

    pub fn queue(&mut self, url: &str, reply: Reply) {
        self.queued
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests.iter().filter(|r| r.as_str() == url).count()
    }
}

impl HttpClient for ScriptedHttp {
    fn get(&mut self, url: &str, _timeout: Duration) -> Reply {
        self.requests.push(url.to_string());
        if let Some(reply) = self.queued.get_mut(url).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.standing
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ConnectivityError::Transport(format!("no route to {url}"))))
    }
}

/// Replies for a healthy network: timezone, settings, up-to-date manifest
pub fn healthy_http(settings: &str) -> ScriptedHttp {
    ScriptedHttp::default()
        .with_body(GEO_URL, r#"{"timezone":"Europe/Paris"}"#)
        .with_body(
            "http://tz.test/Europe/Paris",
            r#"{"utc_offset":"+01:00"}"#,
        )
        .with_body(SETTINGS_URL, settings)
        .with_body(
            "http://updates.test/main/manifest.json",
            format!(r#"{{"version":"{}","payload_url":"{PAYLOAD_URL}"}}"#, countdown_light::VERSION),
        )
}

// ============================================================================
// Mock clocks
// ============================================================================

pub struct FakeSntp {
    pub reply: Result<NaiveDateTime, ConnectivityError>,
    /// Answer with whatever this clock reads instead of `reply`
    pub follow: Option<SharedRtc>,
    pub queries: u32,
}

impl FakeSntp {
    pub fn answering(now: NaiveDateTime) -> Self {
        Self {
            reply: Ok(now),
            follow: None,
            queries: 0,
        }
    }

    pub fn following(clock: &SharedRtc) -> Self {
        Self {
            reply: Err(ConnectivityError::NotConnected),
            follow: Some(clock.clone()),
            queries: 0,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: Err(ConnectivityError::Timeout(1000)),
            follow: None,
            queries: 0,
        }
    }
}

impl SntpClient for FakeSntp {
    fn query(&mut self, _timeout: Duration) -> Result<NaiveDateTime, ConnectivityError> {
        self.queries += 1;
        match &self.follow {
            Some(clock) => Ok(clock.get()),
            None => self.reply.clone(),
        }
    }
}

/// Wall clock shared with the test so it can jump days
#[derive(Clone)]
pub struct SharedRtc(pub Rc<Cell<NaiveDateTime>>);

impl SharedRtc {
    pub fn new(now: NaiveDateTime) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    pub fn get(&self) -> NaiveDateTime {
        self.0.get()
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.0.set(now);
    }
}

impl RealTimeClock for SharedRtc {
    fn now_utc(&self) -> NaiveDateTime {
        self.0.get()
    }

    fn set_utc(&mut self, now: NaiveDateTime) {
        self.0.set(now);
    }
}

// ============================================================================
// Mock storage and log sink
// ============================================================================

#[derive(Default, Clone)]
pub struct MemoryStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    /// Writes to these paths fail
    pub read_only: Vec<String>,
}

impl MemoryStorage {
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), data.into());
        self
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.read_only.iter().any(|p| p == path) {
            return Err(StorageError::Io {
                path: path.to_string(),
                reason: "read-only".into(),
            });
        }
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        let data = self
            .files
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

#[derive(Default)]
pub struct MemoryLogs {
    pub errors: Vec<String>,
    pub trace: Vec<String>,
    pub clears: u32,
}

impl LogSink for MemoryLogs {
    fn append_error(&mut self, line: &str) {
        self.errors.push(line.to_string());
    }

    fn append_trace(&mut self, line: &str) {
        self.trace.push(line.to_string());
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.errors.clear();
        self.trace.clear();
    }
}

// ============================================================================
// Test board
// ============================================================================

pub struct TestBoard;

impl Board for TestBoard {
    type Strip = RecordingStrip;
    type Indicator = FakeIndicator;
    type Sensor = SharedAnalog;
    type Radio = ScriptedRadio;
    type Http = ScriptedHttp;
    type Sntp = FakeSntp;
    type Rtc = SharedRtc;
    type Storage = MemoryStorage;
    type Platform = FakePlatform;
    type Logs = MemoryLogs;
}

/// Handles a test keeps after the peripherals move into the supervisor
pub struct Handles {
    pub light: SharedAnalog,
    pub clock: SharedRtc,
}

/// Peripherals for a device whose clock already holds `utc_now`.
///
/// The time server agrees with the clock, so a sync never moves it.
pub fn peripherals(
    radio: ScriptedRadio,
    http: ScriptedHttp,
    storage: MemoryStorage,
    utc_now: NaiveDateTime,
) -> (Peripherals<TestBoard>, Handles) {
    let light = SharedAnalog::new(BRIGHT);
    let clock = SharedRtc::new(utc_now);
    let peripherals = Peripherals {
        strip: RecordingStrip::default(),
        indicator: FakeIndicator::default(),
        sensor: light.clone(),
        radio,
        http,
        sntp: FakeSntp::following(&clock),
        rtc: clock.clone(),
        storage,
        platform: FakePlatform::default(),
        logs: MemoryLogs::default(),
    };
    (peripherals, Handles { light, clock })
}

/// Program image with enough bytes to pass the payload size check
pub fn program(tag: &str) -> Vec<u8> {
    format!("{tag}:").repeat(8).into_bytes()
}
