//! Startup sequence and the running loop.
//!
//! Boot walks through a fixed list of stages, showing progress on the
//! strip. Any stage that runs out of retries ends in `Fatal`: solid error
//! color, then a timed reboot. Once running, every tick senses, decides,
//! renders and flushes in that order, and only then does slow work such as
//! the daily refresh or draining the log queue.

use chrono::NaiveDate;
use embassy_time::{Duration, Instant};
use log::{debug, error, info, warn};

use crate::{
    Error, OutputDriver,
    color::{self, PROGRESS, Rgb},
    config::DeviceConfig,
    config_service::{ConfigService, SettingsSource},
    countdown::CountdownState,
    effect::{EffectSlot, ProgressBarEffect, RenderMode, WaveEffect},
    error::{ErrorKind, FatalHardwareFault},
    hal::{
        AnalogInput, HttpClient, Platform, RealTimeClock, SntpClient, StatusIndicator, Storage,
        WifiRadio,
    },
    light_sensor::{LightLevel, LightSensor},
    logging::{LogQueue, LogSink, QUEUE_SIZE},
    network::NetworkLink,
    renderer::AnimationEngine,
    retry::sleep,
    scheduler::TickScheduler,
    surface::PixelSurface,
    time_service::TimeService,
    update::{BootVerdict, UpdateManager, UpdateObserver, UpdateOutcome, UpdatePhase},
};

/// Time per pixel of the self-test wave
const WAVE_STEP: Duration = Duration::from_millis(10);
/// Frame interval while the wave runs
const WAVE_FRAME: Duration = Duration::from_millis(20);
/// How long each self-test color is held
const SELF_TEST_HOLD: Duration = Duration::from_millis(200);
/// How long the full progress bar is held before running
const BOOT_DONE_HOLD: Duration = Duration::from_millis(500);
/// Blinks shown before an update starts writing
const UPDATE_FLASHES: u8 = 3;
const UPDATE_FLASH_HOLD: Duration = Duration::from_millis(300);

/// The concrete hardware a controller runs on
pub trait Board {
    type Strip: OutputDriver;
    type Indicator: StatusIndicator;
    type Sensor: AnalogInput;
    type Radio: WifiRadio;
    type Http: HttpClient;
    type Sntp: SntpClient;
    type Rtc: RealTimeClock;
    type Storage: Storage;
    type Platform: Platform;
    type Logs: LogSink;
}

/// Everything the supervisor takes ownership of at construction
pub struct Peripherals<B: Board> {
    pub strip: B::Strip,
    pub indicator: B::Indicator,
    pub sensor: B::Sensor,
    pub radio: B::Radio,
    pub http: B::Http,
    pub sntp: B::Sntp,
    pub rtc: B::Rtc,
    pub storage: B::Storage,
    pub platform: B::Platform,
    pub logs: B::Logs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Boot,
    HardwareSelfTest,
    NetworkConnect,
    TimeSync,
    SettingsFetch,
    UpdateCheck,
    Running,
    Fatal,
}

impl BootStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::HardwareSelfTest => "hardware_self_test",
            Self::NetworkConnect => "network_connect",
            Self::TimeSync => "time_sync",
            Self::SettingsFetch => "settings_fetch",
            Self::UpdateCheck => "update_check",
            Self::Running => "running",
            Self::Fatal => "fatal",
        }
    }

    /// Progress bar segments shown while in this stage
    pub const fn progress_segments(self) -> u8 {
        match self {
            Self::Boot | Self::HardwareSelfTest | Self::Fatal => 0,
            Self::NetworkConnect => 1,
            Self::TimeSync => 3,
            Self::SettingsFetch => 6,
            Self::UpdateCheck => 8,
            Self::Running => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Startup finished; call [`Supervisor::tick`] from now on
    Running,
    /// A reboot was requested
    Rebooting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// A reboot was requested
    Reboot,
}

/// Drives the strip through the update phases
struct UpdateIndicator<'a, D> {
    surface: &'a mut PixelSurface<D>,
}

impl<D: OutputDriver> UpdateIndicator<'_, D> {
    fn show(&mut self, color: Rgb) {
        if let Err(err) = self.surface.fill(color) {
            warn!("update indicator: {err}");
        }
    }
}

impl<D: OutputDriver, P: Platform> UpdateObserver<P> for UpdateIndicator<'_, D> {
    fn on_phase(&mut self, phase: UpdatePhase, platform: &mut P) {
        match phase {
            UpdatePhase::Downloading => {
                for _ in 0..UPDATE_FLASHES {
                    self.show(color::UPDATE);
                    sleep(platform, UPDATE_FLASH_HOLD);
                    self.show(color::OFF);
                    sleep(platform, UPDATE_FLASH_HOLD);
                }
                self.show(color::UPDATE);
            }
            phase if phase.is_busy() => self.show(color::UPDATE),
            _ => {}
        }
    }
}

pub struct Supervisor<B: Board> {
    config: DeviceConfig,
    surface: PixelSurface<B::Strip>,
    indicator: B::Indicator,
    sensor: LightSensor<B::Sensor>,
    link: NetworkLink<B::Radio, B::Http>,
    time: TimeService<B::Sntp, B::Rtc>,
    settings: ConfigService,
    updates: UpdateManager,
    engine: AnimationEngine,
    scheduler: TickScheduler,
    storage: B::Storage,
    platform: B::Platform,
    logs: B::Logs,
    log_queue: Option<&'static LogQueue<QUEUE_SIZE>>,

    stage: BootStage,
    fault: bool,
    failed_ticks: u32,
    good_ticks: u32,
    refreshed_on: Option<NaiveDate>,
    ticks: u64,
}

impl<B: Board> Supervisor<B> {
    pub fn new(config: DeviceConfig, peripherals: Peripherals<B>) -> Self {
        let Peripherals {
            strip,
            indicator,
            sensor,
            radio,
            http,
            sntp,
            rtc,
            storage,
            platform,
            logs,
        } = peripherals;

        Self {
            surface: PixelSurface::new(strip, config.pixels),
            indicator,
            sensor: LightSensor::new(sensor, config.light_threshold, config.light_stability_window)
                .with_max_valid(config.light_max_valid),
            link: NetworkLink::new(radio, http, config.ssid.clone(), config.password.clone())
                .with_retry_delay(config.wifi.delay),
            time: TimeService::new(sntp, rtc, &config),
            settings: ConfigService::new(&config),
            updates: UpdateManager::new(&config),
            engine: AnimationEngine::new(config.pixels),
            scheduler: TickScheduler::new(config.tick_period),
            storage,
            platform,
            logs,
            log_queue: None,
            stage: BootStage::Boot,
            fault: false,
            failed_ticks: 0,
            good_ticks: 0,
            refreshed_on: None,
            ticks: 0,
            config,
        }
    }

    /// Drain this queue into the log sink once per tick
    #[must_use]
    pub fn with_log_queue(mut self, queue: &'static LogQueue<QUEUE_SIZE>) -> Self {
        self.log_queue = Some(queue);
        self
    }

    /// Run the startup sequence
    ///
    /// Returns [`BootOutcome::Rebooting`] when the device must restart.
    /// The reboot itself is left to the caller.
    pub fn start(&mut self) -> BootOutcome {
        self.logs.clear();
        self.stamp_logs();
        info!("=== countdown light {} starting ===", crate::VERSION);
        self.enter(BootStage::Boot);

        self.updates.load_current_version(&self.storage);
        let now = self.platform.now();
        if let BootVerdict::RollbackRequired(_) = self.updates.begin_boot(&mut self.storage, now) {
            if self.roll_back() {
                return BootOutcome::Rebooting;
            }
            warn!("continuing with version {}", self.updates.current_version());
        }

        self.enter(BootStage::HardwareSelfTest);
        if let Err(err) = self.self_test() {
            return self.fatal(&err.into());
        }
        self.indicator.set(true);

        if let Err(err) = self.settings.load_cached(&self.storage) {
            debug!("no usable settings cache: {err}");
        }

        self.enter(BootStage::NetworkConnect);
        if let Err(err) = self.link.connect(
            &mut self.platform,
            self.config.wifi.timeout,
            self.config.wifi.attempts(),
        ) {
            return self.fatal(&err.into());
        }

        self.enter(BootStage::TimeSync);
        self.time.resolve_timezone(&mut self.link, &mut self.platform);
        if let Err(err) = self.time.sync_clock(&mut self.link, &mut self.platform) {
            if self.time.clock_is_valid() {
                warn!("time sync failed, keeping current clock: {err}");
            } else {
                return self.fatal(&err.into());
            }
        }

        self.enter(BootStage::SettingsFetch);
        let fetched = self
            .settings
            .fetch(&mut self.link, &mut self.storage, &mut self.platform)
            .map(|_| ());
        match fetched {
            Ok(()) => {
                self.mark_healthy();
                self.refreshed_on = Some(self.time.local_now().date());
            }
            Err(err)
                if err.kind() == ErrorKind::Connectivity
                    && self.settings.source() == SettingsSource::Defaults =>
            {
                return self.fatal(&err);
            }
            Err(err) => warn!(
                "starting with {:?} settings: {err}",
                self.settings.source()
            ),
        }

        self.enter(BootStage::UpdateCheck);
        if self.check_for_update() == TickOutcome::Reboot {
            return BootOutcome::Rebooting;
        }

        self.enter(BootStage::Running);
        sleep(&mut self.platform, BOOT_DONE_HOLD);
        if let Err(err) = self.surface.clear() {
            warn!("could not clear strip: {err}");
        }
        info!("=== startup complete ===");
        self.drain_logs();
        BootOutcome::Running
    }

    /// One pass of the running loop. Never fails; errors skip the tick.
    ///
    /// A [`TickOutcome::Reboot`] follows a rollback or an applied update.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.platform.now();
        self.stamp_logs();

        let outcome = match self.try_tick(now) {
            Ok(outcome) => {
                self.failed_ticks = 0;
                self.good_ticks = self.good_ticks.saturating_add(1);
                if self.fault && self.good_ticks >= self.config.fault_tick_limit {
                    info!("fault cleared after {} good ticks", self.good_ticks);
                    self.fault = false;
                }
                outcome
            }
            Err(err) => {
                self.good_ticks = 0;
                self.failed_ticks = self.failed_ticks.saturating_add(1);
                warn!("tick skipped ({}): {err}", err.kind().as_str());
                if !self.fault && self.failed_ticks >= self.config.fault_tick_limit {
                    error!("fault flagged after {} failed ticks", self.failed_ticks);
                    self.fault = true;
                }
                TickOutcome::Continue
            }
        };

        self.ticks = self.ticks.wrapping_add(1);
        self.drain_logs();
        outcome
    }

    /// Start, then tick at the configured cadence until a reboot is requested
    pub fn run(&mut self) {
        if self.start() == BootOutcome::Rebooting {
            self.platform.reboot();
            return;
        }
        loop {
            if self.tick() == TickOutcome::Reboot {
                self.platform.reboot();
                return;
            }
            let timing = self.scheduler.step(self.platform.now());
            sleep(&mut self.platform, timing.sleep_duration);
        }
    }

    fn try_tick(&mut self, now: Instant) -> Result<TickOutcome, Error> {
        let level = match self.sensor.read() {
            Ok(level) => level,
            Err(fault) => {
                debug!("light sensor: {fault}, holding {}", self.sensor.level().as_str());
                self.sensor.level()
            }
        };
        let local = self.time.local_now();

        let state = CountdownState::compute(self.settings.settings(), local);
        let mode = AnimationEngine::select_mode(&state, level == LightLevel::Dark, self.fault);
        let frame = self
            .engine
            .render(mode, self.settings.settings(), &state, now);
        let displaced = self.surface.flush(frame)?;
        self.engine.reclaim(displaced);

        if self.config.heartbeat_ticks > 0 && self.ticks % self.config.heartbeat_ticks == 0 {
            info!(
                "local time {}, {} days remaining, lights {}",
                local.format("%H:%M"),
                state.days_remaining,
                if mode.is_lit() { "on" } else { "off" }
            );
        }

        if self.updates.grace_expired(now) {
            error!("new version did not become healthy in time");
            return Ok(if self.roll_back() {
                TickOutcome::Reboot
            } else {
                TickOutcome::Continue
            });
        }

        if self.sensor.is_dark()
            && self.sensor.is_stable()
            && state.in_time_range
            && self.refreshed_on != Some(state.today)
        {
            self.refreshed_on = Some(state.today);
            return self.refresh();
        }

        Ok(TickOutcome::Continue)
    }

    /// Once-a-day settings, clock and version refresh
    fn refresh(&mut self) -> Result<TickOutcome, Error> {
        info!("daily refresh");
        self.link
            .ensure_connected(&mut self.platform, &self.config.wifi)?;

        if self
            .settings
            .fetch(&mut self.link, &mut self.storage, &mut self.platform)
            .is_ok()
        {
            self.mark_healthy();
        }
        self.drain_logs();
        if let Err(err) = self.time.sync_clock(&mut self.link, &mut self.platform) {
            warn!("clock sync failed, clock keeps running: {err}");
        }
        Ok(self.check_for_update())
    }

    fn check_for_update(&mut self) -> TickOutcome {
        if self.updates.is_verifying() {
            debug!("skipping update check while verifying");
            return TickOutcome::Continue;
        }
        let mut indicator = UpdateIndicator {
            surface: &mut self.surface,
        };
        match self.updates.run(
            &mut self.link,
            &mut self.storage,
            &mut self.platform,
            self.settings.settings(),
            &mut indicator,
        ) {
            Ok(UpdateOutcome::Applied { version }) => {
                info!("rebooting into {version}");
                TickOutcome::Reboot
            }
            Ok(_) => TickOutcome::Continue,
            Err(err) => {
                warn!("update skipped: {err}");
                TickOutcome::Continue
            }
        }
    }

    /// Network is up and settings were fetched: the running version is good
    fn mark_healthy(&mut self) {
        if self.updates.is_verifying()
            && let Err(err) = self.updates.commit(&mut self.storage)
        {
            warn!("could not commit update: {err}");
        }
    }

    fn self_test(&mut self) -> Result<(), FatalHardwareFault> {
        let started = self.platform.now();
        let duration = WAVE_STEP * u32::try_from(self.config.pixels).unwrap_or(u32::MAX);
        let wave = WaveEffect::new(PROGRESS, started, duration);
        loop {
            let now = self.platform.now();
            let frame = self.engine.render_effect(EffectSlot::Wave(wave), now);
            let displaced = self.surface.flush(frame)?;
            self.engine.reclaim(displaced);
            if wave.is_done(now) {
                break;
            }
            sleep(&mut self.platform, WAVE_FRAME);
        }
        sleep(&mut self.platform, SELF_TEST_HOLD);

        for color in [color::SELF_TEST_YELLOW, color::UPDATE] {
            self.surface.fill(color)?;
            sleep(&mut self.platform, SELF_TEST_HOLD);
        }
        self.surface.clear()
    }

    fn enter(&mut self, stage: BootStage) {
        self.drain_logs();
        info!("boot stage {} -> {}", self.stage.as_str(), stage.as_str());
        self.stage = stage;
        let segments = stage.progress_segments();
        if segments == 0 {
            return;
        }
        let now = self.platform.now();
        let frame = self.engine.render_effect(
            EffectSlot::Progress(ProgressBarEffect::new(PROGRESS, segments)),
            now,
        );
        match self.surface.flush(frame) {
            Ok(displaced) => self.engine.reclaim(displaced),
            Err(err) => warn!("progress bar: {err}"),
        }
    }

    fn fatal(&mut self, err: &Error) -> BootOutcome {
        error!("{} failed: {err}", self.stage.as_str());
        self.stage = BootStage::Fatal;
        if let Err(err) = self.surface.fill(color::ERROR) {
            error!("cannot show error color: {err}");
        }
        if self.updates.is_verifying() {
            self.roll_back();
        }
        info!("rebooting in {} s", self.config.fatal_reboot_delay.as_secs());
        self.drain_logs();
        sleep(&mut self.platform, self.config.fatal_reboot_delay);
        BootOutcome::Rebooting
    }

    /// Restore the previous program. Returns whether a reboot into it is due.
    ///
    /// When the backup cannot be restored the pending update is abandoned,
    /// so the installed program keeps running instead of failing every boot.
    fn roll_back(&mut self) -> bool {
        let restored = match self.updates.rollback(&mut self.storage) {
            Ok(()) => true,
            Err(err) => {
                error!("rollback failed: {err}");
                if let Err(err) = self.updates.abandon(&mut self.storage) {
                    error!("could not clear pending update: {err}");
                }
                false
            }
        };
        self.drain_logs();
        restored
    }

    fn stamp_logs(&self) {
        if let Some(queue) = self.log_queue {
            queue.set_timestamp(self.platform.now());
        }
    }

    fn drain_logs(&mut self) {
        if let Some(queue) = self.log_queue {
            queue.drain_into(&mut self.logs);
        }
    }

    pub const fn stage(&self) -> BootStage {
        self.stage
    }

    pub const fn is_faulted(&self) -> bool {
        self.fault
    }

    pub const fn refreshed_on(&self) -> Option<NaiveDate> {
        self.refreshed_on
    }

    pub const fn mode(&self) -> Option<RenderMode> {
        self.engine.mode()
    }

    pub const fn settings(&self) -> &ConfigService {
        &self.settings
    }

    pub const fn updates(&self) -> &UpdateManager {
        &self.updates
    }

    pub const fn link(&self) -> &NetworkLink<B::Radio, B::Http> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut NetworkLink<B::Radio, B::Http> {
        &mut self.link
    }

    pub const fn surface(&self) -> &PixelSurface<B::Strip> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut PixelSurface<B::Strip> {
        &mut self.surface
    }

    pub const fn time(&self) -> &TimeService<B::Sntp, B::Rtc> {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut TimeService<B::Sntp, B::Rtc> {
        &mut self.time
    }

    pub const fn sensor(&self) -> &LightSensor<B::Sensor> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut LightSensor<B::Sensor> {
        &mut self.sensor
    }

    pub const fn indicator(&self) -> &B::Indicator {
        &self.indicator
    }

    pub const fn storage(&self) -> &B::Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut B::Storage {
        &mut self.storage
    }

    pub const fn platform(&self) -> &B::Platform {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut B::Platform {
        &mut self.platform
    }

    pub const fn logs(&self) -> &B::Logs {
        &self.logs
    }
}
