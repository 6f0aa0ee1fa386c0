//! Self-update with backup and rollback.
//!
//! The running program is never written in place. A new payload is staged,
//! the current program is copied to a backup, then the staged file is
//! renamed over the program in one step. A pending-update record survives
//! the reboot and counts how many boots the new version has had to prove
//! itself; rollback needs nothing but local storage.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::{cmp::Ordering, fmt, fmt::Write};

use embassy_time::{Duration, Instant};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::{
    Error, VERSION,
    config::{DeviceConfig, RetryPolicy, StoragePaths},
    error::{RemoteDataError, StorageError, UpdateFailure},
    hal::{HttpClient, Platform, Storage, WifiRadio},
    network::NetworkLink,
    settings::EventSettings,
};

/// Most components a version identifier may have
pub const MAX_VERSION_PARTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    CheckingVersion,
    Downloading,
    BackingUp,
    Applying,
    Verifying,
    Committed,
    RolledBack,
}

impl UpdatePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingVersion => "checking_version",
            Self::Downloading => "downloading",
            Self::BackingUp => "backing_up",
            Self::Applying => "applying",
            Self::Verifying => "verifying",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Phases during which the update indicator is shown
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Downloading | Self::BackingUp | Self::Applying)
    }
}

/// Dotted numeric version, compared component by component.
///
/// Missing trailing components count as zero, so `1.2` equals `1.2.0`.
#[derive(Debug, Clone)]
pub struct Version(heapless::Vec<u32, MAX_VERSION_PARTS>);

impl Version {
    pub fn parse(input: &str) -> Result<Self, RemoteDataError> {
        let trimmed = input.trim().trim_start_matches(['v', 'V']);
        let mut parts = heapless::Vec::new();
        for part in trimmed.split('.') {
            let value = part
                .parse()
                .map_err(|_| RemoteDataError::Version(input.to_string()))?;
            parts
                .push(value)
                .map_err(|_| RemoteDataError::Version(input.to_string()))?;
        }
        Ok(Self(parts))
    }

    fn part(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.part(i).cmp(&other.part(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Remote descriptor of the latest program for a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateManifest {
    pub version: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(alias = "url")]
    pub payload_url: String,
    /// Lowercase hex SHA-1 of the payload
    #[serde(default)]
    pub sha1: Option<String>,
}

/// Record written before the swap and removed once the new version is healthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub previous_version: String,
    pub new_version: String,
    pub boot_attempts: u32,
}

/// What a boot should do about a pending update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootVerdict {
    /// Nothing pending
    Normal,
    /// A new version is on probation this boot
    Verifying(PendingUpdate),
    /// The new version has used up its boots
    RollbackRequired(PendingUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Remote is not newer
    UpToDate,
    /// Remote is newer but auto-update is off
    Skipped { version: String },
    /// New program is in place; reboot to run it
    Applied { version: String },
}

/// Gets told about every phase change, e.g. to drive the update indicator
pub trait UpdateObserver<P> {
    fn on_phase(&mut self, phase: UpdatePhase, platform: &mut P);
}

impl<P> UpdateObserver<P> for () {
    fn on_phase(&mut self, _phase: UpdatePhase, _platform: &mut P) {}
}

pub struct UpdateManager {
    manifest_url_template: String,
    paths: StoragePaths,
    policy: RetryPolicy,
    min_payload_size: usize,
    max_boot_attempts: u32,
    grace_period: Duration,
    phase: UpdatePhase,
    current_version: String,
    verifying_since: Option<Instant>,
}

fn sha1_hex(data: &[u8]) -> heapless::String<40> {
    let digest = Sha1::digest(data);
    let mut out = heapless::String::new();
    for byte in digest {
        // 20 bytes as hex is exactly 40 characters
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn read_text<S: Storage>(storage: &S, path: &str) -> Result<String, StorageError> {
    let bytes = storage.read(path)?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

impl UpdateManager {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            manifest_url_template: config.manifest_url_template.clone(),
            paths: config.paths.clone(),
            policy: config.http,
            min_payload_size: config.min_payload_size,
            max_boot_attempts: config.max_update_boot_attempts.max(1),
            grace_period: config.update_grace_period,
            phase: UpdatePhase::Idle,
            current_version: VERSION.to_string(),
            verifying_since: None,
        }
    }

    pub const fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Read the installed version from storage, falling back to the built-in one
    pub fn load_current_version<S: Storage>(&mut self, storage: &S) -> &str {
        match read_text(storage, &self.paths.version) {
            Ok(version) if Version::parse(&version).is_ok() => self.current_version = version,
            Ok(version) => warn!("ignoring unparseable stored version `{version}`"),
            Err(StorageError::NotFound(_)) => {}
            Err(err) => warn!("could not read stored version: {err}"),
        }
        info!("current version {}", self.current_version);
        &self.current_version
    }

    fn set_phase<P>(&mut self, phase: UpdatePhase, observer: &mut impl UpdateObserver<P>, platform: &mut P) {
        if self.phase != phase {
            info!("update phase {} -> {}", self.phase.as_str(), phase.as_str());
            self.phase = phase;
        }
        observer.on_phase(phase, platform);
    }

    pub fn manifest_url(&self, channel: &str) -> String {
        self.manifest_url_template.replace("{channel}", channel)
    }

    /// Fetch the manifest and decide whether it is newer than what runs now
    pub fn check<R, H, P>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        platform: &mut P,
        channel: &str,
    ) -> Result<Option<UpdateManifest>, Error>
    where
        R: WifiRadio,
        H: HttpClient,
        P: Platform,
    {
        let url = self.manifest_url(channel);
        let body = link.get_with_retry(platform, &self.policy, &url)?;
        let manifest: UpdateManifest =
            serde_json::from_slice(&body).map_err(RemoteDataError::from)?;

        if let Some(found) = manifest.channel.as_deref()
            && found != channel
        {
            return Err(RemoteDataError::ChannelMismatch {
                expected: channel.to_string(),
                found: found.to_string(),
            }
            .into());
        }

        let remote = Version::parse(&manifest.version)?;
        let local = Version::parse(&self.current_version)?;
        info!("remote version {remote}, local version {local}");

        if remote > local {
            Ok(Some(manifest))
        } else {
            Ok(None)
        }
    }

    /// Run one pass of the update state machine.
    ///
    /// Returns with the phase back at `Idle` unless a new program was put in
    /// place, in which case the phase is `Verifying` and the caller must
    /// reboot.
    pub fn run<R, H, S, P, O>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        storage: &mut S,
        platform: &mut P,
        settings: &EventSettings,
        observer: &mut O,
    ) -> Result<UpdateOutcome, Error>
    where
        R: WifiRadio,
        H: HttpClient,
        S: Storage,
        P: Platform,
        O: UpdateObserver<P>,
    {
        self.set_phase(UpdatePhase::CheckingVersion, observer, platform);
        let manifest = match self.check(link, platform, &settings.update_branch) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                info!("already on the latest version");
                self.set_phase(UpdatePhase::Idle, observer, platform);
                return Ok(UpdateOutcome::UpToDate);
            }
            Err(err) => {
                warn!("update check failed: {err}");
                self.set_phase(UpdatePhase::Idle, observer, platform);
                return Err(err);
            }
        };

        if !settings.auto_update {
            info!("version {} available but auto-update is off", manifest.version);
            self.set_phase(UpdatePhase::Idle, observer, platform);
            return Ok(UpdateOutcome::Skipped {
                version: manifest.version,
            });
        }

        match self.install(link, storage, platform, &manifest, observer) {
            Ok(()) => {
                info!("version {} installed, reboot to verify", manifest.version);
                self.set_phase(UpdatePhase::Verifying, observer, platform);
                Ok(UpdateOutcome::Applied {
                    version: manifest.version,
                })
            }
            Err(err) => {
                error!("update to {} failed: {err}", manifest.version);
                if storage.exists(&self.paths.staging) {
                    let _ = storage.remove(&self.paths.staging);
                }
                self.set_phase(UpdatePhase::Idle, observer, platform);
                Err(err.into())
            }
        }
    }

    fn install<R, H, S, P, O>(
        &mut self,
        link: &mut NetworkLink<R, H>,
        storage: &mut S,
        platform: &mut P,
        manifest: &UpdateManifest,
        observer: &mut O,
    ) -> Result<(), UpdateFailure>
    where
        R: WifiRadio,
        H: HttpClient,
        S: Storage,
        P: Platform,
        O: UpdateObserver<P>,
    {
        self.set_phase(UpdatePhase::Downloading, observer, platform);
        let payload = link
            .get_with_retry(platform, &self.policy, &manifest.payload_url)
            .map_err(UpdateFailure::Download)?;
        self.verify_payload(&payload, manifest)?;
        storage
            .write(&self.paths.staging, &payload)
            .map_err(UpdateFailure::Apply)?;
        info!("downloaded {} bytes", payload.len());

        self.set_phase(UpdatePhase::BackingUp, observer, platform);
        let running = storage
            .read(&self.paths.program)
            .map_err(UpdateFailure::Backup)?;
        storage
            .write(&self.paths.backup, &running)
            .map_err(UpdateFailure::Backup)?;

        self.set_phase(UpdatePhase::Applying, observer, platform);
        let pending = PendingUpdate {
            previous_version: self.current_version.clone(),
            new_version: manifest.version.clone(),
            boot_attempts: 0,
        };
        self.write_pending(storage, &pending)
            .map_err(UpdateFailure::Apply)?;
        if let Err(err) = storage.write(&self.paths.version, manifest.version.as_bytes()) {
            let _ = storage.remove(&self.paths.pending_update);
            return Err(UpdateFailure::Apply(err));
        }
        if let Err(err) = storage.rename(&self.paths.staging, &self.paths.program) {
            if let Err(err) = storage.write(&self.paths.version, self.current_version.as_bytes()) {
                error!("could not restore version record: {err}");
            }
            let _ = storage.remove(&self.paths.pending_update);
            return Err(UpdateFailure::Apply(err));
        }
        Ok(())
    }

    fn verify_payload(&self, payload: &[u8], manifest: &UpdateManifest) -> Result<(), UpdateFailure> {
        if payload.len() < self.min_payload_size {
            return Err(UpdateFailure::PayloadTooSmall {
                size: payload.len(),
                min: self.min_payload_size,
            });
        }
        if let Some(expected) = manifest.sha1.as_deref()
            && !sha1_hex(payload).eq_ignore_ascii_case(expected.trim())
        {
            return Err(UpdateFailure::ChecksumMismatch);
        }
        Ok(())
    }

    fn write_pending<S: Storage>(&self, storage: &mut S, pending: &PendingUpdate) -> Result<(), StorageError> {
        let encoded: Vec<u8> = serde_json::to_vec(pending).map_err(|err| StorageError::Io {
            path: self.paths.pending_update.clone(),
            reason: err.to_string(),
        })?;
        storage.write(&self.paths.pending_update, &encoded)
    }

    fn read_pending<S: Storage>(&self, storage: &S) -> Option<PendingUpdate> {
        let bytes = match storage.read(&self.paths.pending_update) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return None,
            Err(err) => {
                warn!("could not read pending update record: {err}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(pending) => Some(pending),
            Err(err) => {
                warn!("discarding unreadable pending update record: {err}");
                None
            }
        }
    }

    /// Account for this boot against any pending update.
    ///
    /// Each boot of a new version uses up one attempt. A version that has
    /// used them all without being committed must be rolled back.
    pub fn begin_boot<S: Storage>(&mut self, storage: &mut S, now: Instant) -> BootVerdict {
        let Some(mut pending) = self.read_pending(storage) else {
            return BootVerdict::Normal;
        };

        if pending.boot_attempts >= self.max_boot_attempts {
            warn!(
                "version {} failed {} boots",
                pending.new_version, pending.boot_attempts
            );
            return BootVerdict::RollbackRequired(pending);
        }

        pending.boot_attempts += 1;
        if let Err(err) = self.write_pending(storage, &pending) {
            warn!("could not record boot attempt: {err}");
        }
        info!(
            "verifying version {} (boot {}/{})",
            pending.new_version, pending.boot_attempts, self.max_boot_attempts
        );
        self.phase = UpdatePhase::Verifying;
        self.verifying_since = Some(now);
        BootVerdict::Verifying(pending)
    }

    pub const fn is_verifying(&self) -> bool {
        matches!(self.phase, UpdatePhase::Verifying)
    }

    /// Whether a version on probation has run out of time this boot
    pub fn grace_expired(&self, now: Instant) -> bool {
        match self.verifying_since {
            Some(since) if self.is_verifying() => {
                now.saturating_duration_since(since) >= self.grace_period
            }
            _ => false,
        }
    }

    /// Accept the running version as healthy
    pub fn commit<S: Storage>(&mut self, storage: &mut S) -> Result<(), StorageError> {
        if !self.is_verifying() {
            return Ok(());
        }
        match storage.remove(&self.paths.pending_update) {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        info!(
            "version {} committed, update phase {} -> {}",
            self.current_version,
            UpdatePhase::Committed.as_str(),
            UpdatePhase::Idle.as_str()
        );
        self.verifying_since = None;
        self.phase = UpdatePhase::Idle;
        Ok(())
    }

    /// Put the backed-up program back and restore the previous version id.
    ///
    /// Uses local storage only. The caller reboots afterwards.
    pub fn rollback<S: Storage>(&mut self, storage: &mut S) -> Result<(), UpdateFailure> {
        if !storage.exists(&self.paths.backup) {
            return Err(UpdateFailure::BackupMissing);
        }
        let pending = self.read_pending(storage);

        let backup = storage
            .read(&self.paths.backup)
            .map_err(UpdateFailure::Restore)?;
        storage
            .write(&self.paths.staging, &backup)
            .map_err(UpdateFailure::Restore)?;
        storage
            .rename(&self.paths.staging, &self.paths.program)
            .map_err(UpdateFailure::Restore)?;

        if let Some(pending) = pending {
            storage
                .write(&self.paths.version, pending.previous_version.as_bytes())
                .map_err(UpdateFailure::Restore)?;
            error!(
                "rolled back from {} to {}",
                pending.new_version, pending.previous_version
            );
            self.current_version = pending.previous_version;
        } else {
            error!("restored backup program");
        }

        match storage.remove(&self.paths.pending_update) {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(err) => warn!("could not clear pending update record: {err}"),
        }
        self.phase = UpdatePhase::RolledBack;
        self.verifying_since = None;
        Ok(())
    }

    /// Give up on a pending update that cannot be rolled back.
    ///
    /// The installed program stays in place and is treated as current, so
    /// later boots start normally instead of retrying the rollback.
    pub fn abandon<S: Storage>(&mut self, storage: &mut S) -> Result<(), StorageError> {
        match storage.remove(&self.paths.pending_update) {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        error!("abandoned pending update, keeping version {}", self.current_version);
        self.phase = UpdatePhase::Idle;
        self.verifying_since = None;
        Ok(())
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }
}
