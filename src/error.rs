//! Error types for the controller.
//!
//! Each failure class has its own enum so components can say precisely what
//! went wrong. [`Error`] wraps them for the supervisor, which decides whether
//! a failure is tick-local or boot-fatal.

use alloc::string::String;

use thiserror::Error;

/// Joining the wireless network or talking over it failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    /// A network call was requested while the link is down
    #[error("network link is down")]
    NotConnected,

    /// Every association attempt timed out or failed
    #[error("association with `{ssid}` failed after {attempts} attempts")]
    AttemptsExhausted { ssid: String, attempts: u32 },

    /// The radio rejected the request outright
    #[error("radio error: {0}")]
    Radio(String),

    /// No answer within the allowed time
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Lower-level transport failure (DNS, TCP, TLS...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with something other than 200
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// A remote document (settings or manifest) could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteDataError {
    /// Body is not valid JSON or a field has the wrong JSON type
    #[error("malformed document: {0}")]
    Malformed(String),

    /// A field parsed but failed its format or range check
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Target date is not after the start date
    #[error("countdown must last at least one day, got {0}")]
    EmptyCountdown(i64),

    /// Manifest was published for another update channel
    #[error("manifest targets channel `{found}`, expected `{expected}`")]
    ChannelMismatch { expected: String, found: String },

    /// Version identifier is not dotted numeric
    #[error("unparseable version `{0}`")]
    Version(String),
}

/// The light sensor produced no usable reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("analog read failed")]
    ReadFailed,

    #[error("reading {0} is outside the valid range")]
    OutOfRange(u16),
}

/// Reading or writing local storage failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("`{0}` not found")]
    NotFound(String),

    #[error("storage I/O failed on `{path}`: {reason}")]
    Io { path: String, reason: String },
}

/// A program update could not be applied, or the new program proved bad.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateFailure {
    #[error("download failed: {0}")]
    Download(ConnectivityError),

    #[error("payload of {size} bytes is below the {min} byte minimum")]
    PayloadTooSmall { size: usize, min: usize },

    #[error("payload checksum does not match the manifest")]
    ChecksumMismatch,

    #[error("backing up the running program failed: {0}")]
    Backup(StorageError),

    #[error("activating the new program failed: {0}")]
    Apply(StorageError),

    #[error("no backup is available to roll back to")]
    BackupMissing,

    #[error("restoring the backup failed: {0}")]
    Restore(StorageError),
}

/// The strip or another core peripheral is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalHardwareFault {
    #[error("LED strip write failed: {0}")]
    Strip(String),
}

/// Any failure a component can surface to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    RemoteData(#[from] RemoteDataError),

    #[error(transparent)]
    Sensor(#[from] SensorFault),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Update(#[from] UpdateFailure),

    #[error(transparent)]
    Hardware(#[from] FatalHardwareFault),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connectivity,
    RemoteData,
    Sensor,
    Storage,
    Update,
    Hardware,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::RemoteData(_) => ErrorKind::RemoteData,
            Self::Sensor(_) => ErrorKind::Sensor,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Update(_) => ErrorKind::Update,
            Self::Hardware(_) => ErrorKind::Hardware,
        }
    }
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::RemoteData => "remote_data",
            Self::Sensor => "sensor",
            Self::Storage => "storage",
            Self::Update => "update",
            Self::Hardware => "hardware",
        }
    }
}

impl From<serde_json::Error> for RemoteDataError {
    fn from(err: serde_json::Error) -> Self {
        use alloc::string::ToString;
        RemoteDataError::Malformed(err.to_string())
    }
}
