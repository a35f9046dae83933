use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device node could not be opened, even after a permission repair attempt.
    #[error("touch device {} unavailable: {source}", .path.display())]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Logged only; the open is retried regardless.
    #[error("permission repair for {} failed: {reason}", .path.display())]
    PermissionRepairFailed { path: PathBuf, reason: String },

    #[error("touch device removed")]
    DeviceRemoved,

    #[error("touch device I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported input_event record size {0} (expected 16 or 24)")]
    UnsupportedRecordSize(usize),

    #[error("malformed region update: {0}")]
    MalformedRegionUpdate(String),

    /// Logged only; the event is applied to slot 0.
    #[error("slot index {0} out of range, using slot 0")]
    OutOfRangeSlot(i32),
}
