use std::path::PathBuf;
use std::time::Duration;

/// Touch device node read when no other path is given.
pub const TOUCH_DEVICE: &str = "/dev/input/event4";

/// Hardware MT slots tracked; higher slot indices are folded onto slot 0.
pub const MAX_SLOTS: usize = 10;

pub const LONG_PRESS_DELAY: Duration = Duration::from_millis(150);
pub const POLL_TIMEOUT: Duration = Duration::from_millis(1);
pub const PERMISSION_RETRY_DELAY: Duration = Duration::from_millis(200);
pub const READ_CHUNK_RECORDS: usize = 64;

/// Size of `struct input_event` on the running kernel.
pub const NATIVE_RECORD_SIZE: usize = std::mem::size_of::<libc::input_event>();

/// Settings for one touch service. Fixed once the service is built.
#[derive(Debug, Clone)]
pub struct Config {
    pub device_path: PathBuf,
    /// Upper bound on how long the reader blocks in `poll`; also bounds stop latency.
    pub poll_timeout: Duration,
    pub long_press_delay: Duration,
    pub permission_retry_delay: Duration,
    pub read_chunk_records: usize,
    pub record_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(TOUCH_DEVICE),
            poll_timeout: POLL_TIMEOUT,
            long_press_delay: LONG_PRESS_DELAY,
            permission_retry_delay: PERMISSION_RETRY_DELAY,
            read_chunk_records: READ_CHUNK_RECORDS,
            record_size: NATIVE_RECORD_SIZE,
        }
    }
}

impl Config {
    pub fn with_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    pub(crate) fn read_chunk_bytes(&self) -> usize {
        self.record_size * self.read_chunk_records.max(1)
    }
}
