mod permission;

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use evdevil::event::Abs;
use evdevil::Evdev;

use crate::error::{Error, Result};

pub use permission::{PermissionRepair, SuChmod};

/// Native axis ranges of the touch panel, read once per session.
///
/// A maximum of 0 means the range could not be queried; the mapper then
/// leaves that axis unscaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub max_x: i32,
    pub max_y: i32,
}

impl Calibration {
    /// Query `ABS_MT_POSITION_X/Y` maxima from the device.
    pub fn probe(path: &Path) -> Self {
        let evdev = match Evdev::open(path) {
            Ok(evdev) => evdev,
            Err(e) => {
                log::warn!("[device] cannot query axis ranges of {}: {}", path.display(), e);
                return Self::default();
            }
        };
        if let Ok(name) = evdev.name() {
            log::info!("[device] {} is \"{}\"", path.display(), name);
        }

        let axis_max = |abs: Abs, label: &str| match evdev.abs_info(abs) {
            Ok(info) => {
                log::info!(
                    "[device] {} range: min={}, max={}",
                    label,
                    info.minimum(),
                    info.maximum()
                );
                info.maximum()
            }
            Err(e) => {
                log::warn!("[device] no {} range: {}", label, e);
                0
            }
        };

        Self {
            max_x: axis_max(Abs::MT_POSITION_X, "ABS_MT_POSITION_X"),
            max_y: axis_max(Abs::MT_POSITION_Y, "ABS_MT_POSITION_Y"),
        }
    }
}

/// Open the device node read-only and non-blocking.
pub fn open_nonblocking(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// Open the touch device, repairing permissions once if access is denied.
///
/// `open` is the raw opener; the service passes [`open_nonblocking`].
pub fn open_touch_device<F, T>(
    path: &Path,
    repair: &dyn PermissionRepair,
    retry_delay: Duration,
    mut open: F,
) -> Result<T>
where
    F: FnMut(&Path) -> io::Result<T>,
{
    let first = match open(path) {
        Ok(handle) => {
            log::info!("[device] opened {}", path.display());
            return Ok(handle);
        }
        Err(e) => e,
    };

    if first.kind() != io::ErrorKind::PermissionDenied {
        return Err(Error::DeviceUnavailable {
            path: path.to_path_buf(),
            source: first,
        });
    }

    log::warn!(
        "[device] opening {} failed: {}; attempting permission repair",
        path.display(),
        first
    );
    if let Err(e) = repair.repair(path) {
        log::warn!("[device] {}", e);
    }
    std::thread::sleep(retry_delay);

    match open(path) {
        Ok(handle) => {
            log::info!("[device] opened {} after permission repair", path.display());
            Ok(handle)
        }
        Err(source) => Err(Error::DeviceUnavailable {
            path: path.to_path_buf(),
            source,
        }),
    }
}
