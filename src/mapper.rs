//! Device-axis to screen-pixel mapping.
//!
//! The panel is mounted rotated by 90°: the device Y axis runs along the
//! screen width and the device X axis runs against the screen height.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::device::Calibration;

/// Screen size and the offset of the drawable area, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Screen {
    pub width: i32,
    pub height: i32,
    pub top_offset: i32,
    pub left_offset: i32,
}

/// Map a raw (x, y) sample to screen pixels.
///
/// An axis whose calibration maximum is 0 is left unscaled. Results outside
/// the `i32` range saturate.
pub fn to_screen(x: i32, y: i32, calibration: Calibration, screen: Screen) -> (i32, i32) {
    let (x, y) = (x as i64, y as i64);
    let max_x = calibration.max_x as i64;
    let max_y = calibration.max_y as i64;

    let rotated_x = if max_y > 0 {
        y * screen.width as i64 / max_y
    } else {
        y
    };
    let rotated_y = if max_x > 0 {
        (max_x - x) * screen.height as i64 / max_x
    } else {
        max_x - x
    };

    (
        saturate(rotated_x - screen.left_offset as i64),
        saturate(rotated_y - screen.top_offset as i64),
    )
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Screen geometry shared with the reading thread.
///
/// Each field is its own atomic: a reader may observe a new width with an old
/// offset for one report, which is acceptable for values that change rarely.
#[derive(Debug, Default)]
pub struct ScreenGeometry {
    width: AtomicI32,
    height: AtomicI32,
    top_offset: AtomicI32,
    left_offset: AtomicI32,
}

impl ScreenGeometry {
    pub fn new(screen: Screen) -> Self {
        let geometry = Self::default();
        geometry.set_dimensions(screen.width, screen.height);
        geometry.set_offsets(screen.top_offset, screen.left_offset);
        geometry
    }

    pub fn set_dimensions(&self, width: i32, height: i32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
        log::info!("[screen] dimensions {}x{}", width, height);
    }

    pub fn set_offsets(&self, top: i32, left: i32) {
        self.top_offset.store(top, Ordering::Relaxed);
        self.left_offset.store(left, Ordering::Relaxed);
        log::info!("[screen] offsets top={} left={}", top, left);
    }

    pub fn snapshot(&self) -> Screen {
        Screen {
            width: self.width.load(Ordering::Relaxed),
            height: self.height.load(Ordering::Relaxed),
            top_offset: self.top_offset.load(Ordering::Relaxed),
            left_offset: self.left_offset.load(Ordering::Relaxed),
        }
    }
}
