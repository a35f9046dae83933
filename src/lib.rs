//! Low-latency multitouch reader.
//!
//! Reads raw multitouch events from a Linux input device node on a dedicated
//! thread, maps contacts into screen pixels, and turns touches that land in
//! configured screen regions into tap and long-press events. All other
//! contacts are forwarded as a raw passthrough stream.

pub mod clock;
pub mod config;
pub mod device;
pub mod dump;
pub mod error;
pub mod event;
pub mod input;
pub mod mapper;
pub mod region;
pub mod service;
pub mod touch;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::Config;
pub use device::{Calibration, PermissionRepair, SuChmod};
pub use error::{Error, Result};
pub use event::{EventSink, LogSink, RawPacket, RawPoint, TouchEvent};
pub use mapper::{to_screen, Screen, ScreenGeometry};
pub use region::{hit_test, parse_regions, Region, RegionStore};
pub use service::TouchService;
pub use touch::{Layout, TouchTracker};
