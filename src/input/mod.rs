mod event;
mod reader;

pub use event::*;
pub use reader::{DeviceReader, Readiness};
