//! Events handed to the consuming application.

use std::fmt;
use std::sync::mpsc::Sender;

/// One live, unclaimed contact in a passthrough packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPoint {
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
}

/// All raw contacts of one report.
///
/// Displays as the wire text `T|id,x,y|id,x,y;timestampMs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub points: Vec<RawPoint>,
    pub timestamp_ms: i64,
}

impl RawPacket {
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            points: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn push(&mut self, tracking_id: i32, x: i32, y: i32) {
        self.points.push(RawPoint { tracking_id, x, y });
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("T")?;
        for p in &self.points {
            write!(f, "|{},{},{}", p.tracking_id, p.x, p.y)?;
        }
        write!(f, ";{}", self.timestamp_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TouchEvent {
    /// A touch entered a region; sent as soon as the match is made.
    TapDown { region: String, x: i32, y: i32 },
    /// A tap candidate has been held past the long-press delay.
    PressStart {
        region: String,
        x: i32,
        y: i32,
        down_ms: u64,
    },
    /// A touch that produced `PressStart` was lifted.
    PressEnd { region: String, x: i32, y: i32 },
    Raw(RawPacket),
}

/// Receiver of touch events. Called from the reading thread only.
pub trait EventSink: Send {
    fn emit(&mut self, event: TouchEvent);
}

impl EventSink for Vec<TouchEvent> {
    fn emit(&mut self, event: TouchEvent) {
        self.push(event);
    }
}

impl EventSink for Sender<TouchEvent> {
    fn emit(&mut self, event: TouchEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: TouchEvent) {
        (**self).emit(event);
    }
}

/// Writes every event to the log; raw packets at debug level.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: TouchEvent) {
        match event {
            TouchEvent::TapDown { region, x, y } => {
                log::info!("[event] tap {} at ({}, {})", region, x, y)
            }
            TouchEvent::PressStart {
                region,
                x,
                y,
                down_ms,
            } => log::info!(
                "[event] press start {} at ({}, {}) down@{}ms",
                region,
                x,
                y,
                down_ms
            ),
            TouchEvent::PressEnd { region, x, y } => {
                log::info!("[event] press end {} at ({}, {})", region, x, y)
            }
            TouchEvent::Raw(packet) => log::debug!("[event] {}", packet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_wire_format() {
        let mut packet = RawPacket::new(1234);
        packet.push(7, 10, 20);
        packet.push(9, -3, 0);
        assert_eq!(packet.to_string(), "T|7,10,20|9,-3,0;1234");
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut sink = tx;
        sink.emit(TouchEvent::PressEnd {
            region: "a".into(),
            x: 1,
            y: 2,
        });
        assert!(matches!(rx.recv().unwrap(), TouchEvent::PressEnd { .. }));
        drop(rx);
        sink.emit(TouchEvent::Raw(RawPacket::new(0)));
    }
}
