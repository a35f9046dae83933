//! Multitouch (protocol type B) slot tracking, region classification and
//! long-press timing.
//!
//! Every report boundary maps each live contact to screen pixels, tries to
//! attribute still-unmatched contacts to a region, and forwards all live
//! contacts as one raw packet. Long-press expiry is checked on every loop pass
//! so it does not wait for the next report.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::MAX_SLOTS;
use crate::device::Calibration;
use crate::error::Error;
use crate::event::{EventSink, RawPacket, TouchEvent};
use crate::input::{
    Record, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, EV_ABS,
};
use crate::mapper::{to_screen, ScreenGeometry};
use crate::region::{hit_test, RegionStore};

/// Screen state the tracker reads but never writes.
#[derive(Debug, Default)]
pub struct Layout {
    pub regions: RegionStore,
    pub screen: ScreenGeometry,
}

/// Whether a contact has been attributed to a region. Only moves forward
/// until the slot is freed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Attribution {
    #[default]
    Unmatched,
    TapCandidate { region: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LongPress {
    #[default]
    Idle,
    Awaiting,
    Signaled,
}

#[derive(Debug, Clone, Default)]
struct TouchSlot {
    /// `None` while the slot is free.
    tracking_id: Option<i32>,
    raw_x: i32,
    raw_y: i32,
    attribution: Attribution,
    long_press: LongPress,
    down_ms: u64,
    /// Screen position at the last hit test; frozen once matched.
    down_x: i32,
    down_y: i32,
}

impl TouchSlot {
    fn begin(&mut self, tracking_id: i32, now_ms: u64) {
        *self = Self {
            tracking_id: Some(tracking_id),
            raw_x: self.raw_x,
            raw_y: self.raw_y,
            down_ms: now_ms,
            ..Self::default()
        };
    }

    /// Free the slot, keeping the raw sample, and hand back the finished lifecycle.
    fn release(&mut self) -> Self {
        let free = Self {
            raw_x: self.raw_x,
            raw_y: self.raw_y,
            ..Self::default()
        };
        std::mem::replace(self, free)
    }
}

/// Consumes decoded input records and emits [`TouchEvent`]s.
pub struct TouchTracker<C> {
    slots: [TouchSlot; MAX_SLOTS],
    current_slot: usize,
    /// Set by any tracking-id or position change; cleared at the next report.
    dirty: bool,
    calibration: Calibration,
    layout: Arc<Layout>,
    clock: C,
    long_press_delay_ms: u64,
    report_count: u64,
}

impl<C: Clock> TouchTracker<C> {
    pub fn new(calibration: Calibration, layout: Arc<Layout>, clock: C, long_press_delay_ms: u64) -> Self {
        Self {
            slots: Default::default(),
            current_slot: 0,
            dirty: false,
            calibration,
            layout,
            clock,
            long_press_delay_ms,
            report_count: 0,
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.tracking_id.is_some()).count()
    }

    pub fn process(&mut self, record: &Record, sink: &mut dyn EventSink) {
        if record.kind == EV_ABS {
            self.process_abs_event(record.code, record.value, sink);
        } else if record.is_report() && self.dirty {
            self.process_report(record.time_ms, sink);
            self.dirty = false;
        }
    }

    fn process_abs_event(&mut self, code: u16, value: i32, sink: &mut dyn EventSink) {
        match code {
            ABS_MT_SLOT => {
                // Out-of-range slots alias onto slot 0 rather than being dropped.
                self.current_slot = match usize::try_from(value) {
                    Ok(slot) if slot < MAX_SLOTS => slot,
                    _ => {
                        log::warn!("[touch] {}", Error::OutOfRangeSlot(value));
                        0
                    }
                };
            }
            ABS_MT_TRACKING_ID => {
                if value == -1 {
                    self.release_current(sink);
                } else {
                    let now = self.clock.now_ms();
                    self.slots[self.current_slot].begin(value, now);
                }
                self.dirty = true;
            }
            ABS_MT_POSITION_X => {
                self.slots[self.current_slot].raw_x = value;
                self.dirty = true;
            }
            ABS_MT_POSITION_Y => {
                self.slots[self.current_slot].raw_y = value;
                self.dirty = true;
            }
            _ => {}
        }
    }

    fn release_current(&mut self, sink: &mut dyn EventSink) {
        let slot = self.current_slot;
        let done = self.slots[slot].release();
        if done.tracking_id.is_none() {
            return;
        }
        let Attribution::TapCandidate { region } = done.attribution else {
            return;
        };
        if done.long_press != LongPress::Signaled {
            return;
        }

        let (x, y) = to_screen(
            done.raw_x,
            done.raw_y,
            self.calibration,
            self.layout.screen.snapshot(),
        );
        log::info!("[touch] slot {} long press end: {}", slot, region);
        sink.emit(TouchEvent::PressEnd { region, x, y });
    }

    fn process_report(&mut self, time_ms: i64, sink: &mut dyn EventSink) {
        let regions = self.layout.regions.snapshot();
        let screen = self.layout.screen.snapshot();
        let timestamp_ms = if time_ms == 0 {
            self.clock.now_ms() as i64
        } else {
            time_ms
        };

        let mut packet = RawPacket::new(timestamp_ms);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(tracking_id) = slot.tracking_id else {
                continue;
            };
            let (x, y) = to_screen(slot.raw_x, slot.raw_y, self.calibration, screen);

            if slot.attribution == Attribution::Unmatched {
                slot.down_x = x;
                slot.down_y = y;
                if let Some(region) = hit_test(&regions, x, y) {
                    log::info!(
                        "[touch] slot {} hit region {} at ({}, {})",
                        index,
                        region.id,
                        x,
                        y
                    );
                    slot.attribution = Attribution::TapCandidate {
                        region: region.id.clone(),
                    };
                    slot.long_press = LongPress::Awaiting;
                    sink.emit(TouchEvent::TapDown {
                        region: region.id.clone(),
                        x,
                        y,
                    });
                }
            }

            packet.push(tracking_id, x, y);
        }

        let contacts = packet.points.len();
        if !packet.is_empty() {
            sink.emit(TouchEvent::Raw(packet));
        }
        self.log_report_progress(contacts);
    }

    /// Fire `PressStart` for every tap candidate held past the delay.
    /// Fires at most once per touch.
    pub fn check_long_press(&mut self, sink: &mut dyn EventSink) {
        let now = self.clock.now_ms();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.tracking_id.is_none() || slot.long_press != LongPress::Awaiting {
                continue;
            }
            let Attribution::TapCandidate { region } = &slot.attribution else {
                continue;
            };

            let held = now.saturating_sub(slot.down_ms);
            if held < self.long_press_delay_ms {
                continue;
            }

            log::info!(
                "[touch] slot {} long press start after {} ms: {}",
                index,
                held,
                region
            );
            sink.emit(TouchEvent::PressStart {
                region: region.clone(),
                x: slot.down_x,
                y: slot.down_y,
                down_ms: slot.down_ms,
            });
            slot.long_press = LongPress::Signaled;
        }
    }

    fn log_report_progress(&mut self, contacts: usize) {
        if self.report_count == 0 {
            log::info!("[touch] events flowing");
        }
        self.report_count += 1;

        if self.report_count % 500 == 0 {
            log::debug!("[touch] reports: {}, contacts: {}", self.report_count, contacts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::input::{EV_SYN, SYN_REPORT};
    use crate::mapper::Screen;
    use crate::region::Region;

    // Identity-like mapping: screen = 1000x1000, device = 1000x1000, so
    // screen_x = raw_y and screen_y = 1000 - raw_x.
    const CAL: Calibration = Calibration {
        max_x: 1000,
        max_y: 1000,
    };

    fn layout(regions: Vec<Region>) -> Arc<Layout> {
        Arc::new(Layout {
            regions: RegionStore::new(regions),
            screen: ScreenGeometry::new(Screen {
                width: 1000,
                height: 1000,
                top_offset: 0,
                left_offset: 0,
            }),
        })
    }

    struct Harness {
        tracker: TouchTracker<ManualClock>,
        clock: ManualClock,
        events: Vec<TouchEvent>,
    }

    impl Harness {
        fn new(regions: Vec<Region>) -> Self {
            let clock = ManualClock::new(1_000);
            Self {
                tracker: TouchTracker::new(CAL, layout(regions), clock.clone(), 150),
                clock,
                events: Vec::new(),
            }
        }

        fn abs(&mut self, code: u16, value: i32) {
            self.tracker
                .process(&Record::new(EV_ABS, code, value), &mut self.events);
        }

        fn report(&mut self) {
            self.tracker
                .process(&Record::new(EV_SYN, SYN_REPORT, 0).with_time_ms(42), &mut self.events);
            self.tracker.check_long_press(&mut self.events);
        }

        /// Put a finger down at screen (sx, sy).
        fn down(&mut self, slot: i32, id: i32, sx: i32, sy: i32) {
            self.abs(ABS_MT_SLOT, slot);
            self.abs(ABS_MT_TRACKING_ID, id);
            self.abs(ABS_MT_POSITION_X, 1000 - sy);
            self.abs(ABS_MT_POSITION_Y, sx);
        }

        fn up(&mut self, slot: i32) {
            self.abs(ABS_MT_SLOT, slot);
            self.abs(ABS_MT_TRACKING_ID, -1);
        }

        fn tick(&mut self, ms: u64) {
            self.clock.advance(ms);
            self.tracker.check_long_press(&mut self.events);
        }

        fn semantic(&self) -> Vec<&TouchEvent> {
            self.events
                .iter()
                .filter(|e| !matches!(e, TouchEvent::Raw(_)))
                .collect()
        }

        fn raw(&self) -> Vec<&RawPacket> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    TouchEvent::Raw(p) => Some(p),
                    _ => None,
                })
                .collect()
        }
    }

    fn button() -> Region {
        Region::new("btn1", 100, 200, 50, 50)
    }

    #[test]
    fn tap_fires_at_first_matching_report() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 5, 110, 210);
        assert!(h.events.is_empty());
        h.report();

        assert_eq!(
            h.semantic(),
            vec![&TouchEvent::TapDown {
                region: "btn1".into(),
                x: 110,
                y: 210
            }]
        );
        // Tap candidates stay in the raw stream while down.
        assert_eq!(h.raw()[0].to_string(), "T|5,110,210;42");
    }

    #[test]
    fn long_press_fires_once_after_delay() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 5, 110, 210);
        h.report();

        h.tick(149);
        assert_eq!(h.semantic().len(), 1);

        h.tick(1);
        h.tick(100);
        h.tick(1_000);
        let starts: Vec<_> = h
            .semantic()
            .into_iter()
            .filter(|e| matches!(e, TouchEvent::PressStart { .. }))
            .cloned()
            .collect();
        assert_eq!(
            starts,
            vec![TouchEvent::PressStart {
                region: "btn1".into(),
                x: 110,
                y: 210,
                down_ms: 1_000
            }]
        );
    }

    #[test]
    fn release_after_long_press_sends_press_end_at_release_position() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 5, 110, 210);
        h.report();
        h.tick(160);

        // Drift, then lift without a report in between.
        h.abs(ABS_MT_POSITION_Y, 130);
        h.tick(10);
        h.up(0);
        h.report();

        let last = h.semantic().last().cloned().cloned();
        assert_eq!(
            last,
            Some(TouchEvent::PressEnd {
                region: "btn1".into(),
                x: 130,
                y: 210
            })
        );
        // The only contact is gone, so the release report has no packet.
        assert_eq!(h.raw().len(), 1);
        assert_eq!(h.tracker.active_count(), 0);
    }

    #[test]
    fn quick_tap_release_has_no_press_end() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 5, 110, 210);
        h.report();
        h.tick(50);
        h.up(0);
        h.report();
        h.tick(500);

        assert_eq!(h.semantic().len(), 1);
        assert!(matches!(h.semantic()[0], TouchEvent::TapDown { .. }));
    }

    #[test]
    fn touch_outside_regions_only_streams_raw() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 9, 500, 500);
        h.report();
        h.tick(25);
        h.abs(ABS_MT_POSITION_X, 490);
        h.report();
        h.tick(25);
        h.up(0);
        h.report();

        assert!(h.semantic().is_empty());
        let raw: Vec<String> = h.raw().iter().map(|p| p.to_string()).collect();
        assert_eq!(raw, vec!["T|9,500,500;42", "T|9,500,510;42"]);
    }

    #[test]
    fn touch_moving_into_region_becomes_candidate() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 1, 50, 210);
        h.report();
        assert!(h.semantic().is_empty());

        h.abs(ABS_MT_POSITION_Y, 120);
        h.report();
        assert_eq!(
            h.semantic(),
            vec![&TouchEvent::TapDown {
                region: "btn1".into(),
                x: 120,
                y: 210
            }]
        );

        // Once matched, moving within or out of the region does not re-tap.
        h.abs(ABS_MT_POSITION_Y, 600);
        h.report();
        assert_eq!(h.semantic().len(), 1);
    }

    #[test]
    fn overlapping_regions_prefer_list_order() {
        let regions = vec![
            Region::new("first", 0, 0, 400, 400),
            Region::new("second", 100, 100, 50, 50),
        ];
        let mut h = Harness::new(regions);
        h.down(0, 1, 120, 120);
        h.report();
        assert!(matches!(
            h.semantic()[0],
            TouchEvent::TapDown { region, .. } if region == "first"
        ));
    }

    #[test]
    fn no_report_without_changes() {
        let mut h = Harness::new(vec![]);
        h.down(0, 1, 10, 10);
        h.report();
        h.report();
        h.report();
        assert_eq!(h.raw().len(), 1);
    }

    #[test]
    fn zero_report_time_falls_back_to_clock() {
        let mut h = Harness::new(vec![]);
        h.down(0, 1, 10, 10);
        h.tracker
            .process(&Record::new(EV_SYN, SYN_REPORT, 0), &mut h.events);
        assert_eq!(h.raw()[0].timestamp_ms, 1_000);
    }

    #[test]
    fn multiple_fingers_share_one_packet() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 11, 110, 210);
        h.down(3, 12, 700, 700);
        h.report();
        assert_eq!(h.raw()[0].to_string(), "T|11,110,210|12,700,700;42");

        h.up(0);
        h.report();
        assert_eq!(h.raw()[1].to_string(), "T|12,700,700;42");
    }

    #[test]
    fn out_of_range_slot_aliases_onto_slot_zero() {
        let mut h = Harness::new(vec![]);
        h.down(0, 1, 10, 10);
        h.report();

        h.abs(ABS_MT_SLOT, 42);
        h.abs(ABS_MT_POSITION_Y, 300);
        h.report();
        assert_eq!(h.raw()[1].to_string(), "T|1,300,10;42");

        h.abs(ABS_MT_SLOT, -3);
        h.abs(ABS_MT_TRACKING_ID, -1);
        h.report();
        assert_eq!(h.tracker.active_count(), 0);
    }

    #[test]
    fn new_tracking_id_restarts_lifecycle() {
        let mut h = Harness::new(vec![button()]);
        h.down(0, 1, 110, 210);
        h.report();
        h.tick(200);

        // Same slot, new contact without an explicit release.
        h.clock.advance(10);
        h.abs(ABS_MT_TRACKING_ID, 2);
        h.report();
        h.tick(150);

        let taps = h
            .semantic()
            .iter()
            .filter(|e| matches!(e, TouchEvent::TapDown { .. }))
            .count();
        let starts = h
            .semantic()
            .iter()
            .filter(|e| matches!(e, TouchEvent::PressStart { .. }))
            .count();
        assert_eq!((taps, starts), (2, 2));
    }

    #[test]
    fn lifecycle_event_counts_are_bounded() {
        let mut h = Harness::new(vec![button()]);
        for id in 0..20 {
            h.down(0, id, 110, 210);
            h.report();
            for _ in 0..10 {
                h.tick(30);
                h.abs(ABS_MT_POSITION_X, 790 - (id % 3));
                h.report();
            }
            h.up(0);
            h.report();
        }

        let mut per_touch = Vec::new();
        for e in h.semantic() {
            match e {
                TouchEvent::TapDown { .. } => per_touch.push(vec!['t']),
                TouchEvent::PressStart { .. } => per_touch.last_mut().unwrap().push('s'),
                TouchEvent::PressEnd { .. } => per_touch.last_mut().unwrap().push('e'),
                TouchEvent::Raw(_) => {}
            }
        }
        assert_eq!(per_touch.len(), 20);
        assert!(per_touch.iter().all(|seq| *seq == vec!['t', 's', 'e']));
    }
}
