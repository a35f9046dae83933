//! Parse Linux input_event records from raw bytes.
//!
//! Both `struct input_event` layouts are accepted: 16 bytes on 32-bit kernels
//! (timeval 8 + type 2 + code 2 + value 4) and 24 bytes on 64-bit kernels
//! (timeval 16 + type 2 + code 2 + value 4). Fields are native-endian since the
//! bytes come straight from the local device node.

use crate::error::{Error, Result};

pub const INPUT_EVENT_SIZE_32: usize = 16;
pub const INPUT_EVENT_SIZE_64: usize = 24;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;
pub const SYN_REPORT: u16 = 0;

pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;

/// One decoded input_event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
    /// Kernel timestamp in milliseconds; 0 when the kernel left it unset.
    pub time_ms: i64,
}

impl Record {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            time_ms: 0,
        }
    }

    pub fn with_time_ms(mut self, time_ms: i64) -> Self {
        self.time_ms = time_ms;
        self
    }

    pub fn is_report(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_REPORT
    }
}

/// Accept only the two `struct input_event` layouts.
pub fn check_record_size(record_size: usize) -> Result<usize> {
    match record_size {
        INPUT_EVENT_SIZE_32 | INPUT_EVENT_SIZE_64 => Ok(record_size),
        other => Err(Error::UnsupportedRecordSize(other)),
    }
}

/// Parse one input_event of the given layout size from the front of `buf`.
/// Returns None if the buffer is too short or the size is not a known layout.
pub fn parse_input_event(buf: &[u8], record_size: usize) -> Option<Record> {
    if buf.len() < record_size {
        return None;
    }
    match record_size {
        INPUT_EVENT_SIZE_32 => Some(parse_input_event_32(buf)),
        INPUT_EVENT_SIZE_64 => Some(parse_input_event_64(buf)),
        _ => None,
    }
}

fn parse_input_event_32(buf: &[u8]) -> Record {
    let sec = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as i64;
    let usec = i32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]) as i64;
    let ty = u16::from_ne_bytes([buf[8], buf[9]]);
    let code = u16::from_ne_bytes([buf[10], buf[11]]);
    let value = i32::from_ne_bytes([buf[12], buf[13], buf[14], buf[15]]);

    Record::new(ty, code, value).with_time_ms(timeval_ms(sec, usec))
}

fn parse_input_event_64(buf: &[u8]) -> Record {
    let mut sec = [0u8; 8];
    let mut usec = [0u8; 8];
    sec.copy_from_slice(&buf[0..8]);
    usec.copy_from_slice(&buf[8..16]);
    let ty = u16::from_ne_bytes([buf[16], buf[17]]);
    let code = u16::from_ne_bytes([buf[18], buf[19]]);
    let value = i32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]);

    Record::new(ty, code, value)
        .with_time_ms(timeval_ms(i64::from_ne_bytes(sec), i64::from_ne_bytes(usec)))
}

fn timeval_ms(sec: i64, usec: i64) -> i64 {
    sec.wrapping_mul(1000).wrapping_add(usec / 1000)
}

/// Reassembles fixed-size records from reads that may end mid-record.
///
/// Trailing bytes of a read are held back and prefixed to the next one, so
/// record boundaries never drift regardless of how the kernel splits data.
#[derive(Debug)]
pub struct RecordAssembler {
    record_size: usize,
    pending: Vec<u8>,
}

impl RecordAssembler {
    pub fn new(record_size: usize) -> Result<Self> {
        let record_size = check_record_size(record_size)?;
        Ok(Self {
            record_size,
            pending: Vec::with_capacity(record_size),
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Bytes carried over from the previous chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed one chunk; every complete record is appended to `out` in order.
    pub fn push(&mut self, mut chunk: &[u8], out: &mut Vec<Record>) {
        let size = self.record_size;

        if !self.pending.is_empty() {
            let take = chunk.len().min(size - self.pending.len());
            self.pending.extend_from_slice(&chunk[..take]);
            chunk = &chunk[take..];
            if self.pending.len() < size {
                return;
            }
            if let Some(record) = parse_input_event(&self.pending, size) {
                out.push(record);
            }
            self.pending.clear();
        }

        let mut records = chunk.chunks_exact(size);
        for raw in &mut records {
            if let Some(record) = parse_input_event(raw, size) {
                out.push(record);
            }
        }
        self.pending.extend_from_slice(records.remainder());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_64(sec: i64, usec: i64, kind: u16, code: u16, value: i32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INPUT_EVENT_SIZE_64);
        buf.extend_from_slice(&sec.to_ne_bytes());
        buf.extend_from_slice(&usec.to_ne_bytes());
        buf.extend_from_slice(&kind.to_ne_bytes());
        buf.extend_from_slice(&code.to_ne_bytes());
        buf.extend_from_slice(&value.to_ne_bytes());
        buf
    }

    fn encode_32(sec: i32, usec: i32, kind: u16, code: u16, value: i32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INPUT_EVENT_SIZE_32);
        buf.extend_from_slice(&sec.to_ne_bytes());
        buf.extend_from_slice(&usec.to_ne_bytes());
        buf.extend_from_slice(&kind.to_ne_bytes());
        buf.extend_from_slice(&code.to_ne_bytes());
        buf.extend_from_slice(&value.to_ne_bytes());
        buf
    }

    #[test]
    fn parses_64_bit_layout() {
        let buf = encode_64(12, 345_678, EV_ABS, ABS_MT_TRACKING_ID, -1);
        let rec = parse_input_event(&buf, INPUT_EVENT_SIZE_64).unwrap();
        assert_eq!(rec.kind, EV_ABS);
        assert_eq!(rec.code, ABS_MT_TRACKING_ID);
        assert_eq!(rec.value, -1);
        assert_eq!(rec.time_ms, 12_345);
    }

    #[test]
    fn parses_32_bit_layout() {
        let buf = encode_32(1, 2_000, EV_SYN, SYN_REPORT, 0);
        let rec = parse_input_event(&buf, INPUT_EVENT_SIZE_32).unwrap();
        assert!(rec.is_report());
        assert_eq!(rec.time_ms, 1_002);
    }

    #[test]
    fn rejects_short_buffer_and_unknown_size() {
        assert!(parse_input_event(&[0u8; 10], INPUT_EVENT_SIZE_32).is_none());
        assert!(parse_input_event(&[0u8; 20], 20).is_none());
    }

    #[test]
    fn split_record_yields_same_events_as_whole_stream() {
        let mut stream = Vec::new();
        stream.extend(encode_64(0, 0, EV_ABS, ABS_MT_SLOT, 1));
        stream.extend(encode_64(0, 0, EV_ABS, ABS_MT_POSITION_X, 500));
        stream.extend(encode_64(0, 9_000, EV_SYN, SYN_REPORT, 0));

        let mut whole = Vec::new();
        RecordAssembler::new(INPUT_EVENT_SIZE_64).unwrap().push(&stream, &mut whole);
        assert_eq!(whole.len(), 3);

        for split in 1..stream.len() {
            let mut asm = RecordAssembler::new(INPUT_EVENT_SIZE_64).unwrap();
            let mut parts = Vec::new();
            asm.push(&stream[..split], &mut parts);
            asm.push(&stream[split..], &mut parts);
            assert_eq!(parts, whole, "split at {}", split);
            assert_eq!(asm.pending(), 0);
        }
    }

    #[test]
    fn carries_partial_record_across_many_small_reads() {
        let stream = encode_32(0, 0, EV_ABS, ABS_MT_POSITION_Y, 77);
        let mut asm = RecordAssembler::new(INPUT_EVENT_SIZE_32).unwrap();
        let mut out = Vec::new();
        for byte in stream.chunks(3) {
            asm.push(byte, &mut out);
        }
        assert_eq!(out, vec![Record::new(EV_ABS, ABS_MT_POSITION_Y, 77)]);
    }

    #[test]
    fn rejects_unknown_record_sizes() {
        for size in [0, 8, 20, 32] {
            assert!(matches!(
                RecordAssembler::new(size),
                Err(Error::UnsupportedRecordSize(n)) if n == size
            ));
        }
        assert_eq!(check_record_size(INPUT_EVENT_SIZE_32).unwrap(), 16);
        assert_eq!(check_record_size(INPUT_EVENT_SIZE_64).unwrap(), 24);
    }
}
