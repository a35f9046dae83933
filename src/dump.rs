use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::device::{self, PermissionRepair};
use crate::error::Result;
use crate::input::{check_record_size, DeviceReader, EV_ABS, EV_KEY, EV_SYN};

/// Print every record from the configured device until `stop` is set or the
/// device goes away.
pub fn run_dump(
    config: &Config,
    repair: &dyn PermissionRepair,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> Result<u64> {
    check_record_size(config.record_size)?;
    let file = device::open_touch_device(
        &config.device_path,
        repair,
        config.permission_retry_delay,
        device::open_nonblocking,
    )?;
    writeln!(out, "Dumping events from {}\n", config.device_path.display())?;

    let reader = DeviceReader::new(
        file,
        config.record_size,
        config.read_chunk_bytes(),
        config.poll_timeout,
    )?;
    dump_records(reader, stop, out)
}

fn dump_records<R: Read + AsRawFd>(
    mut reader: DeviceReader<R>,
    stop: &AtomicBool,
    out: &mut impl Write,
) -> Result<u64> {
    let mut records = Vec::new();
    let mut count: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        records.clear();
        reader.poll_records(&mut records)?;
        for ev in &records {
            count += 1;
            writeln!(
                out,
                "{:6}  {:>10}ms  {}  value={}",
                count,
                ev.time_ms,
                format_event_code(ev.kind, ev.code),
                ev.value
            )?;
        }
    }
    Ok(count)
}

pub fn format_event_code(ty: u16, code: u16) -> String {
    match ty {
        EV_SYN if code == 0 => "SYN_REPORT".into(),
        EV_SYN => format!("SYN/{}", code),
        EV_KEY => format!("KEY/{}", code),
        EV_ABS => format!("ABS_{}", abs_code_name(code)),
        _ => format!("type{}/code{}", ty, code),
    }
}

fn abs_code_name(code: u16) -> &'static str {
    match code {
        0x00 => "X",
        0x01 => "Y",
        0x18 => "PRESSURE",
        0x2f => "MT_SLOT",
        0x30 => "MT_TOUCH_MAJOR",
        0x31 => "MT_TOUCH_MINOR",
        0x35 => "MT_POSITION_X",
        0x36 => "MT_POSITION_Y",
        0x37 => "MT_TOOL_TYPE",
        0x39 => "MT_TRACKING_ID",
        0x3a => "MT_PRESSURE",
        _ => "?",
    }
}
