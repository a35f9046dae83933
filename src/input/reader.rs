//! Poll-driven reader for a non-blocking input device node.

use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::{Error, Result};

use super::event::{Record, RecordAssembler};

/// What one poll pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Poll timed out or was interrupted; nothing read.
    Idle,
    /// A chunk of this many bytes was read (possibly zero complete records).
    Read(usize),
}

/// Reads raw input_event bytes from a source and hands out whole records.
///
/// The source must be in non-blocking mode; readiness is waited for with
/// `poll(2)` bounded by `poll_timeout` so the caller can check its stop flag.
pub struct DeviceReader<R> {
    source: R,
    assembler: RecordAssembler,
    buf: Vec<u8>,
    poll_timeout_ms: libc::c_int,
    total_bytes: u64,
}

impl<R: Read + AsRawFd> DeviceReader<R> {
    /// Fails with `UnsupportedRecordSize` unless `record_size` is 16 or 24.
    pub fn new(
        source: R,
        record_size: usize,
        chunk_bytes: usize,
        poll_timeout: Duration,
    ) -> Result<Self> {
        let assembler = RecordAssembler::new(record_size)?;
        let poll_timeout_ms = poll_timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        Ok(Self {
            source,
            buf: vec![0u8; chunk_bytes.max(assembler.record_size())],
            assembler,
            poll_timeout_ms,
            total_bytes: 0,
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn pending_bytes(&self) -> usize {
        self.assembler.pending()
    }

    /// Wait for readiness, read at most one chunk, and append its complete
    /// records to `out`.
    ///
    /// `Err(DeviceRemoved)` on EOF or hang-up, `Err(Io)` on any other failure.
    pub fn poll_records(&mut self, out: &mut Vec<Record>) -> Result<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.source.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let ret = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, self.poll_timeout_ms) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::Idle);
            }
            return Err(Error::Io(err));
        }
        if ret == 0 {
            return Ok(Readiness::Idle);
        }

        if pfd.revents & libc::POLLIN == 0 {
            if pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                return Err(Error::Io(io::Error::other(format!(
                    "poll reported revents={:#x}",
                    pfd.revents
                ))));
            }
            if pfd.revents & libc::POLLHUP != 0 {
                return Err(Error::DeviceRemoved);
            }
            return Ok(Readiness::Idle);
        }

        match self.source.read(&mut self.buf) {
            Ok(0) => Err(Error::DeviceRemoved),
            Ok(n) => {
                self.total_bytes += n as u64;
                self.assembler.push(&self.buf[..n], out);
                Ok(Readiness::Read(n))
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(Readiness::Idle)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
