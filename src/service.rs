//! Start/stop control of the touch reading thread.

use std::io::Read;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::clock::{Clock, MonotonicClock};
use crate::config::Config;
use crate::device::{self, Calibration, PermissionRepair, SuChmod};
use crate::error::{Error, Result};
use crate::event::EventSink;
use crate::input::{check_record_size, DeviceReader, Readiness};
use crate::mapper::Screen;
use crate::region::Region;
use crate::touch::{Layout, TouchTracker};

struct Session {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<()>>,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.stop.load(Ordering::Relaxed) && !self.thread.is_finished()
    }
}

/// Owns the shared screen layout and at most one live reading session.
pub struct TouchService {
    config: Config,
    layout: Arc<Layout>,
    repair: Arc<dyn PermissionRepair>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<Session>>,
}

impl TouchService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            layout: Arc::new(Layout::default()),
            repair: Arc::new(SuChmod::default()),
            clock: Arc::new(MonotonicClock::new()),
            session: Mutex::new(None),
        }
    }

    pub fn with_permission_repair(mut self, repair: impl PermissionRepair + 'static) -> Self {
        self.repair = Arc::new(repair);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the active regions from a JSON payload. Returns the number of
    /// regions accepted; on error the previous regions stay active.
    pub fn update_regions(&self, json: &str) -> Result<usize> {
        self.layout.regions.update_from_json(json)
    }

    pub fn set_regions(&self, regions: Vec<Region>) -> usize {
        self.layout.regions.replace(regions)
    }

    pub fn set_screen_dimensions(&self, width: i32, height: i32) {
        self.layout.screen.set_dimensions(width, height);
    }

    pub fn set_screen_offsets(&self, top: i32, left: i32) {
        self.layout.screen.set_offsets(top, left);
    }

    pub fn screen(&self) -> Screen {
        self.layout.screen.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.lock_session().as_ref().is_some_and(Session::is_live)
    }

    /// Open the configured device and start reading it.
    ///
    /// Does nothing if a session is already live. Fails with
    /// `DeviceUnavailable` if the device cannot be opened; no thread is
    /// spawned in that case.
    pub fn start<S: EventSink + 'static>(&self, sink: S) -> Result<()> {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(Session::is_live) {
            log::warn!("[service] reader already running");
            return Ok(());
        }

        check_record_size(self.config.record_size)?;
        let path = &self.config.device_path;
        let file = device::open_touch_device(
            path,
            self.repair.as_ref(),
            self.config.permission_retry_delay,
            device::open_nonblocking,
        )?;
        let calibration = Calibration::probe(path);

        *session = Some(self.spawn(file, calibration, sink)?);
        Ok(())
    }

    /// Run a session on an already-open, non-blocking source instead of the
    /// configured device node.
    pub fn attach<R, S>(&self, source: R, calibration: Calibration, sink: S) -> Result<()>
    where
        R: Read + AsRawFd + Send + 'static,
        S: EventSink + 'static,
    {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(Session::is_live) {
            log::warn!("[service] reader already running");
            return Ok(());
        }
        *session = Some(self.spawn(source, calibration, sink)?);
        Ok(())
    }

    /// Signal the reading thread to stop and return without waiting.
    /// The thread exits within one poll timeout.
    pub fn stop(&self) {
        match self.lock_session().as_ref() {
            Some(session) if session.is_live() => {
                session.stop.store(true, Ordering::Relaxed);
                log::info!("[service] stop requested");
            }
            _ => log::warn!("[service] reader not running, ignoring stop"),
        }
    }

    /// Wait for the current session's thread to exit and return how it ended:
    /// `Ok` after a stop, `DeviceRemoved` or `Io` otherwise. `Ok` if there was
    /// no session.
    pub fn join(&self) -> Result<()> {
        let Some(session) = self.lock_session().take() else {
            return Ok(());
        };
        match session.thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Io(std::io::Error::other("touch reader thread panicked"))),
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<R, S>(&self, source: R, calibration: Calibration, mut sink: S) -> Result<Session>
    where
        R: Read + AsRawFd + Send + 'static,
        S: EventSink + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let reader = DeviceReader::new(
            source,
            self.config.record_size,
            self.config.read_chunk_bytes(),
            self.config.poll_timeout,
        )?;
        let tracker = TouchTracker::new(
            calibration,
            self.layout.clone(),
            self.clock.clone(),
            self.config.long_press_delay.as_millis() as u64,
        );

        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("touch-reader".into())
            .spawn(move || run_loop(reader, tracker, &thread_stop, &mut sink))?;

        log::info!(
            "[service] reader started on {} (max_x={}, max_y={})",
            self.config.device_path.display(),
            calibration.max_x,
            calibration.max_y
        );
        Ok(Session { stop, thread })
    }
}

impl Drop for TouchService {
    fn drop(&mut self) {
        if let Some(session) = self.lock_session().as_ref() {
            session.stop.store(true, Ordering::Relaxed);
        }
    }
}

/// Read, classify and time touches until stopped or the device goes away.
fn run_loop<R, C>(
    mut reader: DeviceReader<R>,
    mut tracker: TouchTracker<C>,
    stop: &AtomicBool,
    sink: &mut dyn EventSink,
) -> Result<()>
where
    R: Read + AsRawFd,
    C: Clock,
{
    let mut records = Vec::with_capacity(64);

    let result = loop {
        if stop.load(Ordering::Relaxed) {
            break Ok(());
        }

        records.clear();
        match reader.poll_records(&mut records) {
            Ok(Readiness::Read(_)) => {
                for record in &records {
                    tracker.process(record, sink);
                }
            }
            Ok(Readiness::Idle) => {}
            Err(Error::DeviceRemoved) => {
                log::info!("[reader] device removed (EOF), stopping");
                break Err(Error::DeviceRemoved);
            }
            Err(e) => {
                log::error!("[reader] {}, stopping", e);
                break Err(e);
            }
        }

        tracker.check_long_press(sink);
    };

    log::info!(
        "[reader] exiting after {} bytes, {} pending",
        reader.total_bytes(),
        reader.pending_bytes()
    );
    result
}
