//! Input event source: multiplexes kernel input devices into canonical events.
//!
//! Each configured path is one slot. A slot whose device is missing,
//! unreadable or fails a read is dropped and retried after the backoff. The
//! loop waits with a bounded `poll(2)` timeout so it notices the stop flag
//! within one timeout even when every device is silent.

use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// `EV_SYN`: synchronization markers, never dispatched.
pub const EV_SYN: u16 = 0x00;

/// One normalized kernel input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u16, u16, i32)", into = "(u16, u16, i32)")]
pub struct CanonicalEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl CanonicalEvent {
    pub const fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    pub fn is_sync(&self) -> bool {
        self.kind == EV_SYN
    }
}

impl From<(u16, u16, i32)> for CanonicalEvent {
    fn from((kind, code, value): (u16, u16, i32)) -> Self {
        Self::new(kind, code, value)
    }
}

impl From<CanonicalEvent> for (u16, u16, i32) {
    fn from(ev: CanonicalEvent) -> Self {
        (ev.kind, ev.code, ev.value)
    }
}

impl From<evdev::InputEvent> for CanonicalEvent {
    fn from(ev: evdev::InputEvent) -> Self {
        Self::new(ev.event_type().0, ev.code(), ev.value())
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.kind, self.code, self.value)
    }
}

/// A readable input device.
///
/// `read_events` is only called after `poll(2)` reported the descriptor
/// readable, so a single read must not block.
pub trait InputDevice: AsRawFd + Send {
    fn read_events(&mut self) -> io::Result<Vec<CanonicalEvent>>;
}

impl InputDevice for evdev::Device {
    fn read_events(&mut self) -> io::Result<Vec<CanonicalEvent>> {
        Ok(self.fetch_events()?.map(CanonicalEvent::from).collect())
    }
}

/// Opens the device at a path.
pub type Opener = Box<dyn FnMut(&Path) -> io::Result<Box<dyn InputDevice>> + Send>;

/// Opener for real evdev nodes.
pub fn evdev_opener() -> Opener {
    Box::new(|path: &Path| {
        let device = evdev::Device::open(path)?;
        info!(
            "Opened input device {} ({})",
            path.display(),
            device.name().unwrap_or("unnamed")
        );
        Ok(Box::new(device) as Box<dyn InputDevice>)
    })
}

struct Slot {
    path: PathBuf,
    device: Option<Box<dyn InputDevice>>,
    retry_at: Option<Instant>,
}

impl Slot {
    fn drop_device(&mut self, backoff: Duration, reason: &dyn fmt::Display) {
        if self.device.take().is_some() {
            warn!(
                "Input device {} dropped: {}, retrying in {:?}",
                self.path.display(),
                reason,
                backoff
            );
        }
        self.retry_at = Some(Instant::now() + backoff);
    }
}

pub struct InputSource {
    slots: Vec<Slot>,
    opener: Opener,
    backoff: Duration,
    poll_timeout: Duration,
    stopped: bool,
}

impl InputSource {
    pub fn new(paths: &[PathBuf], backoff: Duration, poll_timeout: Duration, opener: Opener) -> Self {
        Self {
            slots: paths
                .iter()
                .map(|path| Slot {
                    path: path.clone(),
                    device: None,
                    retry_at: None,
                })
                .collect(),
            opener,
            backoff,
            poll_timeout,
            stopped: false,
        }
    }

    pub fn evdev(paths: &[PathBuf], backoff: Duration, poll_timeout: Duration) -> Self {
        Self::new(paths, backoff, poll_timeout, evdev_opener())
    }

    /// Number of devices currently open.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.device.is_some()).count()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Try to open every closed slot whose backoff has elapsed.
    fn open_due(&mut self, now: Instant) {
        for slot in &mut self.slots {
            if slot.device.is_some() || slot.retry_at.is_some_and(|at| at > now) {
                continue;
            }
            match (self.opener)(&slot.path) {
                Ok(device) => {
                    debug!("Input device {} ready (fd {})", slot.path.display(), device.as_raw_fd());
                    slot.device = Some(device);
                    slot.retry_at = None;
                }
                Err(e) => {
                    warn!(
                        "Cannot open {}: {}, retrying in {:?}",
                        slot.path.display(),
                        e,
                        self.backoff
                    );
                    slot.retry_at = Some(now + self.backoff);
                }
            }
        }
    }

    /// Wait bound: the poll timeout, shortened to the next due retry.
    fn wait_bound(&self, now: Instant) -> Duration {
        self.slots
            .iter()
            .filter(|s| s.device.is_none())
            .filter_map(|s| s.retry_at)
            .map(|at| at.saturating_duration_since(now))
            .fold(self.poll_timeout, Duration::min)
    }

    /// One bounded wait plus reads of every ready device.
    ///
    /// Returns the non-SYN events read, in device order.
    pub fn poll_once(&mut self) -> Vec<CanonicalEvent> {
        if self.stopped {
            return Vec::new();
        }
        self.open_due(Instant::now());

        let mut ready = Vec::new();
        let mut fds = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(device) = slot.device.as_ref() {
                ready.push(i);
                fds.push(libc::pollfd {
                    fd: device.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                });
            }
        }

        let timeout = self.wait_bound(Instant::now());
        let timeout_ms = poll_millis(timeout);
        // SAFETY: `fds` is a valid, exclusively borrowed array of `fds.len()` entries.
        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                warn!("poll failed: {}", err);
            }
            return Vec::new();
        }
        if n == 0 {
            return Vec::new();
        }

        let mut events = Vec::new();
        for (pfd, &i) in fds.iter().zip(&ready) {
            if pfd.revents == 0 {
                continue;
            }
            let slot = &mut self.slots[i];
            if pfd.revents & libc::POLLIN != 0 {
                let result = match slot.device.as_mut() {
                    Some(device) => device.read_events(),
                    None => continue,
                };
                match result {
                    Ok(batch) => {
                        for ev in batch {
                            if ev.is_sync() {
                                continue;
                            }
                            trace!("{}: {}", slot.path.display(), ev);
                            events.push(ev);
                        }
                        continue;
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        slot.drop_device(self.backoff, &e);
                        continue;
                    }
                }
            }
            if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                slot.drop_device(self.backoff, &"hangup");
            }
        }
        events
    }

    /// Run until `running` clears, handing every event to `on_event`.
    pub fn run<F>(&mut self, running: &AtomicBool, mut on_event: F)
    where
        F: FnMut(CanonicalEvent),
    {
        info!("Input loop started ({} device paths)", self.slots.len());
        while running.load(Ordering::SeqCst) {
            for ev in self.poll_once() {
                on_event(ev);
            }
        }
        self.stop();
    }

    /// Close every device. No reopen happens afterwards.
    pub fn stop(&mut self) {
        for slot in &mut self.slots {
            if let Some(device) = slot.device.take() {
                debug!("Closing {} (fd {})", slot.path.display(), device.as_raw_fd());
            }
            slot.retry_at = None;
        }
        self.stopped = true;
        info!("Input loop stopped");
    }
}

/// `poll(2)` timeout for `wait`, rounded up so a sub-millisecond bound
/// still blocks instead of spinning.
fn poll_millis(wait: Duration) -> libc::c_int {
    wait.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::os::fd::RawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::{Arc, Mutex};

    /// Device backed by one end of a socket pair. Each 8-byte record is
    /// `type:u16le code:u16le value:i32le`; EOF reads as a device error.
    struct FakeDevice(UnixStream);

    impl AsRawFd for FakeDevice {
        fn as_raw_fd(&self) -> RawFd {
            self.0.as_raw_fd()
        }
    }

    impl InputDevice for FakeDevice {
        fn read_events(&mut self) -> io::Result<Vec<CanonicalEvent>> {
            let mut buf = [0u8; 64];
            let n = self.0.read(&mut buf)?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            Ok(buf[..n]
                .chunks_exact(8)
                .map(|c| {
                    CanonicalEvent::new(
                        u16::from_le_bytes([c[0], c[1]]),
                        u16::from_le_bytes([c[2], c[3]]),
                        i32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                    )
                })
                .collect())
        }
    }

    fn encode(ev: CanonicalEvent) -> Vec<u8> {
        let mut out = ev.kind.to_le_bytes().to_vec();
        out.extend(ev.code.to_le_bytes());
        out.extend(ev.value.to_le_bytes());
        out
    }

    /// Opener handing out socket-backed devices; the test keeps the far ends.
    #[derive(Clone, Default)]
    struct FakeBus {
        available: Arc<Mutex<HashMap<PathBuf, UnixStream>>>,
        opens: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl FakeBus {
        fn plug(&self, path: &str) -> UnixStream {
            let (device, host) = UnixStream::pair().unwrap();
            self.available
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), device);
            host
        }

        fn opener(&self) -> Opener {
            let bus = self.clone();
            Box::new(move |path: &Path| {
                bus.opens.lock().unwrap().push(path.to_path_buf());
                match bus.available.lock().unwrap().remove(path) {
                    Some(stream) => Ok(Box::new(FakeDevice(stream)) as Box<dyn InputDevice>),
                    None => Err(io::Error::from(io::ErrorKind::NotFound)),
                }
            })
        }

        fn open_attempts(&self, path: &str) -> usize {
            self.opens
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_path() == Path::new(path))
                .count()
        }
    }

    fn source(bus: &FakeBus, paths: &[&str], backoff: Duration) -> InputSource {
        let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        InputSource::new(&paths, backoff, Duration::from_millis(20), bus.opener())
    }

    #[test]
    fn events_flow_and_syn_is_filtered() {
        let bus = FakeBus::default();
        let mut host = bus.plug("/dev/input/event0");
        let mut src = source(&bus, &["/dev/input/event0"], Duration::from_secs(5));

        let mut bytes = encode(CanonicalEvent::new(1, 28, 1));
        bytes.extend(encode(CanonicalEvent::new(EV_SYN, 0, 0)));
        bytes.extend(encode(CanonicalEvent::new(2, 7, -1)));
        host.write_all(&bytes).unwrap();

        let events = src.poll_once();
        assert_eq!(
            events,
            vec![CanonicalEvent::new(1, 28, 1), CanonicalEvent::new(2, 7, -1)]
        );
        assert_eq!(src.open_count(), 1);
    }

    #[test]
    fn multiplexes_several_devices() {
        let bus = FakeBus::default();
        let mut a = bus.plug("a");
        let mut b = bus.plug("b");
        let mut src = source(&bus, &["a", "b"], Duration::from_secs(5));

        a.write_all(&encode(CanonicalEvent::new(1, 2, 1))).unwrap();
        b.write_all(&encode(CanonicalEvent::new(1, 3, 1))).unwrap();

        let mut events = src.poll_once();
        events.sort();
        assert_eq!(
            events,
            vec![CanonicalEvent::new(1, 2, 1), CanonicalEvent::new(1, 3, 1)]
        );
    }

    #[test]
    fn idle_poll_is_bounded() {
        let bus = FakeBus::default();
        let _host = bus.plug("a");
        let mut src = source(&bus, &["a"], Duration::from_secs(5));

        let start = Instant::now();
        assert!(src.poll_once().is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn missing_device_is_retried_after_backoff() {
        let bus = FakeBus::default();
        let mut src = source(&bus, &["late"], Duration::from_millis(50));

        assert!(src.poll_once().is_empty());
        assert_eq!(src.open_count(), 0);
        assert!(src.poll_once().is_empty());
        // Still backing off: only the first attempt happened
        assert_eq!(bus.open_attempts("late"), 1);

        let mut host = bus.plug("late");
        std::thread::sleep(Duration::from_millis(60));
        host.write_all(&encode(CanonicalEvent::new(1, 4, 1))).unwrap();

        let mut events = Vec::new();
        for _ in 0..5 {
            events.extend(src.poll_once());
            if !events.is_empty() {
                break;
            }
        }
        assert_eq!(events, vec![CanonicalEvent::new(1, 4, 1)]);
        assert_eq!(src.open_count(), 1);
    }

    #[test]
    fn read_failure_drops_and_reconnects() {
        let bus = FakeBus::default();
        let host = bus.plug("a");
        let mut src = source(&bus, &["a"], Duration::from_millis(30));

        src.poll_once();
        assert_eq!(src.open_count(), 1);

        // Far end closes: EOF read, device dropped
        drop(host);
        src.poll_once();
        assert_eq!(src.open_count(), 0);

        // Reappears: reopened once the backoff elapsed
        let _host = bus.plug("a");
        std::thread::sleep(Duration::from_millis(40));
        src.poll_once();
        assert_eq!(src.open_count(), 1);
        assert_eq!(bus.open_attempts("a"), 2);
    }

    #[test]
    fn other_devices_survive_a_drop() {
        let bus = FakeBus::default();
        let a = bus.plug("a");
        let mut b = bus.plug("b");
        let mut src = source(&bus, &["a", "b"], Duration::from_secs(5));
        src.poll_once();

        drop(a);
        src.poll_once();
        assert_eq!(src.open_count(), 1);

        b.write_all(&encode(CanonicalEvent::new(1, 5, 0))).unwrap();
        assert_eq!(src.poll_once(), vec![CanonicalEvent::new(1, 5, 0)]);
    }

    #[test]
    fn run_exits_on_flag_and_closes_everything() {
        let bus = FakeBus::default();
        let mut host = bus.plug("a");
        let mut src = source(&bus, &["a"], Duration::from_secs(5));
        let running = Arc::new(AtomicBool::new(true));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let flag = Arc::clone(&running);
        let seen_in_loop = Arc::clone(&seen);
        let worker = std::thread::spawn(move || {
            src.run(&flag, |ev| seen_in_loop.lock().unwrap().push(ev));
            src
        });

        host.write_all(&encode(CanonicalEvent::new(1, 28, 1))).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        let mut src = worker.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![CanonicalEvent::new(1, 28, 1)]);
        assert!(src.is_stopped());
        assert_eq!(src.open_count(), 0);

        // Stopped sources never reopen
        let _again = bus.plug("a");
        assert!(src.poll_once().is_empty());
        assert_eq!(src.open_count(), 0);

        // Far end sees the close
        let mut buf = [0u8; 1];
        assert_eq!(host.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn event_serde_is_a_triple() {
        let ev: CanonicalEvent = serde_json::from_str("[2, 7, -1]").unwrap();
        assert_eq!(ev, CanonicalEvent::new(2, 7, -1));
        assert_eq!(serde_json::to_string(&ev).unwrap(), "[2,7,-1]");
        assert_eq!(ev.to_string(), "(2, 7, -1)");
    }

    #[test]
    fn poll_timeout_rounds_up() {
        assert_eq!(poll_millis(Duration::ZERO), 0);
        assert_eq!(poll_millis(Duration::from_micros(1)), 1);
        assert_eq!(poll_millis(Duration::from_micros(999)), 1);
        assert_eq!(poll_millis(Duration::from_millis(250)), 250);
        assert_eq!(poll_millis(Duration::from_micros(250_001)), 251);
        assert_eq!(poll_millis(Duration::from_secs(u64::MAX)), libc::c_int::MAX);
    }
}
