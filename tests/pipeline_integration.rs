//! Integration tests for the event → report pipeline.
//!
//! These drive the public API end to end: canonical events go through the
//! dispatcher and the command channel into the reactor, and the reports come
//! out on a socket standing in for the L2CAP interrupt channel.

use std::io::Read;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use macropad::actions::ACTION_IDS;
use macropad::mapping::{default_mappings, ActionMap};
use macropad::{CanonicalEvent, Config, Dispatcher, MappingEntry, MappingKind, MappingStore, TriggerTable};
use macropad_bluez::{ConnectionState, ProfileEvent, Reactor};
use macropad_hid::Command;
use tokio::sync::mpsc;

const ENTER_DOWN: CanonicalEvent = CanonicalEvent::new(1, 28, 1);
const ENTER_UP: CanonicalEvent = CanonicalEvent::new(1, 28, 0);
const KEY_1_DOWN: CanonicalEvent = CanonicalEvent::new(1, 2, 1);
const KEY_1_UP: CanonicalEvent = CanonicalEvent::new(1, 2, 0);
const DIAL_CW: CanonicalEvent = CanonicalEvent::new(2, 7, 1);

struct Pipeline {
    dispatcher: Dispatcher,
    store: MappingStore,
    reactor: Reactor,
    _events: mpsc::UnboundedSender<ProfileEvent>,
    running: AtomicBool,
}

fn pipeline(map: ActionMap) -> Pipeline {
    let config = Config::default();
    let triggers = TriggerTable::build(&config.trigger_entries()).unwrap();
    let store = MappingStore::new(map);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Pipeline {
        dispatcher: Dispatcher::new(triggers, store.clone(), commands_tx),
        store,
        reactor: Reactor::new(events_rx, commands_rx, Duration::from_millis(5)),
        _events: events_tx,
        running: AtomicBool::new(true),
    }
}

impl Pipeline {
    /// Attach a host and consume the initial all-zero report.
    fn connect(&mut self, device: &str) -> UnixStream {
        let (ours, theirs) = UnixStream::pair().unwrap();
        theirs
            .set_read_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        self.reactor
            .handle_event(ProfileEvent::NewConnection {
                device: device.to_string(),
                fd: OwnedFd::from(ours),
            })
            .unwrap();
        let mut host = theirs;
        assert_eq!(recv(&mut host), [0; 8], "first report must be all-zero");
        host
    }

    fn fire(&mut self, event: CanonicalEvent) -> usize {
        let queued = self.dispatcher.dispatch(event);
        self.reactor.drain(&self.running).unwrap();
        queued
    }
}

fn recv(host: &mut UnixStream) -> [u8; 8] {
    let mut buf = [0u8; 8];
    host.read_exact(&mut buf).unwrap();
    buf
}

fn assert_quiet(host: &mut UnixStream) {
    host.set_nonblocking(true).unwrap();
    let mut buf = [0u8; 8];
    assert!(host.read(&mut buf).is_err(), "unexpected report {buf:?}");
    host.set_nonblocking(false).unwrap();
}

#[tokio::test]
async fn ctrl_hold_and_release() {
    let mut map = ActionMap::new();
    map.insert(
        "front_button_press".into(),
        MappingEntry::new(MappingKind::Press, ["LEFT_CTRL"]),
    );
    map.insert(
        "front_button_release".into(),
        MappingEntry::new(MappingKind::Release, ["LEFT_CTRL"]),
    );
    let mut p = pipeline(map);
    let mut host = p.connect("/org/bluez/hci0/dev_11_22_33_44_55_66");
    assert!(p.reactor.link().report().is_empty());

    p.fire(ENTER_DOWN);
    assert_eq!(recv(&mut host), [0x01, 0, 0, 0, 0, 0, 0, 0]);

    p.fire(ENTER_UP);
    assert_eq!(recv(&mut host), [0; 8]);
    assert!(p.reactor.link().report().is_empty());
}

#[tokio::test]
async fn tap_sends_press_then_release() {
    let mut map = ActionMap::new();
    map.insert("top_button_1_press".into(), MappingEntry::tap("A"));
    let mut p = pipeline(map);
    let mut host = p.connect("dev");

    assert_eq!(p.fire(KEY_1_DOWN), 2);
    assert_eq!(recv(&mut host), [0, 0, 0x04, 0, 0, 0, 0, 0]);
    assert_eq!(recv(&mut host), [0; 8]);
    assert_quiet(&mut host);
}

#[tokio::test]
async fn default_mappings_drive_every_action() {
    let mut p = pipeline(default_mappings());
    let mut host = p.connect("dev");

    // Knob: tap VOLUME_UP (0x80)
    p.fire(DIAL_CW);
    assert_eq!(recv(&mut host), [0, 0, 0x80, 0, 0, 0, 0, 0]);
    assert_eq!(recv(&mut host), [0; 8]);

    // Front button: hold LEFT_CTRL + C, then release both
    p.fire(ENTER_DOWN);
    assert_eq!(recv(&mut host), [0x01, 0, 0x06, 0, 0, 0, 0, 0]);
    p.fire(ENTER_UP);
    assert_eq!(recv(&mut host), [0; 8]);

    // Top button release maps to none
    assert_eq!(p.fire(KEY_1_UP), 0);
    assert_quiet(&mut host);

    assert_eq!(ACTION_IDS.len(), default_mappings().len());
}

#[tokio::test]
async fn unmapped_and_unknown_events_send_nothing() {
    let mut p = pipeline(ActionMap::new());
    let mut host = p.connect("dev");

    assert_eq!(p.fire(ENTER_DOWN), 0);
    assert_eq!(p.fire(CanonicalEvent::new(1, 30, 1)), 0);
    assert_quiet(&mut host);
}

#[tokio::test]
async fn reload_takes_effect_on_next_event() {
    let mut p = pipeline(default_mappings());
    let mut host = p.connect("dev");

    let mut map = p.store.get();
    map.insert("top_button_1_press".into(), MappingEntry::tap("Z"));
    assert!(p.store.set(map));

    p.fire(KEY_1_DOWN);
    assert_eq!(recv(&mut host), [0, 0, 0x1D, 0, 0, 0, 0, 0]);
    assert_eq!(recv(&mut host), [0; 8]);
}

#[tokio::test]
async fn hangup_resets_and_reconnect_starts_clean() {
    let mut p = pipeline(default_mappings());
    let mut host = p.connect("dev");

    // Hold Ctrl+C, then the host vanishes
    p.fire(ENTER_DOWN);
    assert_eq!(recv(&mut host), [0x01, 0, 0x06, 0, 0, 0, 0, 0]);
    drop(host);

    // The release has nowhere to go: the write fails and the link resets
    p.fire(ENTER_UP);
    let link = p.reactor.link();
    assert_eq!(link.state(), ConnectionState::Idle);
    assert!(link.report().is_empty());
    assert!(link.last_sent().is_empty());

    // Events while nobody is connected are discarded
    p.fire(KEY_1_DOWN);
    assert!(p.reactor.link().report().is_empty());

    let mut host = p.connect("dev");
    p.fire(KEY_1_DOWN);
    assert_eq!(recv(&mut host), [0, 0, 0x04, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn rollover_drops_seventh_key() {
    let mut map = ActionMap::new();
    map.insert(
        "front_button_press".into(),
        MappingEntry::new(MappingKind::Press, ["A", "B", "C", "D", "E", "F"]),
    );
    map.insert(
        "top_button_1_press".into(),
        MappingEntry::new(MappingKind::Press, ["G"]),
    );
    let mut p = pipeline(map);
    let mut host = p.connect("dev");

    p.fire(ENTER_DOWN);
    assert_eq!(recv(&mut host), [0, 0, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);

    p.fire(KEY_1_DOWN);
    assert_quiet(&mut host);
    assert_eq!(p.reactor.link().rollover_count(), 1);
}

#[test]
fn commands_keep_order_across_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = Config::default();
    let triggers = TriggerTable::build(&config.trigger_entries()).unwrap();
    let dispatcher = Dispatcher::new(triggers, MappingStore::new(default_mappings()), tx);

    dispatcher.dispatch(ENTER_DOWN);
    dispatcher.dispatch(KEY_1_DOWN);
    dispatcher.dispatch(ENTER_UP);

    let mut seen = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        seen.push(cmd);
    }
    assert_eq!(
        seen,
        vec![
            Command::press(["LEFT_CTRL", "C"]),
            Command::press(["A"]),
            Command::release(["A"]),
            Command::release(["LEFT_CTRL", "C"]),
        ]
    );
}
