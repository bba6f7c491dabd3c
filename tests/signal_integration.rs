//! Integration tests for the daemon's signal handling.
//!
//! Handlers are process-wide and `ctrlc` can only be installed once, so this
//! file holds a single test that walks through SIGHUP and then SIGTERM.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use macropad::daemon::{shutdown_flag, spawn_reload};
use macropad::mapping::default_mappings;
use macropad::{Config, MappingEntry, MappingStore};

fn temp_config() -> PathBuf {
    std::env::temp_dir()
        .join(format!("macropad-signal-{}", std::process::id()))
        .join("config.toml")
}

fn raise(sig: libc::c_int) {
    // SAFETY: raise has no memory-safety preconditions.
    assert_eq!(unsafe { libc::raise(sig) }, 0);
}

async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn hangup_reloads_and_terminate_stops() {
    let path = temp_config();
    let mut config = Config::default();
    config
        .mappings
        .insert("knob_cw".into(), MappingEntry::tap("PAGE_DOWN"));
    config.save(&path).unwrap();

    let store = MappingStore::new(default_mappings());
    let running = shutdown_flag().unwrap();
    let reload = spawn_reload(path.clone(), store.clone()).unwrap();

    raise(libc::SIGHUP);
    let reloaded = wait_for(|| store.lookup("knob_cw") == Some(MappingEntry::tap("PAGE_DOWN"))).await;
    assert!(reloaded, "SIGHUP did not reload the mappings");

    // Give any other SIGHUP handler time to act before checking the flag
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(running.load(Ordering::SeqCst), "SIGHUP cleared the running flag");

    // A second reload picks up a fresh edit
    config
        .mappings
        .insert("knob_cw".into(), MappingEntry::tap("PAGE_UP"));
    config.save(&path).unwrap();
    raise(libc::SIGHUP);
    let reloaded = wait_for(|| store.lookup("knob_cw") == Some(MappingEntry::tap("PAGE_UP"))).await;
    assert!(reloaded, "second SIGHUP did not reload the mappings");
    assert!(running.load(Ordering::SeqCst));

    raise(libc::SIGTERM);
    let stopped = wait_for(|| !running.load(Ordering::SeqCst)).await;
    assert!(stopped, "SIGTERM did not clear the running flag");

    reload.abort();
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
