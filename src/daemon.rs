//! Bridge daemon: input thread, BlueZ reactor and mapping reload.
//!
//! ```text
//! input thread:  InputSource ─▶ Dispatcher ─▶ command channel
//! reactor task:  command channel ─▶ Link (report state) ─▶ interrupt channel
//! hangup task:   SIGHUP ─▶ Config::load_mappings ─▶ MappingStore::set
//! term task:     SIGTERM ─▶ running flag (Ctrl-C via ctrlc)
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use macropad_bluez::HidService;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatch::{Dispatcher, TriggerTable};
use crate::input::InputSource;
use crate::mapping::MappingStore;

/// Re-read `[mappings]` on every SIGHUP and swap it into `store`.
///
/// The SIGHUP handler is installed before this returns.
pub fn spawn_reload(path: PathBuf, store: MappingStore) -> Result<tokio::task::JoinHandle<()>> {
    let mut hangups = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    Ok(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            match Config::load_mappings(&path) {
                Ok(map) => {
                    info!("SIGHUP: reloading mappings from {}", path.display());
                    store.set(map);
                }
                Err(e) => warn!("SIGHUP: keeping current mappings: {}", e),
            }
        }
    }))
}

/// Running flag, cleared by Ctrl-C or SIGTERM. SIGHUP does not touch it.
pub fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let mut terms = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if terms.recv().await.is_some() {
            info!("SIGTERM: shutting down");
            running_clone.store(false, Ordering::SeqCst);
        }
    });
    Ok(running)
}

fn spawn_input(
    config: &Config,
    dispatcher: Dispatcher,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let mut source = InputSource::evdev(
        &config.device_paths,
        config.reconnect_backoff(),
        config.poll_timeout(),
    );
    std::thread::Builder::new()
        .name("input".to_string())
        .spawn(move || {
            source.run(&running, |event| {
                dispatcher.dispatch(event);
            });
        })
        .context("spawning input thread")
}

/// Run the bridge until Ctrl-C, SIGTERM or a fatal transport error.
pub async fn run(config: Config, config_path: PathBuf) -> Result<()> {
    let triggers = TriggerTable::build(&config.trigger_entries())?;
    for name in config.unknown_trigger_actions() {
        warn!("[triggers] names unknown action {:?}, ignored", name);
    }
    let store = MappingStore::new(config.mappings.clone());
    for issue in crate::mapping::validate(&config.mappings) {
        warn!("Mapping: {}", issue);
    }

    let running = shutdown_flag()?;
    let reload = spawn_reload(config_path, store.clone())?;

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let mut service = HidService::start(&config.service_config(), commands_rx)
        .await
        .context("starting Bluetooth HID service")?;

    let dispatcher = Dispatcher::new(triggers, store, commands_tx);
    let input = spawn_input(&config, dispatcher, Arc::clone(&running))?;

    info!("Ready. Ctrl+C to stop.");
    let result = service.run(&running).await;
    if let Err(e) = &result {
        error!("Reactor stopped: {}", e);
    }

    // Shutdown: reactor, then transport, then input thread
    running.store(false, Ordering::SeqCst);
    reload.abort();
    let stopped = service.stop().await;
    let joined = input.join();

    result.context("Bluetooth HID transport")?;
    stopped.context("stopping Bluetooth HID service")?;
    joined.map_err(|_| anyhow!("input thread panicked"))?;
    info!("Done.");
    Ok(())
}
