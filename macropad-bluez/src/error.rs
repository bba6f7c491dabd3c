//! Transport error types

use thiserror::Error;

/// Errors from the Bluetooth HID transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Profile registration failed: {0}")]
    Registration(#[source] zbus::Error),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("D-Bus error: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No host connected")]
    NotConnected,

    #[error("Reactor channel closed")]
    ReactorClosed,

    #[error("Profile released by BlueZ")]
    ProfileReleased,
}

impl TransportError {
    /// Whether this error should end the run.
    ///
    /// Only per-connection I/O failures are recovered locally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Io(_) | TransportError::NotConnected)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
