//! Link error type.

/// Errors surfaced by the link engine.
///
/// Only [`LinkError::DeviceOpen`], [`LinkError::Unsupported`] and
/// [`LinkError::WorkerSpawn`] ever reach the caller of `connect`. I/O errors
/// raised while connected are absorbed by the worker and reported through
/// the telemetry sink instead.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open serial port {port}: {source}")]
    DeviceOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("unsupported serial setting: {0}")]
    Unsupported(&'static str),

    #[error("invalid serial setting: {0}")]
    InvalidSetting(String),

    #[error("link is not connected")]
    NotConnected,

    /// The worker has not yet drained earlier commands.
    #[error("link command queue is full")]
    QueueFull,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start link worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
