//! Error taxonomy.
//!
//! None of these escape a component boundary: catalog failures are replaced by
//! fallback data, device failures feed the retry ladder, and transport
//! failures become an apology message.  An empty station match is not an
//! error at all.

use std::time::Duration;

use thiserror::Error;

/// Fetching `/api/radio-stations` failed.
#[derive(Debug, Error)]
pub enum CatalogFetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog service returned status {0}")]
    Status(u16),

    #[error("invalid catalog JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The playback device could not load or keep playing a stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeviceError {
    /// No device backend is available (e.g. player binary missing).
    #[error("playback device unavailable: {0}")]
    Unavailable(String),

    /// The stream could not be loaded or stopped producing audio.
    #[error("stream failed: {0}")]
    Load(String),

    /// Control channel to the device failed.
    #[error("device IPC error: {0}")]
    Ipc(String),

    /// No audio arrived within the connect window.
    #[error("no audio after {0:?}")]
    Timeout(Duration),
}

/// Reading the chat stream failed.
#[derive(Debug, Error)]
pub enum StreamTransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat service returned status {0}")]
    Status(u16),

    #[error("stream closed unexpectedly")]
    Closed,
}
