//! Engine error taxonomy.
//!
//! Everything here is fatal to `start()` only: once the stream is running, no
//! steady-state path returns an error (bad parameters are clamped, unknown
//! ids cannot be expressed, underruns re-anchor and log).

use thiserror::Error;

/// Errors surfaced synchronously by engine startup.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No default output device on this host.
    #[error("no output device available")]
    NoOutputDevice,

    /// A device was requested by name and is not present.
    #[cfg(feature = "realtime")]
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    /// Device enumeration failed outright.
    #[cfg(feature = "realtime")]
    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    /// Could not read a device's name while matching.
    #[cfg(feature = "realtime")]
    #[error("failed to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    /// The device reports no usable output configurations.
    #[cfg(feature = "realtime")]
    #[error("failed to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    /// The device has no default output configuration.
    #[cfg(feature = "realtime")]
    #[error("no default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    /// Stream construction failed.
    #[cfg(feature = "realtime")]
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    /// Stream refused to start.
    #[cfg(feature = "realtime")]
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The device only offers sample formats we do not render to.
    #[cfg(feature = "realtime")]
    #[error("unsupported device sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),
}
