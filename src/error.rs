//! Error types for the capture and mockup pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or compositing
#[derive(Error, Debug)]
pub enum Error {
    /// A backend could not start its session (browser launch, service unreachable)
    #[error("Capture session failed to start: {0}")]
    SessionLaunch(String),

    /// The shared page load failed; aborts the whole browser session
    #[error("Failed to load URL: {0}")]
    Navigation(String),

    /// One device's capture step failed inside a working session
    #[error("Device capture failed: {0}")]
    DeviceCapture(String),

    /// Every backend in the chain failed at the session level
    #[error("All capture backends failed; last error: {0}")]
    AllBackendsExhausted(String),

    /// No device profile or frame template exists for this class
    #[error("Unsupported device class: {0}")]
    DeviceClassUnsupported(String),

    /// Screenshot handed to the compositor does not exist
    #[error("Screenshot file not found: {}", .0.display())]
    MissingScreenshot(PathBuf),

    /// Decode, resize or encode failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means a whole backend session is unusable.
    pub fn is_session_level(&self) -> bool {
        matches!(self, Error::SessionLaunch(_) | Error::Navigation(_))
    }
}
