//! devshot
//!
//! Captures a web page at several device viewport sizes and composites each
//! full-page screenshot into a device-shaped mockup image.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome through the DevTools Protocol
//! - **Remote Backend** (default): falls back to a hosted screenshot API
//! - **Placeholder Backend**: always available as the last resort
//! - **Mockups**: fits each capture into a device frame's transparent screen area
//!
//! # Example
//!
//! ```no_run
//! use devshot::{CaptureTiming, Pipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig {
//!     screenshots_dir: "out/normal".into(),
//!     mockups_dir: "out/mockup".into(),
//!     ..Default::default()
//! };
//! let pipeline = Pipeline::with_default_backends(config)?;
//! let outcomes = pipeline.run("https://example.com", &["mobile", "desktop"], &CaptureTiming::default())?;
//! for o in &outcomes {
//!     println!("{}: capture={} mockup={}", o.capture.device_class, o.capture.success, o.mockup_succeeded());
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod devices;
pub use devices::{DeviceCatalog, DeviceClass, DeviceProfile};

pub mod browser;
pub use browser::{BrowserCapturer, BrowserLauncher, BrowserOptions, PageDriver};

// Chrome DevTools Protocol driver for the browser backend
#[cfg(feature = "cdp")]
pub mod cdp;

// Hosted screenshot API backend
#[cfg(feature = "remote")]
pub mod remote;

pub mod placeholder;
pub use placeholder::PlaceholderCapturer;

pub mod chain;
pub use chain::CaptureChain;

pub mod mockup;
pub use mockup::{Compositor, FrameTemplate, ScreenRect, TemplateRegistry};

pub mod pipeline;
pub use pipeline::{DeviceOutcome, Pipeline, PipelineConfig};

// Async-friendly facade (worker thread owning a pipeline)
pub mod async_api;
pub use async_api::PipelineWorker;

/// Timing knobs for one capture invocation.
///
/// Owned by the caller; one instance per pipeline run. The navigation timeout
/// is not configured directly, it is derived from `total_timeout_ms`.
///
/// # Examples
///
/// ```
/// let t = devshot::CaptureTiming::default();
/// assert_eq!(t.navigation_timeout().as_millis(), 160_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTiming {
    /// Wait after the page reports its content loaded
    pub page_settle_delay_ms: u64,
    /// Wait at every scroll step while walking down the page
    pub scroll_step_delay_ms: u64,
    /// Upper bound for interactions and for each device's scroll pass
    pub total_timeout_ms: u64,
}

/// Extra headroom the navigation gets on top of `total_timeout_ms`.
pub const NAVIGATION_HEADROOM_MS: u64 = 40_000;

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            page_settle_delay_ms: 1000,
            scroll_step_delay_ms: 50,
            total_timeout_ms: 120_000,
        }
    }
}

impl CaptureTiming {
    /// Reject a zero total timeout; the delays may be zero.
    pub fn validate(&self) -> Result<()> {
        if self.total_timeout_ms == 0 {
            return Err(Error::ConfigError("total_timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms.saturating_add(NAVIGATION_HEADROOM_MS))
    }

    pub fn page_settle_delay(&self) -> Duration {
        Duration::from_millis(self.page_settle_delay_ms)
    }

    pub fn scroll_step_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_step_delay_ms)
    }
}

/// Encoding used for captured screenshots (and, through the file extension,
/// for the mockups derived from them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub(crate) fn to_image_crate(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(Error::ConfigError(format!("unsupported image format: {}", other))),
        }
    }
}

/// Outcome of capturing one device.
///
/// Every backend produces exactly this shape so callers never need to know
/// which backend ran. A successful result always points at a readable image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub success: bool,
    /// Device class as requested ("mobile", "tablet", "desktop", or whatever unknown name was passed)
    pub device_class: String,
    pub device_name: String,
    pub width: u32,
    pub height: u32,
    pub file_path: Option<PathBuf>,
    /// Name of the backend that produced this result, if any ran
    pub backend: Option<String>,
    pub error: Option<String>,
}

impl CaptureResult {
    pub fn captured(device: &DeviceProfile, backend: &str, path: PathBuf) -> Self {
        Self {
            success: true,
            device_class: device.class.to_string(),
            device_name: device.name.clone(),
            width: device.width,
            height: device.height,
            file_path: Some(path),
            backend: Some(backend.to_string()),
            error: None,
        }
    }

    pub fn failed(device: &DeviceProfile, backend: &str, error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            device_class: device.class.to_string(),
            device_name: device.name.clone(),
            width: device.width,
            height: device.height,
            file_path: None,
            backend: Some(backend.to_string()),
            error: Some(error.to_string()),
        }
    }

    /// Entry for a requested class the catalog does not know; no backend runs for it.
    pub fn unsupported_class(class: &str) -> Self {
        Self {
            success: false,
            device_class: class.to_string(),
            device_name: String::new(),
            width: 0,
            height: 0,
            file_path: None,
            backend: None,
            error: Some(Error::DeviceClassUnsupported(class.to_string()).to_string()),
        }
    }
}

/// Outcome of compositing one screenshot into a device frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockupResult {
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl MockupResult {
    pub fn written(path: PathBuf) -> Self {
        Self { success: true, file_path: Some(path), error: None }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self { success: false, file_path: None, error: Some(error.to_string()) }
    }
}

/// A capture backend.
///
/// `capture` handles the whole device list in one go and returns one result
/// per device, in input order. Returning `Err` means the backend could not
/// run at all (browser would not launch, service unreachable); the chain
/// then moves on to the next backend. Failures that only affect one device
/// must be reported as a failed `CaptureResult` instead.
pub trait Capturer: Send + Sync {
    /// Short identifier used in logs and in `CaptureResult::backend`
    fn name(&self) -> &'static str;

    fn capture(
        &self,
        url: &str,
        devices: &[DeviceProfile],
        output_dir: &Path,
        timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>>;
}
