//! Hosted screenshot API backend.
//!
//! Speaks the ScreenshotOne `take` API: one GET per device carrying the
//! viewport size and a full-page flag, answered with the encoded image.
//! Unlike the browser backend there is no shared session, so a failed
//! request only fails its own device.

use crate::{CaptureResult, CaptureTiming, Capturer, DeviceProfile, Error, ImageFormat, Result};
use log::{info, warn};
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable holding the API access key
pub const ACCESS_KEY_ENV: &str = "SCREENSHOTONE_KEY";
/// Environment variable overriding the API endpoint
pub const ENDPOINT_ENV: &str = "SCREENSHOTONE_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "https://api.screenshotone.com/take";

/// Connection settings for the screenshot service.
#[derive(Debug, Clone)]
pub struct RemoteApiConfig {
    pub endpoint: String,
    /// Without a key the backend reports a session failure and the chain moves on
    pub access_key: Option<String>,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self { endpoint: DEFAULT_ENDPOINT.to_string(), access_key: None }
    }
}

impl RemoteApiConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            access_key: std::env::var(ACCESS_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
        }
    }
}

/// Why one device's request failed. Connection-level failures are tracked
/// separately: if every device hits one, the service is unreachable.
enum DeviceFailure {
    Unreachable(Error),
    Other(Error),
}

pub struct RemoteApiCapturer {
    config: RemoteApiConfig,
    format: ImageFormat,
}

impl RemoteApiCapturer {
    pub fn new(config: RemoteApiConfig, format: ImageFormat) -> Self {
        Self { config, format }
    }

    fn request_url(&self, key: &str, url: &str, device: &DeviceProfile, timing: &CaptureTiming) -> Result<Url> {
        let width = device.width.to_string();
        let height = device.height.to_string();
        let timeout_secs = timing.total_timeout_ms.div_ceil(1000).to_string();
        let params: [(&str, &str); 9] = [
            ("access_key", key),
            ("url", url),
            ("viewport_width", width.as_str()),
            ("viewport_height", height.as_str()),
            ("device_scale_factor", "1"),
            ("full_page", "true"),
            ("format", self.format.extension()),
            ("user_agent", device.identity.as_str()),
            ("timeout", timeout_secs.as_str()),
        ];
        Url::parse_with_params(&self.config.endpoint, &params)
        .map_err(|e| Error::ConfigError(format!("Invalid screenshot API endpoint '{}': {}", self.config.endpoint, e)))
    }

    /// The body must be an image in the requested format, since the file is
    /// written under that format's extension.
    fn check_body(&self, bytes: &[u8]) -> Result<()> {
        match image::guess_format(bytes) {
            Err(_) => Err(Error::DeviceCapture("Screenshot API response is not an image".into())),
            Ok(found) if found != self.format.to_image_crate() => Err(Error::DeviceCapture(format!(
                "Screenshot API returned {:?}, expected {}",
                found,
                self.format.extension()
            ))),
            Ok(_) => Ok(()),
        }
    }

    fn capture_device(
        &self,
        client: &Client,
        key: &str,
        url: &str,
        device: &DeviceProfile,
        path: &Path,
        timing: &CaptureTiming,
    ) -> std::result::Result<(), DeviceFailure> {
        let request_url = self.request_url(key, url, device, timing).map_err(DeviceFailure::Other)?;

        let response = client.get(request_url).send().map_err(|e| {
            let err = Error::NetworkError(format!("Screenshot API request failed: {}", e));
            if e.is_connect() {
                DeviceFailure::Unreachable(err)
            } else {
                DeviceFailure::Other(err)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(DeviceFailure::Other(Error::DeviceCapture(format!(
                "Screenshot API returned {}: {}",
                status, snippet
            ))));
        }

        let bytes = response
            .bytes()
            .map_err(|e| DeviceFailure::Other(Error::NetworkError(format!("Failed to read API response: {}", e))))?;
        self.check_body(&bytes).map_err(DeviceFailure::Other)?;

        fs::write(path, &bytes).map_err(|e| {
            DeviceFailure::Other(Error::DeviceCapture(format!("Failed to write {}: {}", path.display(), e)))
        })
    }
}

impl Capturer for RemoteApiCapturer {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn capture(
        &self,
        url: &str,
        devices: &[DeviceProfile],
        output_dir: &Path,
        timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>> {
        let key = self
            .config
            .access_key
            .as_deref()
            .ok_or_else(|| Error::SessionLaunch(format!("{} is not set", ACCESS_KEY_ENV)))?;

        let client = Client::builder()
            .timeout(timing.total_timeout() + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::SessionLaunch(format!("Failed to build HTTP client: {}", e)))?;
        fs::create_dir_all(output_dir)?;

        let mut results = Vec::with_capacity(devices.len());
        let mut unreachable = 0usize;
        let mut last_unreachable = None;
        for device in devices {
            let path = output_dir.join(device.capture_file_name(self.format.extension()));
            match self.capture_device(&client, key, url, device, &path, timing) {
                Ok(()) => {
                    info!("Remote screenshot captured: {}", path.display());
                    results.push(CaptureResult::captured(device, self.name(), path));
                }
                Err(DeviceFailure::Unreachable(e)) => {
                    warn!("Screenshot API unreachable for {}: {}", device.name, e);
                    unreachable += 1;
                    results.push(CaptureResult::failed(device, self.name(), &e));
                    last_unreachable = Some(e);
                }
                Err(DeviceFailure::Other(e)) => {
                    warn!("Remote capture failed for {}: {}", device.name, e);
                    results.push(CaptureResult::failed(device, self.name(), e));
                }
            }
        }

        if !devices.is_empty() && unreachable == devices.len() {
            let reason = last_unreachable.map(|e| e.to_string()).unwrap_or_default();
            return Err(Error::SessionLaunch(format!("Screenshot API unreachable: {}", reason)));
        }
        Ok(results)
    }
}
