//! Ordered fallback over capture backends.

use crate::{CaptureResult, CaptureTiming, Capturer, DeviceProfile, Error, Result};
use log::{error, info, warn};
use std::path::Path;

/// Tries each backend in order for the whole device list.
///
/// A backend whose session fails (see [`Error::is_session_level`]) is skipped
/// in favour of the next one; any other error is returned as is. A backend
/// that returns results ends the chain, even if some devices in those
/// results failed.
pub struct CaptureChain {
    backends: Vec<Box<dyn Capturer>>,
}

impl CaptureChain {
    pub fn new(backends: Vec<Box<dyn Capturer>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Capture every device, one result per device in input order.
    pub fn capture(
        &self,
        url: &str,
        devices: &[DeviceProfile],
        output_dir: &Path,
        timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>> {
        let mut last_error: Option<Error> = None;

        for backend in &self.backends {
            info!("Capturing {} device(s) of {} with the {} backend", devices.len(), url, backend.name());
            match backend.capture(url, devices, output_dir, timing) {
                Ok(results) if results.len() == devices.len() => return Ok(results),
                Ok(results) => {
                    // contract breach: treat like a failed session rather than misalign devices
                    warn!(
                        "{} backend returned {} results for {} devices; trying next backend",
                        backend.name(),
                        results.len(),
                        devices.len()
                    );
                    last_error = Some(Error::Other(format!("{} backend returned a partial result list", backend.name())));
                }
                Err(e) if e.is_session_level() => {
                    warn!("{} backend failed, falling back: {}", backend.name(), e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("{} backend failed outside its session: {}", backend.name(), e);
                    return Err(e);
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_else(|| "no capture backends configured".to_string());
        error!("All capture backends failed for {}: {}", url, reason);
        Err(Error::AllBackendsExhausted(reason))
    }
}
