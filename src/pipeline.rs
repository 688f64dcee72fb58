//! Capture-then-composite coordinator.

use crate::chain::CaptureChain;
use crate::mockup::{Compositor, TemplateRegistry};
use crate::{
    CaptureResult, CaptureTiming, Capturer, DeviceCatalog, DeviceProfile, ImageFormat, MockupResult,
    PlaceholderCapturer, Result,
};
#[cfg(feature = "cdp")]
use crate::{browser::BrowserOptions, BrowserCapturer};
#[cfg(feature = "remote")]
use crate::remote::{RemoteApiCapturer, RemoteApiConfig};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where outputs go and which backends run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub screenshots_dir: PathBuf,
    pub mockups_dir: PathBuf,
    pub format: ImageFormat,
    /// Directory with a `frames.json` manifest; built-in frames when `None`
    pub frames_dir: Option<PathBuf>,
    /// Try a local headless browser first
    pub use_browser: bool,
    /// Try the hosted screenshot API before falling back to placeholders
    pub use_remote: bool,
    #[cfg(feature = "cdp")]
    pub browser: BrowserOptions,
    #[cfg(feature = "remote")]
    pub remote: RemoteApiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            screenshots_dir: PathBuf::from("screenshots/normal"),
            mockups_dir: PathBuf::from("screenshots/mockup"),
            format: ImageFormat::Png,
            frames_dir: None,
            use_browser: true,
            use_remote: true,
            #[cfg(feature = "cdp")]
            browser: BrowserOptions::default(),
            #[cfg(feature = "remote")]
            remote: RemoteApiConfig::from_env(),
        }
    }
}

/// Everything produced for one requested device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOutcome {
    /// Class name exactly as requested
    pub requested_class: String,
    pub capture: CaptureResult,
    /// `None` when the capture failed and no mockup was attempted
    pub mockup: Option<MockupResult>,
}

impl DeviceOutcome {
    pub fn mockup_succeeded(&self) -> bool {
        self.mockup.as_ref().is_some_and(|m| m.success)
    }
}

pub struct Pipeline {
    catalog: Arc<DeviceCatalog>,
    chain: CaptureChain,
    compositor: Compositor,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(catalog: Arc<DeviceCatalog>, chain: CaptureChain, compositor: Compositor, config: PipelineConfig) -> Self {
        Self { catalog, chain, compositor, config }
    }

    /// Built-in catalog plus the compiled-in backends in fallback order:
    /// browser, remote API, placeholder.
    pub fn with_default_backends(config: PipelineConfig) -> Result<Self> {
        let templates = match &config.frames_dir {
            Some(dir) => TemplateRegistry::load_dir(dir)?,
            None => TemplateRegistry::builtin(),
        };

        let mut backends: Vec<Box<dyn Capturer>> = Vec::new();
        #[cfg(feature = "cdp")]
        {
            if config.use_browser {
                backends.push(Box::new(BrowserCapturer::new(
                    crate::cdp::CdpLauncher,
                    config.browser.clone(),
                    config.format,
                )));
            }
        }
        #[cfg(feature = "remote")]
        {
            if config.use_remote {
                backends.push(Box::new(RemoteApiCapturer::new(config.remote.clone(), config.format)));
            }
        }
        backends.push(Box::new(PlaceholderCapturer::new(config.format)));

        let chain = CaptureChain::new(backends);
        info!("Capture backends: {}", chain.backend_names().join(" -> "));

        Ok(Self::new(
            Arc::new(DeviceCatalog::builtin()),
            chain,
            Compositor::new(Arc::new(templates)),
            config,
        ))
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Capture every requested class, without mockups.
    ///
    /// One result per requested class, in request order. Unknown classes get
    /// a failed entry and are never handed to a backend.
    pub fn capture_only<S: AsRef<str>>(
        &self,
        url: &str,
        device_classes: &[S],
        timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>> {
        timing.validate()?;
        let resolved: Vec<std::result::Result<&DeviceProfile, String>> = device_classes
            .iter()
            .map(|c| self.catalog.resolve(c.as_ref()).map_err(|_| c.as_ref().to_string()))
            .collect();
        let devices: Vec<DeviceProfile> =
            resolved.iter().filter_map(|r| r.as_ref().ok().map(|d| (*d).clone())).collect();

        let captured = if devices.is_empty() {
            Vec::new()
        } else {
            self.chain.capture(url, &devices, &self.config.screenshots_dir, timing)?
        };
        let mut captured = captured.into_iter();

        Ok(resolved
            .into_iter()
            .map(|r| match r {
                Ok(device) => captured
                    .next()
                    .unwrap_or_else(|| CaptureResult::failed(device, "pipeline", "backend returned no result")),
                Err(class) => CaptureResult::unsupported_class(&class),
            })
            .collect())
    }

    /// Capture every requested class, then build a mockup for each success.
    pub fn run<S: AsRef<str>>(&self, url: &str, device_classes: &[S], timing: &CaptureTiming) -> Result<Vec<DeviceOutcome>> {
        let captures = self.capture_only(url, device_classes, timing)?;
        let outcomes: Vec<DeviceOutcome> = device_classes
            .iter()
            .zip(captures)
            .map(|(requested, capture)| self.outcome(requested.as_ref(), capture))
            .collect();

        let mockups = outcomes.iter().filter(|o| o.mockup_succeeded()).count();
        info!("Processed {} device(s) for {}: {} mockup(s) written", outcomes.len(), url, mockups);
        Ok(outcomes)
    }

    /// Rebuild the mockup for an existing screenshot.
    pub fn recompose(&self, screenshot_path: &Path, device_class: &str) -> MockupResult {
        self.compositor.compose(screenshot_path, device_class, &self.config.mockups_dir)
    }

    /// Capture and composite a single explicit profile, e.g. to refresh one
    /// stored screenshot with a device that is not the class representative.
    pub fn regenerate(&self, url: &str, device: &DeviceProfile, timing: &CaptureTiming) -> Result<DeviceOutcome> {
        timing.validate()?;
        let mut results =
            self.chain.capture(url, std::slice::from_ref(device), &self.config.screenshots_dir, timing)?;
        let capture = results
            .pop()
            .unwrap_or_else(|| CaptureResult::failed(device, "pipeline", "backend returned no result"));
        Ok(self.outcome(device.class.as_str(), capture))
    }

    fn outcome(&self, requested: &str, capture: CaptureResult) -> DeviceOutcome {
        let mockup = match (&capture.file_path, capture.success) {
            (Some(path), true) => Some(self.compositor.compose(path, &capture.device_class, &self.config.mockups_dir)),
            _ => {
                debug!("Skipping mockup for {}: capture failed", requested);
                None
            }
        };
        DeviceOutcome { requested_class: requested.to_string(), capture, mockup }
    }
}
