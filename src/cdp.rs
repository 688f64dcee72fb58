//! Chrome DevTools Protocol driver (uses the `headless_chrome` crate)

use crate::browser::{BrowserLauncher, BrowserOptions, PageDriver};
use crate::{CaptureTiming, DeviceProfile, Error, ImageFormat, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DOM_READY_POLL: Duration = Duration::from_millis(100);
const RESIZE_SETTLE: Duration = Duration::from_millis(150);

// Kills CSS animations/transitions and the text caret so captures are repeatable.
const FREEZE_SCRIPT: &str = r#"(function(){
    if (document.getElementById('__devshot_freeze')) return true;
    var s = document.createElement('style');
    s.id = '__devshot_freeze';
    s.textContent = '*,*::before,*::after{animation:none!important;transition:none!important;caret-color:transparent!important}';
    (document.head || document.documentElement).appendChild(s);
    if (document.activeElement && document.activeElement.blur) document.activeElement.blur();
    return true;
})()"#;

const DOM_READY_SCRIPT: &str = "location.href !== 'about:blank' && document.readyState !== 'loading'";

const SCROLL_HEIGHT_SCRIPT: &str =
    "Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement ? document.documentElement.scrollHeight : 0)";

/// Launches a local headless Chrome/Chromium.
#[derive(Debug, Clone, Default)]
pub struct CdpLauncher;

impl BrowserLauncher for CdpLauncher {
    type Driver = CdpDriver;

    fn launch(&self, options: &BrowserOptions, timing: &CaptureTiming) -> Result<CdpDriver> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(options.sandbox)
            .path(options.chrome_path.clone())
            .idle_browser_timeout(timing.navigation_timeout())
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--no-first-run"),
                OsStr::new("--hide-scrollbars"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| Error::SessionLaunch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::SessionLaunch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::SessionLaunch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(timing.total_timeout());

        Ok(CdpDriver { browser: Some(browser), tab, max_capture_height: options.max_capture_height })
    }
}

/// A single Chrome tab driven over CDP.
pub struct CdpDriver {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    max_capture_height: u32,
}

impl CdpDriver {
    fn eval(&self, script: &str) -> Result<Option<serde_json::Value>> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::CdpError(format!("Evaluation failed: {}", e)))?;
        Ok(remote.value)
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(width as f64),
                height: Some(height as f64),
            })
            .map_err(|e| Error::DeviceCapture(format!("Failed to resize viewport to {}x{}: {}", width, height, e)))?;
        Ok(())
    }

    fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let format = match format {
            ImageFormat::Png => Page::CaptureScreenshotFormatOption::Png,
            ImageFormat::Webp => Page::CaptureScreenshotFormatOption::Webp,
        };
        self.tab
            .capture_screenshot(format, None, None, true)
            .map_err(|e| Error::DeviceCapture(format!("Screenshot failed: {}", e)))
    }
}

impl PageDriver for CdpDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::Navigation(format!("Navigation to {} failed: {}", url, e)))?;

        // DOMContentLoaded rather than network idle: pages with polling or
        // analytics connections never go idle.
        let deadline = Instant::now() + timeout;
        loop {
            // evaluation can fail while the old document is being torn down
            if let Ok(Some(serde_json::Value::Bool(true))) = self.eval(DOM_READY_SCRIPT) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Navigation(format!(
                    "{} did not finish loading its content within {}ms",
                    url,
                    timeout.as_millis()
                )));
            }
            std::thread::sleep(DOM_READY_POLL);
        }
    }

    fn set_viewport(&mut self, device: &DeviceProfile) -> Result<()> {
        self.tab
            .set_user_agent(&device.identity, None, None)
            .map_err(|e| Error::DeviceCapture(format!("Failed to set user agent: {}", e)))?;
        self.resize(device.width, device.height)
    }

    fn scroll_height(&mut self) -> Result<u32> {
        let value = self.eval(SCROLL_HEIGHT_SCRIPT)?;
        let height = value
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::DeviceCapture("Could not read document scroll height".into()))?;
        Ok(height.max(0.0).ceil() as u32)
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.eval(&format!("window.scrollTo(0, {})", y))?;
        Ok(())
    }

    fn capture_full_page(&mut self, device: &DeviceProfile, format: ImageFormat) -> Result<Vec<u8>> {
        self.eval(FREEZE_SCRIPT)?;

        // Grow the window to the document height, capture, then restore the
        // device viewport for whatever comes next.
        let full_height = self
            .scroll_height()?
            .clamp(device.height, self.max_capture_height.max(device.height));
        debug!("Full-page capture for {} at {}x{}", device.name, device.width, full_height);

        self.resize(device.width, full_height)?;
        std::thread::sleep(RESIZE_SETTLE);
        let shot = self.screenshot(format);
        let restored = self.resize(device.width, device.height);

        let bytes = shot?;
        restored?;
        Ok(bytes)
    }

    fn shutdown(&mut self) -> Result<()> {
        // Dropping the Browser terminates the child process.
        if let Some(browser) = self.browser.take() {
            drop(browser);
        }
        Ok(())
    }
}
