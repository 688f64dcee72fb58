//! In-process browser backend.
//!
//! One browser session serves every requested device: the page is loaded
//! once, then for each device the viewport is resized, the page is walked
//! from top to bottom to wake lazy content, scrolled back up and captured.
//! The browser itself sits behind [`BrowserLauncher`] / [`PageDriver`] so the
//! sequencing here can be exercised without Chrome.

use crate::{CaptureResult, CaptureTiming, Capturer, DeviceProfile, Error, ImageFormat, Result};
use log::{debug, info, warn};
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Operations the capture loop needs from a loaded browser page.
pub trait PageDriver {
    /// Navigate and block until the DOM content has loaded (not network idle).
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Resize the viewport and present the device's identity string.
    fn set_viewport(&mut self, device: &DeviceProfile) -> Result<()>;

    /// Current scrollable height of the document in CSS pixels.
    fn scroll_height(&mut self) -> Result<u32>;

    fn scroll_to(&mut self, y: u32) -> Result<()>;

    /// Capture the whole scrollable page with animations and the caret frozen.
    fn capture_full_page(&mut self, device: &DeviceProfile, format: ImageFormat) -> Result<Vec<u8>>;

    /// Release the browser. Called exactly once by the session guard.
    fn shutdown(&mut self) -> Result<()>;
}

/// Starts a browser and hands back a driver for its single page.
pub trait BrowserLauncher: Send + Sync {
    type Driver: PageDriver;

    fn launch(&self, options: &BrowserOptions, timing: &CaptureTiming) -> Result<Self::Driver>;
}

/// Browser process settings plus the fixed (non caller-tunable) settle waits.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Explicit Chrome/Chromium binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Chrome's sandbox; usually disabled inside containers
    pub sandbox: bool,
    /// Wait after a viewport resize so the layout can reflow
    pub reflow_delay_ms: u64,
    /// Wait after scrolling back to the top, before capturing
    pub top_settle_delay_ms: u64,
    /// Tallest capture allowed; taller pages are cut at this height
    pub max_capture_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            sandbox: false,
            reflow_delay_ms: 300,
            top_settle_delay_ms: 200,
            max_capture_height: 16_384,
        }
    }
}

/// Guard owning a live driver; shuts the browser down on every exit path.
struct Session<D: PageDriver> {
    driver: D,
}

impl<D: PageDriver> Deref for Session<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.driver
    }
}

impl<D: PageDriver> DerefMut for Session<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: PageDriver> Drop for Session<D> {
    fn drop(&mut self) {
        match self.driver.shutdown() {
            Ok(()) => debug!("Browser session closed"),
            // never mask whatever error is already propagating
            Err(e) => warn!("Failed to close browser session cleanly: {}", e),
        }
    }
}

struct Deadline {
    at: Instant,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self { at: Instant::now() + budget }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

/// Primary capture backend: one browser session for the whole device list.
pub struct BrowserCapturer<L: BrowserLauncher> {
    launcher: L,
    options: BrowserOptions,
    format: ImageFormat,
}

impl<L: BrowserLauncher> BrowserCapturer<L> {
    pub fn new(launcher: L, options: BrowserOptions, format: ImageFormat) -> Self {
        Self { launcher, options, format }
    }

    fn capture_device(
        &self,
        page: &mut L::Driver,
        device: &DeviceProfile,
        path: &Path,
        timing: &CaptureTiming,
        scroll_budget: &Deadline,
    ) -> Result<()> {
        page.set_viewport(device)?;
        pause(Duration::from_millis(self.options.reflow_delay_ms));

        let page_height = page.scroll_height()?;
        let step = (device.height / 2).max(1);
        let mut y = 0u32;
        let mut steps = 0u32;
        while y < page_height {
            if scroll_budget.expired() {
                warn!(
                    "Scroll budget of {}ms used up at y={} of {} for {}; capturing what has loaded",
                    timing.total_timeout_ms, y, page_height, device.name
                );
                break;
            }
            page.scroll_to(y)?;
            pause(timing.scroll_step_delay().min(scroll_budget.remaining()));
            y = y.saturating_add(step);
            steps += 1;
        }
        debug!("{}: {} scroll steps over {}px", device.name, steps, page_height);

        page.scroll_to(0)?;
        pause(Duration::from_millis(self.options.top_settle_delay_ms));

        let bytes = page.capture_full_page(device, self.format)?;
        fs::write(path, &bytes)
            .map_err(|e| Error::DeviceCapture(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl<L: BrowserLauncher> Capturer for BrowserCapturer<L> {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn capture(
        &self,
        url: &str,
        devices: &[DeviceProfile],
        output_dir: &Path,
        timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>> {
        timing.validate()?;
        fs::create_dir_all(output_dir)?;

        let driver = self
            .launcher
            .launch(&self.options, timing)
            .map_err(|e| match e {
                Error::SessionLaunch(_) => e,
                other => Error::SessionLaunch(other.to_string()),
            })?;
        let mut session = Session { driver };
        info!("Browser session started for {} ({} devices)", url, devices.len());

        session.navigate(url, timing.navigation_timeout()).map_err(|e| match e {
            Error::Navigation(_) => e,
            other => Error::Navigation(format!("{}: {}", url, other)),
        })?;
        pause(timing.page_settle_delay());

        // one scroll budget shared by every device in the session
        let scroll_budget = Deadline::after(timing.total_timeout());
        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            let path = output_dir.join(device.capture_file_name(self.format.extension()));
            match self.capture_device(&mut session, device, &path, timing, &scroll_budget) {
                Ok(()) => {
                    info!("Browser screenshot captured: {}", path.display());
                    results.push(CaptureResult::captured(device, self.name(), path));
                }
                Err(e) => {
                    warn!("Capture failed for {}: {}", device.name, e);
                    results.push(CaptureResult::failed(device, self.name(), e));
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{DeviceCatalog, DeviceClass};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct Script {
        pub fail_launch: bool,
        pub fail_navigation: bool,
        /// Device names whose capture call errors
        pub fail_capture_for: Vec<String>,
        pub page_height: u32,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeLauncher {
        pub script: Script,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    pub(crate) struct FakeDriver {
        script: Script,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl PageDriver for FakeDriver {
        fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
            self.log(format!("navigate {}", url));
            if self.script.fail_navigation {
                return Err(Error::Navigation("net::ERR_NAME_NOT_RESOLVED".into()));
            }
            Ok(())
        }

        fn set_viewport(&mut self, device: &DeviceProfile) -> Result<()> {
            self.log(format!("viewport {}x{}", device.width, device.height));
            Ok(())
        }

        fn scroll_height(&mut self) -> Result<u32> {
            Ok(self.script.page_height)
        }

        fn scroll_to(&mut self, y: u32) -> Result<()> {
            self.log(format!("scroll {}", y));
            Ok(())
        }

        fn capture_full_page(&mut self, device: &DeviceProfile, _format: ImageFormat) -> Result<Vec<u8>> {
            self.log(format!("capture {}", device.name));
            if self.script.fail_capture_for.iter().any(|n| n == &device.name) {
                return Err(Error::DeviceCapture("target closed".into()));
            }
            Ok(b"not-really-a-png".to_vec())
        }

        fn shutdown(&mut self) -> Result<()> {
            self.log("shutdown".to_string());
            Ok(())
        }
    }

    impl BrowserLauncher for FakeLauncher {
        type Driver = FakeDriver;

        fn launch(&self, _options: &BrowserOptions, _timing: &CaptureTiming) -> Result<FakeDriver> {
            self.calls.lock().unwrap().push("launch".to_string());
            if self.script.fail_launch {
                return Err(Error::SessionLaunch("chrome not found".into()));
            }
            Ok(FakeDriver { script: self.script.clone(), calls: self.calls.clone() })
        }
    }

    pub(crate) fn instant_options() -> BrowserOptions {
        BrowserOptions { reflow_delay_ms: 0, top_settle_delay_ms: 0, ..Default::default() }
    }

    pub(crate) fn instant_timing() -> CaptureTiming {
        CaptureTiming { page_settle_delay_ms: 0, scroll_step_delay_ms: 0, total_timeout_ms: 5_000 }
    }

    fn all_devices() -> Vec<DeviceProfile> {
        let c = DeviceCatalog::builtin();
        DeviceClass::ALL.iter().map(|&k| c.representative(k).unwrap().clone()).collect()
    }

    #[test]
    fn one_navigation_serves_every_device() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher { script: Script { page_height: 100, ..Default::default() }, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);

        let results = capturer.capture("https://example.com", &all_devices(), dir.path(), &instant_timing()).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].device_class, "mobile");
        assert_eq!(results[2].device_class, "desktop");
        assert!(dir.path().join("iphone_12_390x844.png").exists());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.starts_with("navigate")).count(), 1);
        assert_eq!(calls.iter().filter(|c| c.starts_with("capture")).count(), 3);
        assert_eq!(calls.first().map(String::as_str), Some("launch"));
        assert_eq!(calls.last().map(String::as_str), Some("shutdown"));
    }

    #[test]
    fn scroll_walks_half_viewport_steps_then_returns_to_top() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher { script: Script { page_height: 2000, ..Default::default() }, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);
        let mobile = DeviceCatalog::builtin().resolve("mobile").unwrap().clone();

        capturer.capture("https://example.com", &[mobile], dir.path(), &instant_timing()).unwrap();

        let scrolls: Vec<String> = calls.lock().unwrap().iter().filter(|c| c.starts_with("scroll")).cloned().collect();
        // viewport height 844 -> step 422
        assert_eq!(scrolls, vec!["scroll 0", "scroll 422", "scroll 844", "scroll 1266", "scroll 1688", "scroll 0"]);
    }

    #[test]
    fn per_device_failure_does_not_skip_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script { page_height: 10, fail_capture_for: vec!["iPad Pro".into()], ..Default::default() };
        let launcher = FakeLauncher { script, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);

        let results = capturer.capture("https://example.com", &all_devices(), dir.path(), &instant_timing()).unwrap();

        let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert!(results[1].error.as_deref().unwrap().contains("target closed"));
        assert!(results[1].file_path.is_none());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.starts_with("capture")).count(), 3);
        assert_eq!(calls.iter().filter(|c| c.as_str() == "launch").count(), 1);
    }

    #[test]
    fn unwritable_output_is_a_device_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mobile = DeviceCatalog::builtin().resolve("mobile").unwrap().clone();
        // a directory squatting on the target filename makes the write fail
        fs::create_dir(dir.path().join(mobile.capture_file_name("png"))).unwrap();
        let launcher = FakeLauncher { script: Script { page_height: 10, ..Default::default() }, ..Default::default() };
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);

        let results = capturer.capture("https://example.com", &[mobile], dir.path(), &instant_timing()).unwrap();
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("Failed to write"));
    }

    #[test]
    fn navigation_failure_aborts_session_and_still_closes() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script { fail_navigation: true, ..Default::default() };
        let launcher = FakeLauncher { script, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);

        let err = capturer.capture("https://nope.invalid", &all_devices(), dir.path(), &instant_timing()).unwrap_err();

        assert!(matches!(err, Error::Navigation(_)));
        assert!(err.is_session_level());
        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("capture")));
        assert_eq!(calls.last().map(String::as_str), Some("shutdown"));
    }

    #[test]
    fn launch_failure_is_session_level() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher { script: Script { fail_launch: true, ..Default::default() }, ..Default::default() };
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);

        let err = capturer.capture("https://example.com", &all_devices(), dir.path(), &instant_timing()).unwrap_err();
        assert!(matches!(err, Error::SessionLaunch(_)));
    }

    #[test]
    fn scroll_pass_stops_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher { script: Script { page_height: 1_000_000, ..Default::default() }, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);
        let timing = CaptureTiming { page_settle_delay_ms: 0, scroll_step_delay_ms: 20, total_timeout_ms: 100 };
        let mobile = DeviceCatalog::builtin().resolve("mobile").unwrap().clone();

        let started = Instant::now();
        let results = capturer.capture("https://example.com", &[mobile], dir.path(), &timing).unwrap();

        assert!(results[0].success);
        // a full pass would be ~2370 steps of 20ms
        assert!(started.elapsed() < Duration::from_secs(5));
        let scrolls = calls.lock().unwrap().iter().filter(|c| c.starts_with("scroll")).count();
        assert!(scrolls < 50, "expected the deadline to cut the pass short, saw {} scrolls", scrolls);
    }

    #[test]
    fn scroll_budget_is_shared_across_devices() {
        let dir = tempfile::tempdir().unwrap();
        let launcher =
            FakeLauncher { script: Script { page_height: 10_000_000, ..Default::default() }, ..Default::default() };
        let calls = launcher.calls.clone();
        let capturer = BrowserCapturer::new(launcher, instant_options(), ImageFormat::Png);
        let timing = CaptureTiming { page_settle_delay_ms: 0, scroll_step_delay_ms: 10, total_timeout_ms: 300 };

        let started = Instant::now();
        let results = capturer.capture("https://example.com", &all_devices(), dir.path(), &timing).unwrap();
        let elapsed = started.elapsed();

        // every device is still captured once the budget is gone
        assert!(results.iter().all(|r| r.success));
        // three separate budgets would take ~900ms
        assert!(elapsed < Duration::from_millis(600), "scrolling took {:?}", elapsed);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.starts_with("capture")).count(), 3);
        // later devices only scroll back to the top
        let last_viewport = calls.iter().rposition(|c| c.starts_with("viewport")).unwrap();
        let tail_scrolls: Vec<&String> = calls[last_viewport..].iter().filter(|c| c.starts_with("scroll")).collect();
        assert_eq!(tail_scrolls, vec!["scroll 0"]);
    }
}
