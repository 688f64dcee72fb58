//! Device mockup compositing.
//!
//! Places a screenshot inside a device frame: the screenshot is fitted into
//! the frame's screen rect on a transparent canvas of the frame's size, then
//! the frame is drawn on top so only the screen cut-out shows the page.

pub mod fit;
pub mod frames;

pub use fit::fit_to_screen;
pub use frames::{FrameTemplate, ScreenRect, TemplateRegistry};

use crate::{DeviceClass, Error, MockupResult, Result};
use image::imageops;
use image::{Rgba, RgbaImage};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output name for the mockup of `screenshot_path`.
pub fn mockup_file_name(screenshot_path: &Path) -> Result<String> {
    let base = screenshot_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Other(format!("Screenshot path has no file name: {}", screenshot_path.display())))?;
    Ok(format!("mockup_{}", base))
}

/// Composites screenshots into the frames of a template registry.
#[derive(Debug, Clone)]
pub struct Compositor {
    templates: Arc<TemplateRegistry>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Arc::new(TemplateRegistry::builtin()))
    }
}

impl Compositor {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Render the mockup bitmap without touching the filesystem.
    pub fn render(&self, screenshot: &RgbaImage, class: DeviceClass) -> Result<RgbaImage> {
        let template = self
            .templates
            .get(class)
            .ok_or_else(|| Error::DeviceClassUnsupported(class.to_string()))?;
        let screen = template.screen;
        let fitted = fit_to_screen(screenshot, screen.width(), screen.height());

        let (w, h) = template.canvas_size();
        let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
        imageops::replace(&mut canvas, &fitted, screen.left as i64, screen.top as i64);
        imageops::overlay(&mut canvas, &template.image, 0, 0);
        Ok(canvas)
    }

    /// Composite one screenshot file into `output_dir/mockup_<name>`.
    ///
    /// The output directory is only created once the mockup has been
    /// rendered, so a missing input or an unknown class leaves it untouched.
    pub fn try_compose(&self, screenshot_path: &Path, device_class: &str, output_dir: &Path) -> Result<PathBuf> {
        if !screenshot_path.is_file() {
            return Err(Error::MissingScreenshot(screenshot_path.to_path_buf()));
        }
        let class: DeviceClass = device_class.parse()?;
        if self.templates.get(class).is_none() {
            return Err(Error::DeviceClassUnsupported(device_class.to_string()));
        }

        let out_path = output_dir.join(mockup_file_name(screenshot_path)?);
        let format = image::ImageFormat::from_path(&out_path)?;

        let shot = image::open(screenshot_path)?.to_rgba8();
        let mockup = self.render(&shot, class)?;

        fs::create_dir_all(output_dir)?;
        mockup.save_with_format(&out_path, format)?;
        info!("Mockup created: {}", out_path.display());
        Ok(out_path)
    }

    /// Like [`Compositor::try_compose`], reporting failure in the result.
    pub fn compose(&self, screenshot_path: &Path, device_class: &str, output_dir: &Path) -> MockupResult {
        match self.try_compose(screenshot_path, device_class, output_dir) {
            Ok(path) => MockupResult::written(path),
            Err(e) => {
                warn!("Mockup for {} failed: {}", screenshot_path.display(), e);
                MockupResult::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn write_shot(dir: &Path, name: &str, w: u32, h: u32, color: Rgba<u8>) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, color).save(&path).unwrap();
        path
    }

    #[test]
    fn mockup_has_frame_dimensions_and_screen_content() {
        let dir = tempfile::tempdir().unwrap();
        let shot = write_shot(dir.path(), "iphone_12_390x844.png", 390, 2000, Rgba([255, 0, 0, 255]));
        let out_dir = dir.path().join("mockup");

        let result = Compositor::default().compose(&shot, "mobile", &out_dir);
        assert!(result.success, "{:?}", result.error);
        let path = result.file_path.unwrap();
        assert_eq!(path, out_dir.join("mockup_iphone_12_390x844.png"));

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (210, 410));
        assert_eq!(*img.get_pixel(100, 200), Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn short_capture_is_padded_not_stretched() {
        let dir = tempfile::tempdir().unwrap();
        // 1920x1080 on a 360x220 desktop screen scales to 360x203
        let shot = write_shot(dir.path(), "desktop_1920x1080.png", 1920, 1080, Rgba([0, 0, 255, 255]));

        let path = Compositor::default().try_compose(&shot, "desktop", dir.path()).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (410, 390));
        assert_eq!(*img.get_pixel(200, 40 + 100), Rgba([0, 0, 255, 255]));
        assert_eq!(*img.get_pixel(200, 40 + 215), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn unsupported_class_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let shot = write_shot(dir.path(), "shot.png", 10, 10, Rgba([0, 0, 0, 255]));
        let out_dir = dir.path().join("mockup");

        let result = Compositor::default().compose(&shot, "smartwatch", &out_dir);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("smartwatch"));
        assert!(!out_dir.exists());
    }

    #[test]
    fn class_missing_from_registry_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let shot = write_shot(dir.path(), "shot.png", 10, 10, Rgba([0, 0, 0, 255]));
        let compositor = Compositor::new(Arc::new(TemplateRegistry::empty()));

        let err = compositor.try_compose(&shot, "tablet", dir.path()).unwrap_err();
        assert!(matches!(err, Error::DeviceClassUnsupported(_)));
    }

    #[test]
    fn missing_screenshot_leaves_output_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("mockup");

        let err = Compositor::default()
            .try_compose(&dir.path().join("nope.png"), "mobile", &out_dir)
            .unwrap_err();
        assert!(matches!(err, Error::MissingScreenshot(_)));
        assert!(err.to_string().starts_with("Screenshot file not found"));
        assert!(!out_dir.exists());
    }

    #[test]
    fn recomposing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let shot_path = dir.path().join("ipad_pro_1024x1366.png");
        RgbaImage::from_fn(1024, 1366, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]))
            .save(&shot_path)
            .unwrap();

        let compositor = Compositor::default();
        let digest = |p: &Path| hex::encode(Sha256::digest(image::open(p).unwrap().to_rgba8().as_raw()));

        let first = compositor.try_compose(&shot_path, "tablet", dir.path()).unwrap();
        let a = digest(&first);
        let second = compositor.try_compose(&shot_path, "tablet", dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(a, digest(&second));
    }

    #[test]
    fn mockup_name_is_prefixed() {
        assert_eq!(mockup_file_name(Path::new("/x/pixel_5_393x851.webp")).unwrap(), "mockup_pixel_5_393x851.webp");
    }
}
