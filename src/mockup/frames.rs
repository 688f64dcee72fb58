//! Device frame templates.
//!
//! A template is an RGBA image of a device whose screen area is fully
//! transparent, plus the rectangle describing that area. The built-in set is
//! drawn at startup, each device casting a soft drop shadow down and to the
//! right; an asset directory with a `frames.json` manifest can replace any of
//! them.

use crate::{DeviceClass, Error, Result};
use image::{imageops, Rgba, RgbaImage};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "frames.json";

/// Built-in frames grow by this much to the right and bottom for the shadow.
pub const SHADOW_OFFSET: u32 = 10;
const SHADOW_ALPHA: u8 = 50;
const SHADOW_SIGMA: f32 = 5.0;

/// Screen cut-out in template pixels. `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl ScreenRect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

#[derive(Debug, Clone)]
pub struct FrameTemplate {
    pub class: DeviceClass,
    pub image: RgbaImage,
    pub screen: ScreenRect,
}

impl FrameTemplate {
    /// Validate that the screen rect is non-empty and lies inside the image.
    pub fn new(class: DeviceClass, image: RgbaImage, screen: ScreenRect) -> Result<Self> {
        let (w, h) = image.dimensions();
        if screen.width() == 0 || screen.height() == 0 || screen.right > w || screen.bottom > h {
            return Err(Error::ConfigError(format!(
                "{} frame: screen rect {:?} does not fit a {}x{} template",
                class, screen, w, h
            )));
        }
        Ok(Self { class, image, screen })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

// -- procedural drawing -----------------------------------------------------

fn hex(rgb: u32) -> Rgba<u8> {
    Rgba([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255])
}

fn inside_rounded(px: u32, py: u32, x0: u32, y0: u32, x1: u32, y1: u32, r: u32) -> bool {
    if px < x0 || px >= x1 || py < y0 || py >= y1 {
        return false;
    }
    let r = r.min((x1 - x0) / 2).min((y1 - y0) / 2) as f32;
    let (fx, fy) = (px as f32 + 0.5, py as f32 + 0.5);
    let cx = fx.clamp(x0 as f32 + r, x1 as f32 - r);
    let cy = fy.clamp(y0 as f32 + r, y1 as f32 - r);
    let (dx, dy) = (fx - cx, fy - cy);
    dx * dx + dy * dy <= r * r
}

fn fill_rounded_rect(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, r: u32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            if inside_rounded(x, y, x0, y0, x1, y1, r) {
                img.put_pixel(x, y, color);
            }
        }
    }
}

fn fill_ellipse(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    let (rx, ry) = ((x1 - x0) as f32 / 2.0, (y1 - y0) as f32 / 2.0);
    let (cx, cy) = (x0 as f32 + rx, y0 as f32 + ry);
    let (w, h) = img.dimensions();
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Device body: outline colour with the fill inset by two pixels.
fn body(img: &mut RgbaImage, x1: u32, y1: u32, radius: u32, fill: u32, outline: u32) {
    fill_rounded_rect(img, 0, 0, x1, y1, radius, hex(outline));
    fill_rounded_rect(img, 2, 2, x1 - 2, y1 - 2, radius.saturating_sub(2), hex(fill));
}

/// Put a blurred, offset silhouette of the drawn device underneath it.
fn drop_shadow(device: &RgbaImage) -> RgbaImage {
    let (w, h) = device.dimensions();
    let mut shadow = RgbaImage::new(w, h);
    for (x, y, px) in device.enumerate_pixels() {
        let (sx, sy) = (x + SHADOW_OFFSET, y + SHADOW_OFFSET);
        if px[3] > 0 && sx < w && sy < h {
            shadow.put_pixel(sx, sy, Rgba([0, 0, 0, SHADOW_ALPHA]));
        }
    }
    let mut out = imageops::blur(&shadow, SHADOW_SIGMA);
    imageops::overlay(&mut out, device, 0, 0);
    out
}

/// Canvas for a device drawn at `w`x`h`, with room for its shadow.
fn canvas(w: u32, h: u32) -> RgbaImage {
    RgbaImage::new(w + SHADOW_OFFSET, h + SHADOW_OFFSET)
}

fn punch_screen(img: &mut RgbaImage, screen: ScreenRect) {
    for y in screen.top..screen.bottom {
        for x in screen.left..screen.right {
            img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
        }
    }
}

fn mobile_frame() -> (RgbaImage, ScreenRect) {
    let mut img = canvas(200, 400);
    body(&mut img, 200, 400, 15, 0x2c3e50, 0x34495e);
    // speaker and home button
    fill_rounded_rect(&mut img, 70, 15, 130, 25, 5, hex(0x34495e));
    fill_ellipse(&mut img, 90, 375, 110, 395, hex(0x34495e));
    let mut img = drop_shadow(&img);
    let screen = ScreenRect { left: 20, top: 60, right: 180, bottom: 360 };
    punch_screen(&mut img, screen);
    (img, screen)
}

fn tablet_frame() -> (RgbaImage, ScreenRect) {
    let mut img = canvas(300, 400);
    body(&mut img, 300, 400, 10, 0x34495e, 0x2c3e50);
    fill_rounded_rect(&mut img, 130, 375, 170, 390, 7, hex(0x2c3e50));
    let mut img = drop_shadow(&img);
    let screen = ScreenRect { left: 20, top: 50, right: 280, bottom: 370 };
    punch_screen(&mut img, screen);
    (img, screen)
}

fn desktop_frame() -> (RgbaImage, ScreenRect) {
    let mut img = canvas(400, 380);
    // stand neck and base sit under the monitor
    fill_rounded_rect(&mut img, 190, 290, 210, 350, 0, hex(0x34495e));
    fill_rounded_rect(&mut img, 133, 340, 267, 360, 0, hex(0x34495e));
    body(&mut img, 400, 300, 5, 0x2c3e50, 0x34495e);
    let mut img = drop_shadow(&img);
    let screen = ScreenRect { left: 20, top: 40, right: 380, bottom: 260 };
    punch_screen(&mut img, screen);
    (img, screen)
}

// -- registry -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Manifest {
    frames: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    class: DeviceClass,
    /// Image path relative to the manifest
    image: String,
    screen: ScreenRect,
}

/// One frame template per device class.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    frames: HashMap<DeviceClass, FrameTemplate>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The drawn-in frames; covers every device class.
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        for (class, (image, screen)) in [
            (DeviceClass::Mobile, mobile_frame()),
            (DeviceClass::Tablet, tablet_frame()),
            (DeviceClass::Desktop, desktop_frame()),
        ] {
            reg.frames.insert(class, FrameTemplate { class, image, screen });
        }
        reg
    }

    /// Built-in frames overridden by the entries of `dir/frames.json`.
    ///
    /// ```json
    /// { "frames": [ { "class": "mobile", "image": "iphone.png",
    ///                 "screen": { "left": 40, "top": 120, "right": 360, "bottom": 760 } } ] }
    /// ```
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            Error::ConfigError(format!("Failed to read frame manifest {}: {}", manifest_path.display(), e))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            Error::ConfigError(format!("Invalid frame manifest {}: {}", manifest_path.display(), e))
        })?;

        let mut reg = Self::builtin();
        for entry in manifest.frames {
            let image = image::open(dir.join(&entry.image))?.to_rgba8();
            let template = FrameTemplate::new(entry.class, image, entry.screen)?;
            info!("Loaded {} frame from {}", entry.class, entry.image);
            reg.insert(template);
        }
        Ok(reg)
    }

    pub fn insert(&mut self, template: FrameTemplate) {
        self.frames.insert(template.class, template);
    }

    pub fn get(&self, class: DeviceClass) -> Option<&FrameTemplate> {
        self.frames.get(&class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_class_with_transparent_screen() {
        let reg = TemplateRegistry::builtin();
        for class in DeviceClass::ALL {
            let t = reg.get(class).unwrap();
            let s = t.screen;
            assert!(s.right <= t.image.width() && s.bottom <= t.image.height());
            assert_eq!(t.image.get_pixel(s.left, s.top)[3], 0);
            assert_eq!(t.image.get_pixel(s.right - 1, s.bottom - 1)[3], 0);
            // bezel just outside the screen is opaque
            assert_eq!(t.image.get_pixel(s.left - 1, s.top)[3], 255);
        }
    }

    #[test]
    fn builtin_geometry() {
        let reg = TemplateRegistry::builtin();
        let m = reg.get(DeviceClass::Mobile).unwrap();
        assert_eq!(m.canvas_size(), (210, 410));
        assert_eq!(m.screen, ScreenRect { left: 20, top: 60, right: 180, bottom: 360 });
        assert_eq!(reg.get(DeviceClass::Tablet).unwrap().canvas_size(), (310, 410));
        let d = reg.get(DeviceClass::Desktop).unwrap();
        assert_eq!(d.canvas_size(), (410, 390));
        assert_eq!(d.screen, ScreenRect { left: 20, top: 40, right: 380, bottom: 260 });
        // rounded corner stays transparent
        assert_eq!(m.image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn builtin_frames_cast_a_shadow() {
        let reg = TemplateRegistry::builtin();
        let m = reg.get(DeviceClass::Mobile).unwrap();
        // right of the body, inside the shadow band
        let shadow = m.image.get_pixel(205, 200);
        assert!(shadow[3] > 0 && shadow[3] < 255, "alpha {}", shadow[3]);
        assert_eq!((shadow[0], shadow[1], shadow[2]), (0, 0, 0));
        // the band is offset, so the top-right corner past the body stays clear
        assert_eq!(m.image.get_pixel(209, 0)[3], 0);
        // body colour is untouched by the shadow beneath it
        assert_eq!(*m.image.get_pixel(10, 200), hex(0x2c3e50));

        let d = reg.get(DeviceClass::Desktop).unwrap();
        // under the stand base, below the drawn device
        assert!(d.image.get_pixel(200, 365)[3] > 0);
        assert!(d.image.get_pixel(405, 150)[3] > 0);
    }

    #[test]
    fn rejects_screen_outside_image() {
        let img = RgbaImage::new(10, 10);
        let rect = ScreenRect { left: 2, top: 2, right: 12, bottom: 8 };
        assert!(FrameTemplate::new(DeviceClass::Mobile, img, rect).is_err());
    }

    #[test]
    fn load_dir_overrides_one_class() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(50, 80, Rgba([10, 10, 10, 255]))
            .save(dir.path().join("phone.png"))
            .unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"frames":[{"class":"mobile","image":"phone.png","screen":{"left":5,"top":10,"right":45,"bottom":70}}]}"#,
        )
        .unwrap();

        let reg = TemplateRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(reg.get(DeviceClass::Mobile).unwrap().canvas_size(), (50, 80));
        assert_eq!(reg.get(DeviceClass::Tablet).unwrap().canvas_size(), (310, 410));
    }

    #[test]
    fn load_dir_without_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(TemplateRegistry::load_dir(dir.path()), Err(Error::ConfigError(_))));
    }
}
