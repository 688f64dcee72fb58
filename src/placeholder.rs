//! Last-resort backend: a synthetic image standing in for the real page.
//!
//! Draws a light canvas at the device's viewport size with a few centered
//! lines naming the device, resolution and URL, framed by a thin border.
//! Nothing here touches the network, so the only possible failure is the
//! file write.

use crate::{CaptureResult, CaptureTiming, Capturer, DeviceProfile, Error, ImageFormat, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use log::{info, warn};
use std::fs;
use std::path::Path;

const BACKGROUND: Rgb<u8> = Rgb([0xf0, 0xf0, 0xf0]);
const TEXT: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);
const BORDER: Rgb<u8> = Rgb([0xcc, 0xcc, 0xcc]);

const GLYPH: u32 = 8;
const FIRST_LINE_Y: u32 = 50;
const LINE_PITCH: u32 = 30;
const BORDER_INSET: u32 = 10;
const BORDER_WIDTH: u32 = 2;

/// Lines drawn onto a placeholder, top to bottom.
pub fn placeholder_lines(url: &str, device: &DeviceProfile) -> Vec<String> {
    vec![
        "Screenshot Placeholder".to_string(),
        String::new(),
        format!("Device: {}", device.name),
        format!("Resolution: {}x{}", device.width, device.height),
        format!("URL: {}", url),
        String::new(),
        "This is a placeholder image.".to_string(),
        "In production, this would be a".to_string(),
        "real screenshot of the website.".to_string(),
    ]
}

/// Draw one line with font8x8 glyphs. font8x8 stores the leftmost pixel in
/// the least significant bit. Pixels past the canvas edge are dropped.
fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };
        let gx = x + i as u32 * GLYPH;
        if gx >= w {
            break;
        }
        for (row_idx, row) in glyph.iter().enumerate() {
            let py = y + row_idx as u32;
            if py >= h {
                break;
            }
            for bit in 0..GLYPH {
                let px = gx + bit;
                if px < w && (row >> bit) & 1 == 1 {
                    img.put_pixel(px, py, color);
                }
            }
        }
    }
}

/// Shorten `text` to at most `max_chars` characters, marking the cut.
fn fit_line(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

fn draw_border(img: &mut RgbImage) {
    let (w, h) = img.dimensions();
    if w <= 2 * BORDER_INSET || h <= 2 * BORDER_INSET {
        return;
    }
    let (left, top) = (BORDER_INSET, BORDER_INSET);
    let (right, bottom) = (w - BORDER_INSET, h - BORDER_INSET);
    for y in top..bottom {
        for x in left..right {
            let on_edge = x < left + BORDER_WIDTH
                || x + BORDER_WIDTH >= right
                || y < top + BORDER_WIDTH
                || y + BORDER_WIDTH >= bottom;
            if on_edge {
                img.put_pixel(x, y, BORDER);
            }
        }
    }
}

/// Render the placeholder bitmap for one device.
pub fn render_placeholder(url: &str, device: &DeviceProfile) -> RgbImage {
    let mut img = RgbImage::from_pixel(device.width, device.height, BACKGROUND);
    let max_chars = (device.width.saturating_sub(2 * (BORDER_INSET + BORDER_WIDTH + 4)) / GLYPH).max(1) as usize;

    let mut y = FIRST_LINE_Y;
    for line in placeholder_lines(url, device) {
        if y >= device.height {
            break;
        }
        let line = fit_line(&line, max_chars);
        let text_width = line.chars().count() as u32 * GLYPH;
        let x = device.width.saturating_sub(text_width) / 2;
        draw_text(&mut img, x, y, &line, TEXT);
        y += LINE_PITCH;
    }

    draw_border(&mut img);
    img
}

/// Backend that never needs a browser or network.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderCapturer {
    format: ImageFormat,
}

impl PlaceholderCapturer {
    pub fn new(format: ImageFormat) -> Self {
        Self { format }
    }
}

impl Capturer for PlaceholderCapturer {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn capture(
        &self,
        url: &str,
        devices: &[DeviceProfile],
        output_dir: &Path,
        _timing: &CaptureTiming,
    ) -> Result<Vec<CaptureResult>> {
        fs::create_dir_all(output_dir)?;

        let results = devices
            .iter()
            .map(|device| {
                let path = output_dir.join(device.capture_file_name(self.format.extension()));
                let img = render_placeholder(url, device);
                match img.save_with_format(&path, self.format.to_image_crate()) {
                    Ok(()) => {
                        info!("Placeholder screenshot created: {}", path.display());
                        CaptureResult::captured(device, self.name(), path)
                    }
                    Err(e) => {
                        warn!("Failed to write placeholder for {}: {}", device.name, e);
                        CaptureResult::failed(device, self.name(), Error::from(e))
                    }
                }
            })
            .collect();
        Ok(results)
    }
}
