//! Fit a screenshot into a frame's screen area.
//!
//! The screenshot is scaled to the screen width keeping its aspect ratio.
//! A result taller than the screen keeps its top part; a shorter one is
//! padded with white below. The image is never stretched.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

pub const PAD_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Height the screenshot has after scaling it to `width`, rounded to the nearest pixel.
pub fn scaled_height(src_width: u32, src_height: u32, width: u32) -> u32 {
    if src_width == 0 {
        return 0;
    }
    let h = (src_height as u64 * width as u64 + src_width as u64 / 2) / src_width as u64;
    h.clamp(1, u32::MAX as u64) as u32
}

/// Produce a `width`x`height` image showing the top of `shot`.
pub fn fit_to_screen(shot: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(width, height, PAD_COLOR);
    let (sw, sh) = shot.dimensions();
    if sw == 0 || sh == 0 || width == 0 || height == 0 {
        return out;
    }

    let target_h = scaled_height(sw, sh, width);
    // overlay clips anything below the bottom edge, which is the crop
    if (sw, sh) == (width, target_h) {
        imageops::overlay(&mut out, shot, 0, 0);
    } else {
        let scaled = imageops::resize(shot, width, target_h, FilterType::Lanczos3);
        imageops::overlay(&mut out, &scaled, 0, 0);
    }
    out
}
