//! Image preprocessing for OCR.
//!
//! The pipeline mirrors what works on phone photos of thermal receipts:
//! respect EXIF orientation, go grayscale, bound the working size, knock out
//! sensor noise with a small median filter, binarize against the local
//! illumination with an adaptive Gaussian threshold, and straighten the text
//! block before handing the bitmap to the engine.

use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

use crate::error::OcrError;
use crate::models::OcrConfig;

/// Block size of the adaptive threshold window. Must be odd.
const THRESHOLD_BLOCK: usize = 31;

/// Constant subtracted from the local mean before comparing.
const THRESHOLD_C: f32 = 15.0;

/// Skew below this many degrees is left alone.
const SKEW_MIN_DEG: f32 = 0.5;

/// Output of the preprocessing pipeline.
pub struct PreparedImage {
    /// Binarized, deskewed bitmap for the engine.
    pub binarized: GrayImage,
    /// Oriented, downscaled grayscale before blur and threshold. Used for the
    /// retry pass when the binarized image OCRs to nothing.
    pub grayscale: GrayImage,
    /// Deskew notices to surface in the response.
    pub warnings: Vec<String>,
}

/// Preprocess raw image bytes (the image-ocr path).
///
/// The raw bytes are needed twice: for decoding and for the EXIF orientation
/// tag that phone cameras write instead of rotating pixels.
pub fn prepare_image_bytes(bytes: &[u8], config: &OcrConfig) -> Result<PreparedImage, OcrError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| OcrError::InvalidImage(e.to_string()))?;
    let oriented = apply_orientation(decoded, read_exif_orientation(bytes));
    Ok(prepare_image(&oriented, config))
}

/// Preprocess an already-decoded image (PDF page bitmaps).
pub fn prepare_image(image: &DynamicImage, config: &OcrConfig) -> PreparedImage {
    let rgb = image.to_rgb8();
    let gray = image::imageops::grayscale(&rgb);
    let gray = downscale(gray, config.max_image_side);

    let blurred = median_blur3(&gray);
    let binarized = adaptive_threshold(&blurred, THRESHOLD_BLOCK, THRESHOLD_C);

    let mut warnings = Vec::new();
    let binarized = match detect_skew_angle(&binarized) {
        Some(angle) => {
            let correction = -angle;
            warnings.push(format!(
                "Imagen enderezada {correction:.1} grados para OCR"
            ));
            debug!(correction, "corrigiendo inclinación de la imagen");
            rotate_about_center(&binarized, correction)
        }
        None => binarized,
    };

    PreparedImage {
        binarized,
        grayscale: gray,
        warnings,
    }
}

/// Read the EXIF orientation tag (1 when absent or unreadable).
fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = std::io::Cursor::new(bytes);
    exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|reader| {
            reader
                .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

/// Apply an EXIF orientation transform.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Bound the longer side, preserving aspect ratio.
fn downscale(img: GrayImage, max_side: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest <= max_side || max_side == 0 {
        return img;
    }

    let scale = max_side as f32 / longest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    debug!(from = %format!("{w}x{h}"), to = %format!("{new_w}x{new_h}"), "reduciendo imagen");
    image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle)
}

/// 3x3 median filter with replicated borders.
fn median_blur3(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let mut window = [0u8; 9];
            let mut i = 0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = (x as i32 + dx).clamp(0, w as i32 - 1) as u32;
                    let sy = (y as i32 + dy).clamp(0, h as i32 - 1) as u32;
                    window[i] = img.get_pixel(sx, sy)[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

/// Gaussian kernel of the given odd length, normalized to sum 1.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    // OpenCV's sigma for a derived kernel of this size
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-(i as f32).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for value in kernel.iter_mut() {
        *value /= sum;
    }
    kernel
}

/// Binarize against the Gaussian-weighted local mean: white where the pixel
/// clears `mean - c`, black otherwise. Separable two-pass convolution with
/// replicated borders.
fn adaptive_threshold(img: &GrayImage, block: usize, c: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let kernel = gaussian_kernel(block);
    let half = (block / 2) as i32;

    // horizontal pass
    let mut rows = vec![0.0f32; (w * h) as usize];
    for y in 0..hi {
        for x in 0..wi {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i32 - half).clamp(0, wi - 1);
                acc += weight * img.get_pixel(sx as u32, y as u32)[0] as f32;
            }
            rows[(y * wi + x) as usize] = acc;
        }
    }

    // vertical pass + comparison
    let mut out = GrayImage::new(w, h);
    for y in 0..hi {
        for x in 0..wi {
            let mut mean = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i32 - half).clamp(0, hi - 1);
                mean += weight * rows[(sy * wi + x) as usize];
            }
            let value = img.get_pixel(x as u32, y as u32)[0] as f32;
            let bit = if value > mean - c { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([bit]));
        }
    }
    out
}

/// Estimate the skew of the text block, in degrees.
///
/// For each candidate angle the ink pixels are un-sheared column by column
/// and projected onto rows; the angle whose projection shows the crispest
/// row transitions wins. Returns `None` when the image is too small, has
/// under 2% ink, or the best angle is below the correction threshold.
fn detect_skew_angle(img: &GrayImage) -> Option<f32> {
    let (w, h) = img.dimensions();
    if w < 50 || h < 50 {
        return None;
    }

    let ink_threshold = 128u8;
    let ink = img.pixels().filter(|p| p[0] < ink_threshold).count();
    if (ink as f32 / (w * h) as f32) < 0.02 {
        return None;
    }

    let mut best_angle = 0.0f32;
    let mut best_score = f64::NEG_INFINITY;

    let mut candidate = -15.0f32;
    while candidate <= 15.0 {
        let score = projection_score(img, candidate, ink_threshold);
        if score > best_score {
            best_score = score;
            best_angle = candidate;
        }
        candidate += 0.25;
    }

    if best_angle.abs() < SKEW_MIN_DEG {
        None
    } else {
        Some(best_angle)
    }
}

/// Sharpness of the row projection after un-shearing by the candidate angle.
fn projection_score(img: &GrayImage, angle_deg: f32, ink_threshold: u8) -> f64 {
    let (w, h) = img.dimensions();
    let tan_a = (angle_deg.to_radians()).tan() as f64;
    let mut projection = vec![0u32; h as usize];

    // Subsample every 4th column for speed.
    let mut x = 0u32;
    while x < w {
        let shift = (x as f64 * tan_a).round() as i64;
        for y in 0..h {
            if img.get_pixel(x, y)[0] < ink_threshold {
                let row = y as i64 - shift;
                if row >= 0 && (row as usize) < projection.len() {
                    projection[row as usize] += 1;
                }
            }
        }
        x += 4;
    }

    let mut score = 0.0f64;
    for pair in projection.windows(2) {
        let diff = pair[1] as f64 - pair[0] as f64;
        score += diff * diff;
    }
    score
}

/// Rotate about the image center with bilinear sampling and replicated
/// borders. Positive angles turn the content clockwise in image coordinates.
fn rotate_about_center(img: &GrayImage, angle_deg: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let (cx, cy) = ((w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0);
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
    let mut out = GrayImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            // inverse mapping: where does this output pixel come from
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = cos_a * dx + sin_a * dy + cx;
            let sy = -sin_a * dx + cos_a * dy + cy;
            out.put_pixel(x, y, Luma([sample_bilinear(img, sx, sy)]));
        }
    }
    out
}

fn sample_bilinear(img: &GrayImage, x: f32, y: f32) -> u8 {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let clamp_get = |xi: i32, yi: i32| -> f32 {
        let cx = xi.clamp(0, w - 1) as u32;
        let cy = yi.clamp(0, h - 1) as u32;
        img.get_pixel(cx, cy)[0] as f32
    };

    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = clamp_get(x0, y0) * (1.0 - fx) + clamp_get(x0 + 1, y0) * fx;
    let bottom = clamp_get(x0, y0 + 1) * (1.0 - fx) + clamp_get(x0 + 1, y0 + 1) * fx;
    (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
}
