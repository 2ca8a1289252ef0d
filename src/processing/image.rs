use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::filter::bilateral_filter;
use serde::{Deserialize, Serialize};

use crate::models::{NormalizedImage, RawPhoto};
use crate::processing::background::{BackgroundMode, BackgroundRemover, DEFAULT_BACKGROUND_TOLERANCE};

pub const TARGET_WIDTH: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub target_width: u32,
    pub background: BackgroundMode,
    pub background_tolerance: f32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            target_width: TARGET_WIDTH,
            background: BackgroundMode::default(),
            background_tolerance: DEFAULT_BACKGROUND_TOLERANCE,
        }
    }
}

pub struct ImageProcessor;

impl ImageProcessor {
    /// Isolate the document, crop to it and scale to the target width.
    pub fn normalize(photo: &RawPhoto, options: &NormalizeOptions) -> NormalizedImage {
        let remover = options.background.remover(options.background_tolerance);
        Self::normalize_with(photo, remover.as_ref(), options.target_width)
    }

    pub fn normalize_with(
        photo: &RawPhoto,
        remover: &dyn BackgroundRemover,
        target_width: u32,
    ) -> NormalizedImage {
        let isolated = remover.remove_background(photo.image());
        let cropped = Self::crop_to_opaque(&isolated);
        let resized = Self::resize_to_width(&cropped, target_width);
        log::debug!(
            "normalized {}x{} photo to {}x{}",
            photo.width(),
            photo.height(),
            resized.width(),
            resized.height()
        );
        NormalizedImage::new(resized)
    }

    /// Bounding box `(x, y, width, height)` of every pixel with alpha > 0.
    ///
    /// `None` when the image has no alpha channel or nothing is opaque.
    pub fn opaque_bounds(image: &DynamicImage) -> Option<(u32, u32, u32, u32)> {
        if !image.color().has_alpha() {
            return None;
        }
        let rgba = image.to_rgba8();
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in rgba.enumerate_pixels() {
            if pixel[3] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    /// Crop to the opaque region, or return the image unchanged when there is none.
    pub fn crop_to_opaque(image: &DynamicImage) -> DynamicImage {
        match Self::opaque_bounds(image) {
            Some((x, y, w, h)) => image.crop_imm(x, y, w, h),
            None => image.clone(),
        }
    }

    /// Scale to `target_width`, height `round(h * target_width / w)`.
    pub fn resize_to_width(image: &DynamicImage, target_width: u32) -> RgbaImage {
        let rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        if w == 0 || h == 0 || target_width == 0 {
            return rgba;
        }
        let new_height = Self::scaled_height(w, h, target_width);
        imageops::resize(&rgba, target_width, new_height, FilterType::CatmullRom)
    }

    pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
        let scaled = (height as f64 * target_width as f64 / width as f64).round();
        (scaled as u32).max(1)
    }

    /// OCR-ready bitmap: flatten onto white, grayscale, bilateral filter, Otsu threshold.
    pub fn binarize(image: &NormalizedImage) -> GrayImage {
        let gray = Self::flatten_to_gray(image.as_rgba());
        let smoothed = bilateral_filter(&gray, 11, 17.0, 17.0);
        let level = otsu_level(&smoothed);
        threshold(&smoothed, level)
    }

    fn flatten_to_gray(rgba: &RgbaImage) -> GrayImage {
        GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let p = rgba.get_pixel(x, y);
            let alpha = p[3] as f32 / 255.0;
            let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
            let over_white = luma * alpha + 255.0 * (1.0 - alpha);
            Luma([over_white.round().clamp(0.0, 255.0) as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::background::{BorderFloodRemover, KeepBackground};
    use image::{Rgb, RgbImage, Rgba};

    fn photo(img: DynamicImage) -> RawPhoto {
        RawPhoto::from_image(img)
    }

    #[test]
    fn test_width_is_always_target() {
        for (w, h) in [(1, 1), (37, 200), (600, 400), (1920, 1080), (4000, 30)] {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([90, 90, 90])));
            let out = ImageProcessor::normalize_with(&photo(img), &KeepBackground, TARGET_WIDTH);
            assert_eq!(out.width(), 600, "input {}x{}", w, h);
        }
    }

    #[test]
    fn test_height_keeps_aspect_ratio() {
        assert_eq!(ImageProcessor::scaled_height(1200, 800, 600), 400);
        assert_eq!(ImageProcessor::scaled_height(900, 301, 600), 201);
        assert_eq!(ImageProcessor::scaled_height(4000, 2, 600), 1);
    }

    #[test]
    fn test_crop_to_opaque_region() {
        let mut img = RgbaImage::from_pixel(50, 40, Rgba([0, 0, 0, 0]));
        for y in 10..20 {
            for x in 5..35 {
                img.put_pixel(x, y, Rgba([200, 10, 10, 255]));
            }
        }
        let dynamic = DynamicImage::ImageRgba8(img);
        assert_eq!(ImageProcessor::opaque_bounds(&dynamic), Some((5, 10, 30, 10)));

        let out = ImageProcessor::normalize_with(&photo(dynamic), &KeepBackground, 600);
        assert_eq!((out.width(), out.height()), (600, 200));
    }

    #[test]
    fn test_fully_transparent_image_is_not_cropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 15, Rgba([0, 0, 0, 0])));
        assert_eq!(ImageProcessor::opaque_bounds(&img), None);
        let out = ImageProcessor::normalize_with(&photo(img), &KeepBackground, 600);
        assert_eq!((out.width(), out.height()), (600, 300));
    }

    #[test]
    fn test_no_alpha_channel_skips_crop() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([0, 0, 0])));
        assert_eq!(ImageProcessor::opaque_bounds(&img), None);
    }

    #[test]
    fn test_flood_removal_crops_to_card() {
        let mut img = RgbImage::from_pixel(100, 80, Rgb([250, 250, 250]));
        for y in 20..50 {
            for x in 10..70 {
                img.put_pixel(x, y, Rgb([30, 60, 90]));
            }
        }
        let out = ImageProcessor::normalize_with(
            &photo(DynamicImage::ImageRgb8(img)),
            &BorderFloodRemover::default(),
            600,
        );
        // 60x30 card scaled to 600 wide
        assert_eq!((out.width(), out.height()), (600, 300));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let raw = photo(img.clone());
        let _ = ImageProcessor::normalize(&raw, &NormalizeOptions::default());
        assert_eq!(raw.image(), &img);
    }

    #[test]
    fn test_binarize_produces_two_levels() {
        let mut img = RgbaImage::from_pixel(600, 60, Rgba([240, 240, 240, 255]));
        for y in 20..40 {
            for x in 100..500 {
                img.put_pixel(x, y, Rgba([15, 15, 15, 255]));
            }
        }
        let bin = ImageProcessor::binarize(&NormalizedImage::new(img));
        assert!(bin.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(bin.get_pixel(300, 30)[0], 0);
        assert_eq!(bin.get_pixel(10, 5)[0], 255);
    }
}
