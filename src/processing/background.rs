use std::collections::VecDeque;

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Separates the document from whatever it was photographed on.
///
/// Implementations return an image whose background pixels are fully
/// transparent. Returning an image without an alpha channel is allowed and
/// means "no background information", in which case nothing gets cropped.
pub trait BackgroundRemover {
    fn remove_background(&self, image: &DynamicImage) -> DynamicImage;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    BorderFlood,
    Keep,
}

impl BackgroundMode {
    pub fn remover(self, tolerance: f32) -> Box<dyn BackgroundRemover> {
        match self {
            BackgroundMode::BorderFlood => Box::new(BorderFloodRemover::new(tolerance)),
            BackgroundMode::Keep => Box::new(KeepBackground),
        }
    }
}

/// Leaves the photo untouched. Any alpha the photo already carries is kept.
pub struct KeepBackground;

impl BackgroundRemover for KeepBackground {
    fn remove_background(&self, image: &DynamicImage) -> DynamicImage {
        image.clone()
    }
}

/// Flood-fills the background inward from the image border.
///
/// The background colour is the per-channel median of the outer pixel ring.
/// Every pixel reachable from the border through 4-connected neighbours
/// within `tolerance` (euclidean RGB distance) of that colour becomes
/// transparent. Document pixels the fill cannot reach stay opaque even when
/// they share the background colour.
pub struct BorderFloodRemover {
    tolerance: f32,
}

pub const DEFAULT_BACKGROUND_TOLERANCE: f32 = 40.0;

impl BorderFloodRemover {
    pub fn new(tolerance: f32) -> Self {
        BorderFloodRemover {
            tolerance: tolerance.max(0.0),
        }
    }

    fn border_pixels(image: &RgbaImage) -> Vec<Rgba<u8>> {
        let (w, h) = image.dimensions();
        let mut ring = Vec::with_capacity(2 * (w + h) as usize);
        for x in 0..w {
            ring.push(*image.get_pixel(x, 0));
            if h > 1 {
                ring.push(*image.get_pixel(x, h - 1));
            }
        }
        for y in 1..h.saturating_sub(1) {
            ring.push(*image.get_pixel(0, y));
            if w > 1 {
                ring.push(*image.get_pixel(w - 1, y));
            }
        }
        ring
    }

    fn median_colour(ring: &[Rgba<u8>]) -> [u8; 3] {
        let mut colour = [0u8; 3];
        for (channel, slot) in colour.iter_mut().enumerate() {
            let mut values: Vec<u8> = ring.iter().map(|p| p[channel]).collect();
            values.sort_unstable();
            *slot = values.get(values.len() / 2).copied().unwrap_or(0);
        }
        colour
    }

    fn distance(pixel: &Rgba<u8>, colour: &[u8; 3]) -> f32 {
        let sum: f32 = (0..3)
            .map(|c| {
                let d = pixel[c] as f32 - colour[c] as f32;
                d * d
            })
            .sum();
        sum.sqrt()
    }
}

impl Default for BorderFloodRemover {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND_TOLERANCE)
    }
}

impl BackgroundRemover for BorderFloodRemover {
    fn remove_background(&self, image: &DynamicImage) -> DynamicImage {
        let mut rgba = image.to_rgba8();
        let (w, h) = rgba.dimensions();
        if w == 0 || h == 0 {
            return DynamicImage::ImageRgba8(rgba);
        }

        let background = Self::median_colour(&Self::border_pixels(&rgba));
        let is_background = |p: &Rgba<u8>| p[3] == 0 || Self::distance(p, &background) <= self.tolerance;

        let idx = |x: u32, y: u32| (y as usize) * (w as usize) + x as usize;
        let mut visited = vec![false; (w as usize) * (h as usize)];
        let mut queue = VecDeque::new();

        for x in 0..w {
            for y in [0, h - 1] {
                if !visited[idx(x, y)] && is_background(rgba.get_pixel(x, y)) {
                    visited[idx(x, y)] = true;
                    queue.push_back((x, y));
                }
            }
        }
        for y in 0..h {
            for x in [0, w - 1] {
                if !visited[idx(x, y)] && is_background(rgba.get_pixel(x, y)) {
                    visited[idx(x, y)] = true;
                    queue.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            rgba.get_pixel_mut(x, y)[3] = 0;

            let mut neighbours = Vec::with_capacity(4);
            if x > 0 {
                neighbours.push((x - 1, y));
            }
            if x + 1 < w {
                neighbours.push((x + 1, y));
            }
            if y > 0 {
                neighbours.push((x, y - 1));
            }
            if y + 1 < h {
                neighbours.push((x, y + 1));
            }
            for (nx, ny) in neighbours {
                let i = idx(nx, ny);
                if !visited[i] && is_background(rgba.get_pixel(nx, ny)) {
                    visited[i] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        log::trace!("background colour estimated as {:?}", background);
        DynamicImage::ImageRgba8(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// White 40x30 canvas with a dark 10x6 card at (12, 8) and a white hole inside it.
    fn card_on_white() -> DynamicImage {
        let mut img = RgbImage::from_pixel(40, 30, image::Rgb([255, 255, 255]));
        for y in 8..14 {
            for x in 12..22 {
                img.put_pixel(x, y, image::Rgb([20, 30, 40]));
            }
        }
        img.put_pixel(16, 10, image::Rgb([255, 255, 255]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_flood_clears_border_and_keeps_card() {
        let out = BorderFloodRemover::default().remove_background(&card_on_white()).to_rgba8();
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(39, 29)[3], 0);
        assert_eq!(out.get_pixel(12, 8)[3], 255);
        assert_eq!(out.get_pixel(21, 13)[3], 255);
    }

    #[test]
    fn test_enclosed_background_coloured_pixel_stays_opaque() {
        let out = BorderFloodRemover::default().remove_background(&card_on_white()).to_rgba8();
        assert_eq!(out.get_pixel(16, 10)[3], 255);
    }

    #[test]
    fn test_keep_background_is_identity() {
        let img = card_on_white();
        assert_eq!(KeepBackground.remove_background(&img), img);
    }

    #[test]
    fn test_mode_parses_from_snake_case() {
        let mode: BackgroundMode = serde_json::from_str("\"border_flood\"").unwrap();
        assert_eq!(mode, BackgroundMode::BorderFlood);
        let mode: BackgroundMode = serde_json::from_str("\"keep\"").unwrap();
        assert_eq!(mode, BackgroundMode::Keep);
    }
}
