use image::{GrayImage, Luma};
use tracing::{debug, warn};

use crate::{
    traits::Segmenter,
    types::{ImageBuffer, LesionMask},
};

/// ITU-R BT.601 luma of an RGB triple
pub fn luminance([r, g, b]: [u8; 3]) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Marks pixels darker than a luminance threshold as lesion.
///
/// Assumes the lesion is darker than the surrounding skin. An optional Gaussian
/// pre-blur of the luminance plane suppresses hair and sensor noise.
#[derive(Debug, Clone)]
pub struct LuminanceSegmenter {
    pub threshold: u8,
    pub blur_sigma: Option<f32>,
}

impl Default for LuminanceSegmenter {
    fn default() -> Self {
        Self {
            threshold: 128,
            blur_sigma: None,
        }
    }
}

impl LuminanceSegmenter {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur_sigma = Some(sigma);
        self
    }

    fn luma_plane(image: &ImageBuffer) -> GrayImage {
        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([luminance(image.rgb_at(x, y)).round().min(255.0) as u8])
        })
    }
}

impl Segmenter for LuminanceSegmenter {
    fn segment(&self, image: &ImageBuffer) -> LesionMask {
        let threshold = self.threshold as f64;
        let (width, height) = image.dimensions();

        let mask = match self.blur_sigma.filter(|sigma| *sigma > 0.0) {
            Some(sigma) => {
                let blurred = imageproc::filter::gaussian_blur_f32(&Self::luma_plane(image), sigma);
                LesionMask::from_fn(width, height, |x, y| {
                    (blurred.get_pixel(x, y).0[0] as f64) < threshold
                })
            }
            None => LesionMask::from_fn(width, height, |x, y| {
                luminance(image.rgb_at(x, y)) < threshold
            }),
        };

        if mask.is_empty() {
            warn!(threshold = self.threshold, "No pixels below luminance threshold; lesion mask is empty");
        } else {
            debug!(area = mask.area(), bbox = ?mask.bbox(), "Segmented lesion region");
        }

        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn spot_image() -> ImageBuffer {
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([230, 200, 180, 255]));
        for y in 10..20 {
            for x in 5..25 {
                img.put_pixel(x, y, Rgba([60, 30, 20, 255]));
            }
        }
        ImageBuffer::from_rgba(img).expect("valid image")
    }

    #[test]
    fn test_luminance_weights() {
        assert_eq!(luminance([0, 0, 0]), 0.0);
        assert!((luminance([255, 255, 255]) - 255.0).abs() < 1e-9);
        assert!((luminance([100, 0, 0]) - 29.9).abs() < 1e-9);
    }

    #[test]
    fn test_dark_region_is_segmented() {
        let mask = LuminanceSegmenter::default().segment(&spot_image());
        let bbox = mask.bbox().expect("lesion found");
        assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (5, 10, 24, 19));
        assert_eq!(mask.area(), 200);
    }

    #[test]
    fn test_white_image_yields_empty_mask() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let image = ImageBuffer::from_rgba(img).expect("valid image");
        let mask = LuminanceSegmenter::default().segment(&image);
        assert!(mask.is_empty());
        assert_eq!(mask.area(), 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let image = ImageBuffer::from_rgba(img).expect("valid image");
        assert!(LuminanceSegmenter::new(0).segment(&image).is_empty());
        assert_eq!(LuminanceSegmenter::new(1).segment(&image).area(), 16);
    }

    #[test]
    fn test_blurred_segmentation_keeps_large_spot() {
        let mask = LuminanceSegmenter::default().with_blur(1.0).segment(&spot_image());
        let bbox = mask.bbox().expect("lesion found");
        assert!(bbox.contains(15, 15));
        assert!(mask.area() > 100);
    }
}
