use std::collections::HashMap;

use tracing::debug;

use crate::types::{ColorDescriptor, DominantColor, ImageBuffer, LesionMask};

/// Colour spread and dominant colours of the lesion pixels
#[derive(Debug, Clone)]
pub struct ColorAnalyzer {
    /// Width of the per-channel quantization buckets
    pub bucket_width: u8,
    pub max_colors: usize,
}

impl Default for ColorAnalyzer {
    fn default() -> Self {
        Self {
            bucket_width: 32,
            max_colors: 3,
        }
    }
}

impl ColorAnalyzer {
    pub fn analyze(&self, image: &ImageBuffer, mask: &LesionMask) -> ColorDescriptor {
        let (width, height) = image.dimensions();
        let pixels: Vec<[u8; 3]> = mask
            .members()
            .filter(|&(x, y)| x < width && y < height)
            .map(|(x, y)| image.rgb_at(x, y))
            .collect();

        if pixels.is_empty() {
            return ColorDescriptor::default();
        }

        let descriptor = ColorDescriptor {
            color_variation: color_variation(&pixels),
            dominant_colors: self.dominant_colors(&pixels),
        };

        debug!(
            pixels = pixels.len(),
            color_variation = descriptor.color_variation,
            dominant = descriptor.dominant_colors.len(),
            "Computed lesion colour profile"
        );

        descriptor
    }

    fn quantize(&self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        let step = self.bucket_width.max(1);
        [(r / step) * step, (g / step) * step, (b / step) * step]
    }

    fn dominant_colors(&self, pixels: &[[u8; 3]]) -> Vec<DominantColor> {
        let mut counts: HashMap<[u8; 3], u64> = HashMap::new();
        for &px in pixels {
            *counts.entry(self.quantize(px)).or_insert(0) += 1;
        }

        let mut sorted: Vec<_> = counts.into_iter().collect();
        // ties broken by bucket so the output is deterministic
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let total = pixels.len() as f64;
        sorted
            .into_iter()
            .take(self.max_colors)
            .map(|(rgb, count)| DominantColor {
                rgb,
                percentage: (100.0 * count as f64 / total).round().min(100.0) as u8,
            })
            .collect()
    }
}

/// Root-mean-square per-channel deviation from the mean colour, scaled to `[0, 1]`
pub fn color_variation(pixels: &[[u8; 3]]) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }

    let n = pixels.len() as f64;
    let mut mean = [0.0f64; 3];
    for px in pixels {
        for c in 0..3 {
            mean[c] += px[c] as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let squared: f64 = pixels
        .iter()
        .map(|px| {
            (0..3)
                .map(|c| {
                    let d = px[c] as f64 - mean[c];
                    d * d
                })
                .sum::<f64>()
        })
        .sum();

    let rms = (squared / (n * 3.0)).sqrt();
    (rms / 255.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn image_from_fn<F>(width: u32, height: u32, f: F) -> ImageBuffer
    where
        F: Fn(u32, u32) -> [u8; 3],
    {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = f(x, y);
            Rgba([r, g, b, 255])
        });
        ImageBuffer::from_rgba(img).expect("valid image")
    }

    #[test]
    fn test_empty_mask_has_no_colors() {
        let image = image_from_fn(8, 8, |_, _| [255, 255, 255]);
        let d = ColorAnalyzer::default().analyze(&image, &LesionMask::empty(8, 8));
        assert_eq!(d.color_variation, 0.0);
        assert!(d.dominant_colors.is_empty());
    }

    #[test]
    fn test_uniform_lesion() {
        let image = image_from_fn(10, 10, |_, _| [90, 50, 40]);
        let mask = LesionMask::from_fn(10, 10, |x, _| x < 5);
        let d = ColorAnalyzer::default().analyze(&image, &mask);
        assert_eq!(d.color_variation, 0.0);
        assert_eq!(
            d.dominant_colors,
            vec![DominantColor { rgb: [64, 32, 32], percentage: 100 }]
        );
    }

    #[test]
    fn test_black_and_white_halves() {
        let image = image_from_fn(10, 10, |x, _| if x < 5 { [0, 0, 0] } else { [255, 255, 255] });
        let mask = LesionMask::from_fn(10, 10, |_, _| true);
        let d = ColorAnalyzer::default().analyze(&image, &mask);
        assert!((d.color_variation - 0.5).abs() < 1e-9);
        assert_eq!(d.dominant_colors.len(), 2);
        assert_eq!(d.dominant_colors[0].rgb, [0, 0, 0]);
        assert_eq!(d.dominant_colors[1].rgb, [224, 224, 224]);
        assert!(d.dominant_colors.iter().all(|c| c.percentage == 50));
    }

    #[test]
    fn test_top_three_by_frequency() {
        // columns: 4 dark brown, 3 red, 2 tan, 1 blue
        let image = image_from_fn(10, 1, |x, _| match x {
            0..=3 => [70, 40, 20],
            4..=6 => [200, 20, 20],
            7..=8 => [210, 170, 140],
            _ => [20, 20, 200],
        });
        let mask = LesionMask::from_fn(10, 1, |_, _| true);
        let d = ColorAnalyzer::default().analyze(&image, &mask);

        let percentages: Vec<u8> = d.dominant_colors.iter().map(|c| c.percentage).collect();
        assert_eq!(percentages, vec![40, 30, 20]);
        assert_eq!(d.dominant_colors[0].rgb, [64, 32, 0]);
        assert!(d.color_variation > 0.0 && d.color_variation <= 1.0);
    }

    #[test]
    fn test_quantize_buckets() {
        let analyzer = ColorAnalyzer::default();
        assert_eq!(analyzer.quantize([0, 31, 32]), [0, 0, 32]);
        assert_eq!(analyzer.quantize([255, 224, 223]), [224, 224, 192]);
    }
}
