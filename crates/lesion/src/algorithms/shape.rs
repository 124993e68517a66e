use std::f64::consts::PI;

use tracing::debug;

use crate::types::{LesionMask, MorphologyDescriptor, ShapeLabel};

/// Computes size, shape and border descriptors of a lesion mask.
///
/// Perimeter is the number of member cells with a 4-neighbour outside the
/// lesion, an approximation of contour length rather than a traced outline.
/// Every ratio is clamped into `[0, 1]` and an empty mask yields
/// [`MorphologyDescriptor::empty`].
#[derive(Debug, Clone, Default)]
pub struct ShapeAnalyzer;

impl ShapeAnalyzer {
    pub fn analyze(&self, mask: &LesionMask) -> MorphologyDescriptor {
        let Some(bbox) = mask.bbox() else {
            return MorphologyDescriptor::empty();
        };

        let mid_x = bbox.mid_x();
        let mut area = 0u64;
        let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
        let (mut left, mut right) = (0u64, 0u64);
        let mut boundary = Vec::new();

        for (x, y) in mask.members() {
            area += 1;
            sum_x += x as f64;
            sum_y += y as f64;

            let fx = x as f64;
            if fx < mid_x {
                left += 1;
            } else if fx > mid_x {
                right += 1;
            }

            if mask.is_boundary(x, y) {
                boundary.push((x, y));
            }
        }

        let perimeter = boundary.len() as u64;
        let diameter = 2.0 * (area as f64 / PI).sqrt();
        let centroid = (sum_x / area as f64, sum_y / area as f64);

        let width = bbox.width();
        let height = bbox.height();
        let aspect_ratio = if width == 0 || height == 0 {
            1.0
        } else {
            width as f64 / height as f64
        };

        let circularity = circularity(area, perimeter);
        let asymmetry_score = asymmetry(left, right);
        let border_irregularity = border_irregularity(&boundary, centroid, diameter / 2.0);
        let shape_label = classify_shape(aspect_ratio, circularity);

        debug!(
            area,
            perimeter,
            circularity,
            asymmetry_score,
            border_irregularity,
            %shape_label,
            "Computed lesion morphology"
        );

        MorphologyDescriptor {
            area_px: area,
            perimeter_px: perimeter,
            diameter_px: diameter,
            width_px: width,
            height_px: height,
            aspect_ratio,
            circularity,
            asymmetry_score,
            border_irregularity,
            shape_label,
        }
    }
}

fn unit_clamp(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

/// `4π·area / perimeter²`, capped at 1
pub fn circularity(area: u64, perimeter: u64) -> f64 {
    if perimeter == 0 {
        return 0.0;
    }
    let p = perimeter as f64;
    unit_clamp(4.0 * PI * area as f64 / (p * p))
}

/// Left/right pixel imbalance about the bounding-box midline
pub fn asymmetry(left: u64, right: u64) -> f64 {
    let total = left + right;
    if total == 0 {
        return 0.0;
    }
    unit_clamp(left.abs_diff(right) as f64 / total as f64)
}

/// Mean absolute deviation of boundary radii from the equivalent-circle radius,
/// relative to that radius
pub fn border_irregularity(boundary: &[(u32, u32)], centroid: (f64, f64), avg_radius: f64) -> f64 {
    if boundary.is_empty() || avg_radius <= 0.0 {
        return 0.0;
    }

    let deviation: f64 = boundary
        .iter()
        .map(|&(x, y)| {
            let dx = x as f64 - centroid.0;
            let dy = y as f64 - centroid.1;
            ((dx * dx + dy * dy).sqrt() - avg_radius).abs()
        })
        .sum();

    unit_clamp(deviation / (boundary.len() as f64 * avg_radius))
}

pub fn classify_shape(aspect_ratio: f64, circularity: f64) -> ShapeLabel {
    if (0.8..=1.2).contains(&aspect_ratio) && circularity > 0.7 {
        ShapeLabel::Round
    } else if aspect_ratio > 1.5 || aspect_ratio < 0.67 {
        ShapeLabel::Irregular
    } else {
        ShapeLabel::Oval
    }
}
