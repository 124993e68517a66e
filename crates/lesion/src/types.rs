use std::collections::BTreeMap;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{LesionError, Result};

/// Decoded RGBA raster handed to the pipeline.
///
/// The sample buffer always holds exactly `width * height * 4` bytes; anything
/// else is rejected at construction with [`LesionError::MalformedImage`], and a
/// zero width or height with [`LesionError::EmptyImage`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pixels: RgbaImage,
}

impl ImageBuffer {
    /// Build from raw interleaved RGBA samples
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LesionError::EmptyImage { width, height });
        }

        let actual = samples.len();
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .unwrap_or(usize::MAX);

        let malformed = LesionError::MalformedImage {
            width,
            height,
            expected,
            actual,
        };

        if actual != expected {
            return Err(malformed);
        }

        let pixels = RgbaImage::from_raw(width, height, samples).ok_or(malformed)?;
        Ok(Self { pixels })
    }

    /// Wrap an already decoded RGBA image
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(LesionError::EmptyImage { width, height });
        }
        Ok(Self { pixels })
    }

    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_rgba(image.to_rgba8())
    }

    /// Decode an encoded image (PNG, JPEG, TIFF) from memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_dynamic(&image)
    }

    /// Load and decode an image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?;
        Self::from_dynamic(&image)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Raw RGBA samples in row-major order
    pub fn samples(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let [r, g, b, _] = self.pixels.get_pixel(x, y).0;
        [r, g, b]
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Inclusive pixel bounds of the lesion region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// x coordinate of the vertical midline
    pub fn mid_x(&self) -> f64 {
        (self.min_x as f64 + self.max_x as f64) / 2.0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Per-pixel membership map of the candidate lesion.
///
/// The bounding box is derived from the membership cells on construction and is
/// `None` exactly when the mask is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LesionMask {
    width: u32,
    height: u32,
    membership: Vec<bool>,
    bbox: Option<BoundingBox>,
}

impl LesionMask {
    pub fn from_membership(width: u32, height: u32, membership: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if membership.len() != expected {
            return Err(LesionError::InvalidMask {
                expected,
                actual: membership.len(),
            });
        }

        let bbox = tight_bbox(width, &membership);
        Ok(Self {
            width,
            height,
            membership,
            bbox,
        })
    }

    /// Build a mask by evaluating `is_member` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut is_member: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut membership = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                membership.push(is_member(x, y));
            }
        }

        let bbox = tight_bbox(width, &membership);
        Self {
            width,
            height,
            membership,
            bbox,
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| false)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    pub fn membership(&self) -> &[bool] {
        &self.membership
    }

    /// Membership lookup; coordinates outside the raster are never members
    pub fn contains(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.membership[y as usize * self.width as usize + x as usize]
    }

    pub fn area(&self) -> u64 {
        self.membership.iter().filter(|&&m| m).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bbox.is_none()
    }

    /// Coordinates of all member cells in row-major order
    pub fn members(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.membership
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }

    /// A member cell with at least one 4-neighbour outside the lesion
    pub fn is_boundary(&self, x: u32, y: u32) -> bool {
        let (x, y) = (x as i64, y as i64);
        self.contains(x, y)
            && (!self.contains(x - 1, y)
                || !self.contains(x + 1, y)
                || !self.contains(x, y - 1)
                || !self.contains(x, y + 1))
    }

    /// Render as a grayscale image, lesion cells white
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.contains(x as i64, y as i64) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

fn tight_bbox(width: u32, membership: &[bool]) -> Option<BoundingBox> {
    if width == 0 {
        return None;
    }

    let width = width as usize;
    let mut bbox: Option<BoundingBox> = None;
    for (i, _) in membership.iter().enumerate().filter(|(_, m)| **m) {
        let (x, y) = ((i % width) as u32, (i / width) as u32);
        bbox = Some(match bbox {
            None => BoundingBox {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => BoundingBox {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bbox
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
pub enum ShapeLabel {
    Round,
    Oval,
    Irregular,
}

/// Shape, size and border measurements of a lesion mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MorphologyDescriptor {
    pub area_px: u64,
    pub perimeter_px: u64,
    pub diameter_px: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub aspect_ratio: f64,
    pub circularity: f64,
    pub asymmetry_score: f64,
    pub border_irregularity: f64,
    pub shape_label: ShapeLabel,
}

impl MorphologyDescriptor {
    /// Neutral descriptor reported for an empty mask
    pub fn empty() -> Self {
        Self {
            area_px: 0,
            perimeter_px: 0,
            diameter_px: 0.0,
            width_px: 0,
            height_px: 0,
            aspect_ratio: 1.0,
            circularity: 0.0,
            asymmetry_score: 0.0,
            border_irregularity: 0.0,
            shape_label: ShapeLabel::Oval,
        }
    }

    pub fn diameter_mm(&self, px_per_mm: f64) -> f64 {
        if px_per_mm > 0.0 {
            self.diameter_px / px_per_mm
        } else {
            0.0
        }
    }
}

impl Default for MorphologyDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DominantColor {
    /// Lower corner of the quantization bucket
    pub rgb: [u8; 3],
    /// Share of lesion pixels in this bucket, 0-100
    pub percentage: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorDescriptor {
    pub color_variation: f64,
    pub dominant_colors: Vec<DominantColor>,
}

/// One (label, confidence) pair from the general-purpose classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierPrediction {
    pub label: String,
    pub confidence: f64,
}

impl ClassifierPrediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Sanitized classifier output: non-empty, confidence-descending, at most three entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierResult {
    pub predictions: Vec<ClassifierPrediction>,
}

impl ClassifierResult {
    pub fn top(&self) -> Option<&ClassifierPrediction> {
        self.predictions.first()
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RiskPatterns {
    pub asymmetry: bool,
    pub border: bool,
    pub color: bool,
    pub diameter: bool,
    /// Always false: a single photograph cannot show change over time.
    pub evolving: bool,
}

impl RiskPatterns {
    pub fn raised_count(&self) -> usize {
        [self.asymmetry, self.border, self.color, self.diameter, self.evolving]
            .iter()
            .filter(|&&flag| flag)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Bounded to 5..=95
    pub cancer_percentage: u8,
    pub confidence: f64,
    pub patterns: RiskPatterns,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum Condition {
    BacterialInfection,
    FungalInfection,
    ViralInfection,
    Eczema,
    Psoriasis,
    NormalSkin,
}

impl Condition {
    pub fn description(&self) -> &'static str {
        match self {
            Self::BacterialInfection => "Bacterial skin infection",
            Self::FungalInfection => "Fungal skin infection",
            Self::ViralInfection => "Viral skin infection",
            Self::Eczema => "Eczema / dermatitis",
            Self::Psoriasis => "Psoriasis",
            Self::NormalSkin => "No apparent skin condition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionAssessment {
    pub primary_condition: Condition,
    /// Share of the primary condition, 0-100
    pub confidence: u8,
    /// Every condition with its integer share; the shares sum to exactly 100
    pub all_conditions: BTreeMap<Condition, u8>,
    pub has_condition: bool,
}

/// The two assessments produced for one photograph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LesionAnalysis {
    pub risk: RiskAssessment,
    pub condition: ConditionAssessment,
}
