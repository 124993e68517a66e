use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lexicon::{LabelCategory, RiskLexicon};
use crate::types::{
    ClassifierPrediction, ColorDescriptor, MorphologyDescriptor, RiskAssessment, RiskPatterns,
};

/// The score never claims zero or certain risk
pub const MIN_CANCER_PERCENTAGE: u8 = 5;
pub const MAX_CANCER_PERCENTAGE: u8 = 95;

/// Descriptor levels above which a pattern flag is raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub asymmetry: f64,
    pub border: f64,
    pub color: f64,
    /// Applied to the diameter normalized by `diameter_reference_mm`
    pub diameter: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            asymmetry: 0.6,
            border: 0.55,
            color: 0.65,
            diameter: 0.5,
        }
    }
}

/// Fuses the top classifier prediction with lesion descriptors
#[derive(Debug, Clone)]
pub struct RiskScorer {
    pub lexicon: RiskLexicon,
    pub thresholds: RiskThresholds,
    pub px_per_mm: f64,
    pub diameter_reference_mm: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            lexicon: RiskLexicon::default(),
            thresholds: RiskThresholds::default(),
            px_per_mm: 10.0,
            diameter_reference_mm: 12.0,
        }
    }
}

impl RiskScorer {
    pub fn score(
        &self,
        top: &ClassifierPrediction,
        shape: &MorphologyDescriptor,
        color: &ColorDescriptor,
    ) -> RiskAssessment {
        let confidence = if top.confidence.is_finite() {
            top.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let category = self.lexicon.categorize(&top.label);
        let cancer_percentage = clamp_percentage(base_percentage(category, confidence));

        let diameter = self.normalized_diameter(shape);
        let patterns = RiskPatterns {
            asymmetry: shape.asymmetry_score > self.thresholds.asymmetry,
            border: shape.border_irregularity > self.thresholds.border,
            color: color.color_variation > self.thresholds.color,
            diameter: diameter > self.thresholds.diameter,
            evolving: false,
        };

        debug!(
            label = %top.label,
            ?category,
            cancer_percentage,
            normalized_diameter = diameter,
            ?patterns,
            "Scored cancer risk"
        );

        RiskAssessment {
            cancer_percentage,
            confidence,
            patterns,
        }
    }

    /// Diameter in millimetres relative to the reference diameter, within `[0, 1]`
    pub fn normalized_diameter(&self, shape: &MorphologyDescriptor) -> f64 {
        if self.diameter_reference_mm <= 0.0 {
            return 0.0;
        }
        let ratio = shape.diameter_mm(self.px_per_mm) / self.diameter_reference_mm;
        if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 }
    }
}

/// Unclamped percentage for a label category at the given confidence
pub fn base_percentage(category: LabelCategory, confidence: f64) -> f64 {
    match category {
        LabelCategory::Cancer => confidence * 100.0,
        LabelCategory::Skin => confidence * 30.0 + 10.0,
        LabelCategory::Other => confidence * 15.0 + 5.0,
    }
}

pub fn clamp_percentage(raw: f64) -> u8 {
    let rounded = if raw.is_finite() { raw.round() } else { 0.0 };
    rounded.clamp(MIN_CANCER_PERCENTAGE as f64, MAX_CANCER_PERCENTAGE as f64) as u8
}
