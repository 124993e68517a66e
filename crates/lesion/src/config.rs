use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    classifier::{ClassifierKind, MAX_PREDICTIONS},
    error::{LesionError, Result},
    scoring::{RiskThresholds, ScoringLexicon},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Pixels with luminance strictly below this are lesion
    pub threshold: u8,
    /// Gaussian pre-blur of the luminance plane, off when unset
    pub blur_sigma: Option<f32>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            blur_sigma: None,
        }
    }
}

/// Pixel-to-millimetre conversion. These are tunable assumptions, not a calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyConfig {
    pub px_per_mm: f64,
    pub diameter_reference_mm: f64,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            px_per_mm: 10.0,
            diameter_reference_mm: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub bucket_width: u8,
    pub max_colors: usize,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            bucket_width: 32,
            max_colors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub timeout_ms: u64,
    pub max_predictions: usize,
    pub backend: Option<ClassifierKind>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_predictions: MAX_PREDICTIONS,
            backend: None,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Every tunable of the analysis pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmentation: SegmentationConfig,
    pub morphology: MorphologyConfig,
    pub color: ColorConfig,
    pub risk: RiskThresholds,
    pub classifier: ClassifierConfig,
    pub lexicon: ScoringLexicon,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(LesionError::InvalidConfig(format!(
                "unsupported config format: {} (use .toml or .json)",
                path_ref.display()
            ))),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(LesionError::InvalidConfig(msg));

        if let Some(sigma) = self.segmentation.blur_sigma {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return invalid(format!("segmentation.blur_sigma must be >= 0, got {sigma}"));
            }
        }
        if !(self.morphology.px_per_mm.is_finite() && self.morphology.px_per_mm > 0.0) {
            return invalid(format!(
                "morphology.px_per_mm must be positive, got {}",
                self.morphology.px_per_mm
            ));
        }
        if !(self.morphology.diameter_reference_mm.is_finite()
            && self.morphology.diameter_reference_mm > 0.0)
        {
            return invalid(format!(
                "morphology.diameter_reference_mm must be positive, got {}",
                self.morphology.diameter_reference_mm
            ));
        }
        if self.color.bucket_width == 0 {
            return invalid("color.bucket_width must be at least 1".into());
        }
        if self.color.max_colors == 0 {
            return invalid("color.max_colors must be at least 1".into());
        }
        if !(1..=MAX_PREDICTIONS).contains(&self.classifier.max_predictions) {
            return invalid(format!(
                "classifier.max_predictions must be within 1..={MAX_PREDICTIONS}, got {}",
                self.classifier.max_predictions
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return invalid("classifier.timeout_ms must be positive".into());
        }

        self.lexicon.validate()
    }
}
