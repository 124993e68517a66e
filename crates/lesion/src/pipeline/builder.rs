use std::sync::Arc;
use std::time::Duration;

use crate::{
    algorithms::{ColorAnalyzer, LuminanceSegmenter, ShapeAnalyzer},
    classifier::{ClassifierAdapter, DEFAULT_TIMEOUT, MAX_PREDICTIONS},
    config::AnalysisConfig,
    error::{LesionError, Result},
    pipeline::AnalysisPipeline,
    scoring::{ConditionScorer, RiskScorer, RiskThresholds, ScoringLexicon},
    traits::{Classifier, Segmenter},
};

/// Builder for analysis pipelines with a fluent API
pub struct PipelineBuilder {
    segmenter: Option<Box<dyn Segmenter>>,
    shape_analyzer: ShapeAnalyzer,
    color_analyzer: ColorAnalyzer,
    classifier: Option<Arc<dyn Classifier>>,
    timeout: Duration,
    max_predictions: usize,
    risk_scorer: RiskScorer,
    condition_scorer: ConditionScorer,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            segmenter: None,
            shape_analyzer: ShapeAnalyzer,
            color_analyzer: ColorAnalyzer::default(),
            classifier: None,
            timeout: DEFAULT_TIMEOUT,
            max_predictions: MAX_PREDICTIONS,
            risk_scorer: RiskScorer::default(),
            condition_scorer: ConditionScorer::default(),
        }
    }

    /// Set the segmenter (replaces any existing one)
    pub fn set_segmenter<S>(mut self, segmenter: S) -> Self
    where
        S: Segmenter + 'static,
    {
        self.segmenter = Some(Box::new(segmenter));
        self
    }

    /// Use luminance thresholding at the given level
    pub fn with_threshold(self, threshold: u8) -> Self {
        self.set_segmenter(LuminanceSegmenter::new(threshold))
    }

    /// Set the classifier backend (replaces any existing one)
    pub fn with_classifier<C>(self, classifier: C) -> Self
    where
        C: Classifier + 'static,
    {
        self.with_shared_classifier(Arc::new(classifier))
    }

    /// Share an already constructed classifier, e.g. one holding a loaded model
    pub fn with_shared_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_predictions(mut self, max_predictions: usize) -> Self {
        self.max_predictions = max_predictions;
        self
    }

    pub fn with_color_buckets(mut self, bucket_width: u8, max_colors: usize) -> Self {
        self.color_analyzer = ColorAnalyzer {
            bucket_width,
            max_colors,
        };
        self
    }

    pub fn with_px_per_mm(mut self, px_per_mm: f64) -> Self {
        self.risk_scorer.px_per_mm = px_per_mm;
        self
    }

    pub fn with_diameter_reference_mm(mut self, diameter_reference_mm: f64) -> Self {
        self.risk_scorer.diameter_reference_mm = diameter_reference_mm;
        self
    }

    pub fn with_risk_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.risk_scorer.thresholds = thresholds;
        self
    }

    /// Replace both keyword tables
    pub fn with_lexicon(mut self, lexicon: ScoringLexicon) -> Self {
        self.risk_scorer.lexicon = lexicon.risk;
        self.condition_scorer.lexicon = lexicon.conditions;
        self
    }

    /// Apply every section of a configuration. A configured backend is only
    /// used if no classifier has been set yet.
    pub fn with_config(self, config: &AnalysisConfig) -> Self {
        let mut segmenter = LuminanceSegmenter::new(config.segmentation.threshold);
        segmenter.blur_sigma = config.segmentation.blur_sigma;

        let mut builder = self
            .set_segmenter(segmenter)
            .with_color_buckets(config.color.bucket_width, config.color.max_colors)
            .with_px_per_mm(config.morphology.px_per_mm)
            .with_diameter_reference_mm(config.morphology.diameter_reference_mm)
            .with_risk_thresholds(config.risk.clone())
            .with_lexicon(config.lexicon.clone())
            .with_timeout(config.classifier.timeout())
            .with_max_predictions(config.classifier.max_predictions);

        if builder.classifier.is_none() {
            if let Some(backend) = &config.classifier.backend {
                builder.classifier = Some(backend.build());
            }
        }
        builder
    }

    /// Build the pipeline; a classifier is required
    pub fn build(self) -> Result<AnalysisPipeline> {
        let classifier = self.classifier.ok_or(LesionError::MissingClassifier)?;
        let adapter = ClassifierAdapter::new(classifier)
            .with_timeout(self.timeout)
            .with_max_predictions(self.max_predictions);

        let segmenter = self
            .segmenter
            .unwrap_or_else(|| Box::new(LuminanceSegmenter::default()));

        Ok(AnalysisPipeline::new(
            segmenter,
            self.shape_analyzer,
            self.color_analyzer,
            adapter,
            self.risk_scorer,
            self.condition_scorer,
        ))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
