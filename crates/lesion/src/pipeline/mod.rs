pub mod builder;

use tracing::{info, instrument};

use crate::{
    algorithms::{ColorAnalyzer, ShapeAnalyzer},
    classifier::ClassifierAdapter,
    config::AnalysisConfig,
    error::{LesionError, Result},
    report::AnalysisReport,
    scoring::{ConditionScorer, RiskScorer},
    traits::{Classifier, Segmenter},
    types::{ColorDescriptor, ImageBuffer, LesionAnalysis, LesionMask, MorphologyDescriptor},
};

use std::sync::Arc;

/// Classifier-independent measurements of one image
#[derive(Debug, Clone, PartialEq)]
pub struct LesionDescriptors {
    pub mask: LesionMask,
    pub morphology: MorphologyDescriptor,
    pub color: ColorDescriptor,
}

/// Segmentation, descriptors, one classifier call and both scorers in a single pass
pub struct AnalysisPipeline {
    segmenter: Box<dyn Segmenter>,
    shape_analyzer: ShapeAnalyzer,
    color_analyzer: ColorAnalyzer,
    classifier: ClassifierAdapter,
    risk_scorer: RiskScorer,
    condition_scorer: ConditionScorer,
}

impl AnalysisPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        segmenter: Box<dyn Segmenter>,
        shape_analyzer: ShapeAnalyzer,
        color_analyzer: ColorAnalyzer,
        classifier: ClassifierAdapter,
        risk_scorer: RiskScorer,
        condition_scorer: ConditionScorer,
    ) -> Self {
        Self {
            segmenter,
            shape_analyzer,
            color_analyzer,
            classifier,
            risk_scorer,
            condition_scorer,
        }
    }

    /// Build from configuration; the configuration must name a classifier backend
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Self::builder().with_config(config).build()
    }

    /// Build from configuration with a caller-supplied classifier
    pub fn from_config_with_classifier(
        config: &AnalysisConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        config.validate()?;
        Self::builder()
            .with_config(config)
            .with_shared_classifier(classifier)
            .build()
    }

    /// Segment the image and measure the lesion, without consulting the classifier
    pub fn describe(&self, image: &ImageBuffer) -> LesionDescriptors {
        let mask = self.segmenter.segment(image);
        let morphology = self.shape_analyzer.analyze(&mask);
        let color = self.color_analyzer.analyze(image, &mask);
        LesionDescriptors {
            mask,
            morphology,
            color,
        }
    }

    /// Produce the risk and condition assessments for one photograph
    pub async fn analyze(&self, image: &ImageBuffer) -> Result<LesionAnalysis> {
        Ok(self.analyze_detailed(image).await?.analysis)
    }

    /// Like [`Self::analyze`], also returning descriptors, predictions and recommendations
    pub async fn analyze_detailed(&self, image: &ImageBuffer) -> Result<AnalysisReport> {
        Ok(self.analyze_with_descriptors(image).await?.0)
    }

    /// Like [`Self::analyze_detailed`], also handing back the lesion mask and descriptors
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn analyze_with_descriptors(
        &self,
        image: &ImageBuffer,
    ) -> Result<(AnalysisReport, LesionDescriptors)> {
        // segmentation stays outside the classifier timeout
        let descriptors = self.describe(image);
        let classification = self.classifier.classify(image).await?;

        let top = classification.top().ok_or_else(|| {
            LesionError::classifier_unavailable("classifier returned no predictions")
        })?;

        let risk = self
            .risk_scorer
            .score(top, &descriptors.morphology, &descriptors.color);
        let condition = self.condition_scorer.score(&classification.predictions);

        info!(
            top_label = %top.label,
            cancer_percentage = risk.cancer_percentage,
            primary_condition = %condition.primary_condition,
            lesion_area = descriptors.morphology.area_px,
            "Lesion analysis complete"
        );

        let report = AnalysisReport::new(
            LesionAnalysis { risk, condition },
            &descriptors,
            classification.predictions,
        );
        Ok((report, descriptors))
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: classifier '{}' (timeout {:?}), {} colour buckets of width {}, {:.1} px/mm, {} condition rules",
            self.classifier.backend_name(),
            self.classifier.timeout(),
            self.color_analyzer.max_colors,
            self.color_analyzer.bucket_width,
            self.risk_scorer.px_per_mm,
            self.condition_scorer.lexicon.rules.len(),
        )
    }
}
