//! # Skin Lesion Analysis Library
//!
//! Image-analysis core of a skin-lesion triage tool. Given one photograph it
//! isolates the candidate lesion, measures its shape and colour, and fuses
//! those descriptors with the output of a general-purpose image classifier
//! into a bounded cancer-risk score and a skin-condition distribution.
//!
//! ## Core Features
//!
//! - **Segmentation**: luminance thresholding into a lesion mask with a tight bounding box
//! - **Morphology**: area, perimeter, diameter, circularity, asymmetry, border irregularity
//! - **Colour**: colour spread and bucketed dominant colours
//! - **Classifier boundary**: timeout, sanitation, lazy model loading; failures are explicit
//! - **Scoring**: data-driven keyword tables for risk and condition heuristics
//!
//! None of this is a diagnosis. The scores are deterministic heuristics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lesion::{AnalysisPipeline, ClassifierPrediction, FixedClassifier, ImageBuffer};
//!
//! # async fn run() -> lesion::Result<()> {
//! let pipeline = AnalysisPipeline::builder()
//!     .with_classifier(FixedClassifier::new(vec![
//!         ClassifierPrediction::new("mole", 0.7),
//!     ]))
//!     .build()?;
//!
//! let image = ImageBuffer::open("spot.jpg")?;
//! let analysis = pipeline.analyze(&image).await?;
//! println!("risk: {}%", analysis.risk.cancer_percentage);
//! # Ok(())
//! # }
//! ```
//!
//! ## From Configuration
//!
//! ```rust,no_run
//! use lesion::{AnalysisConfig, AnalysisPipeline};
//!
//! let config = AnalysisConfig::from_toml(r#"
//!     [segmentation]
//!     threshold = 110
//!
//!     [classifier.backend]
//!     kind = "command"
//!     program = "classify-skin"
//! "#)?;
//! let pipeline = AnalysisPipeline::from_config(&config)?;
//! # Ok::<(), lesion::LesionError>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod classifier;
pub mod scoring;
pub mod pipeline;
pub mod report;
pub mod config;

// Re-exports for convenience
pub use error::{LesionError, Result};
pub use types::*;
pub use traits::*;
pub use algorithms::{ColorAnalyzer, LuminanceSegmenter, ShapeAnalyzer};
pub use classifier::{
    ClassifierAdapter, ClassifierKind, CommandClassifier, CentroidClassifier, FixedClassifier,
    LazyClassifier,
};
pub use scoring::{ConditionScorer, RiskScorer, RiskThresholds, ScoringLexicon};
pub use pipeline::{AnalysisPipeline, LesionDescriptors, builder::PipelineBuilder};
pub use report::{AnalysisReport, RiskLevel, recommendations};
pub use config::AnalysisConfig;
