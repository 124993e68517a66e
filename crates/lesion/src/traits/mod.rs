use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{ClassifierPrediction, ImageBuffer, LesionMask},
};

/// Trait for lesion segmentation algorithms
pub trait Segmenter: Send + Sync {
    /// Separate the candidate lesion from the surrounding skin
    fn segment(&self, image: &ImageBuffer) -> LesionMask;
}

/// Capability of a general-purpose image classifier.
///
/// Implementations return raw predictions; ordering, clamping and truncation
/// are enforced by [`crate::classifier::ClassifierAdapter`].
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the image into free-form labels with confidences
    async fn classify(&self, image: &ImageBuffer) -> Result<Vec<ClassifierPrediction>>;

    /// Short backend name used in logs
    fn name(&self) -> &str;
}

/// Trait for acquiring an expensive classifier model
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model; called at most once per successful load
    async fn load(&self) -> Result<Arc<dyn Classifier>>;

    /// Human-readable description of what is loaded
    fn describe(&self) -> String;
}
