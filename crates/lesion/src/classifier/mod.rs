//! Boundary around the externally supplied image classifier.
//!
//! [`ClassifierAdapter`] is the only way the pipeline talks to a classifier. It
//! bounds the call with a timeout and normalizes whatever the backend returns
//! into a [`ClassifierResult`]. Every failure surfaces as
//! [`LesionError::ClassifierUnavailable`]; there is no fallback scoring.

pub mod backends;
pub mod lazy;

pub use backends::*;
pub use lazy::LazyClassifier;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};

use crate::{
    error::{LesionError, Result},
    traits::Classifier,
    types::{ClassifierPrediction, ClassifierResult, ImageBuffer},
};

/// Upper bound on predictions handed to the scorers
pub const MAX_PREDICTIONS: usize = 3;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_temperature() -> f64 {
    25.0
}

/// Classifier backend selected at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassifierKind {
    /// General-purpose classifier run as an external process
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Custom colour-centroid model loaded lazily from a weights file
    Centroid {
        weights_path: PathBuf,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    /// Deterministic predictions, for offline runs
    Fixed { predictions: Vec<ClassifierPrediction> },
}

impl ClassifierKind {
    pub fn build(&self) -> Arc<dyn Classifier> {
        match self {
            Self::Command { program, args } => {
                Arc::new(CommandClassifier::new(program.clone(), args.clone()))
            }
            Self::Centroid {
                weights_path,
                temperature,
            } => Arc::new(LazyClassifier::new(CentroidModelLoader {
                weights_path: weights_path.clone(),
                temperature: *temperature,
            })),
            Self::Fixed { predictions } => Arc::new(FixedClassifier::new(predictions.clone())),
        }
    }
}

#[derive(Clone)]
pub struct ClassifierAdapter {
    backend: Arc<dyn Classifier>,
    timeout: Duration,
    max_predictions: usize,
}

impl ClassifierAdapter {
    pub fn new(backend: Arc<dyn Classifier>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
            max_predictions: MAX_PREDICTIONS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clamped to `1..=3`
    pub fn with_max_predictions(mut self, max_predictions: usize) -> Self {
        self.max_predictions = max_predictions.clamp(1, MAX_PREDICTIONS);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the backend once and return at most three predictions, highest confidence first
    pub async fn classify(&self, image: &ImageBuffer) -> Result<ClassifierResult> {
        let backend = self.backend.name().to_string();

        let raw = match tokio::time::timeout(self.timeout, self.backend.classify(image)).await {
            Ok(Ok(predictions)) => predictions,
            Ok(Err(err)) => {
                warn!(%backend, %err, "Classifier failed");
                return Err(match err {
                    unavailable @ LesionError::ClassifierUnavailable { .. } => unavailable,
                    other => LesionError::classifier_unavailable(format!("{backend}: {other}")),
                });
            }
            Err(_) => {
                warn!(%backend, timeout = ?self.timeout, "Classifier timed out");
                return Err(LesionError::classifier_unavailable(format!(
                    "{backend} timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let predictions = sanitize_predictions(raw, self.max_predictions);
        if predictions.is_empty() {
            return Err(LesionError::classifier_unavailable(format!(
                "{backend} returned no usable predictions"
            )));
        }

        debug!(%backend, ?predictions, "Classifier predictions");
        Ok(ClassifierResult { predictions })
    }
}

/// Drop non-finite confidences, clamp the rest into `[0, 1]`, sort descending
/// and keep the first `max`
pub fn sanitize_predictions(
    raw: Vec<ClassifierPrediction>,
    max: usize,
) -> Vec<ClassifierPrediction> {
    let mut predictions: Vec<ClassifierPrediction> = raw
        .into_iter()
        .filter_map(|mut prediction| {
            if !prediction.confidence.is_finite() {
                warn!(label = %prediction.label, "Dropping prediction with non-finite confidence");
                return None;
            }
            prediction.confidence = prediction.confidence.clamp(0.0, 1.0);
            Some(prediction)
        })
        .collect();

    // stable: equal confidences keep the backend's order
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions.truncate(max);
    predictions
}
