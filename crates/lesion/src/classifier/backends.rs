use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    error::{LesionError, Result},
    traits::{Classifier, ModelLoader},
    types::{ClassifierPrediction, ImageBuffer},
};

/// Returns the same predictions for every image
#[derive(Debug, Clone)]
pub struct FixedClassifier {
    predictions: Vec<ClassifierPrediction>,
}

impl FixedClassifier {
    pub fn new(predictions: Vec<ClassifierPrediction>) -> Self {
        Self { predictions }
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _image: &ImageBuffer) -> Result<Vec<ClassifierPrediction>> {
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// External classifier process.
///
/// The image is written as PNG to a temporary file whose path is appended to
/// `args`; the process must print its predictions as JSON on stdout, either a
/// bare array of `{label, confidence}` or an object with a `predictions` array.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandOutput {
    Bare(Vec<ClassifierPrediction>),
    Wrapped { predictions: Vec<ClassifierPrediction> },
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn parse_output(stdout: &[u8]) -> Result<Vec<ClassifierPrediction>> {
        let parsed: CommandOutput = serde_json::from_slice(stdout).map_err(|e| {
            LesionError::classifier_unavailable(format!("unparsable classifier output: {e}"))
        })?;

        Ok(match parsed {
            CommandOutput::Bare(predictions) => predictions,
            CommandOutput::Wrapped { predictions } => predictions,
        })
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    async fn classify(&self, image: &ImageBuffer) -> Result<Vec<ClassifierPrediction>> {
        // removed when dropped, on every return path
        let input = tempfile::Builder::new()
            .prefix("lesion-")
            .suffix(".png")
            .tempfile()?;
        image.as_rgba().save_with_format(input.path(), ImageFormat::Png)?;

        debug!(program = %self.program, input = ?input.path(), "Running classifier process");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LesionError::classifier_unavailable(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            return Err(LesionError::classifier_unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Self::parse_output(&output.stdout)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// A labelled reference colour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorCentroid {
    pub label: String,
    pub rgb: [f64; 3],
}

/// Weights file of the centroid model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidWeights {
    pub centroids: Vec<ColorCentroid>,
}

/// Custom nearest-colour model: softmax over negative distances between the
/// image mean colour and each labelled centroid
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    weights: CentroidWeights,
    temperature: f64,
}

impl CentroidClassifier {
    pub fn new(weights: CentroidWeights, temperature: f64) -> Result<Self> {
        if weights.centroids.is_empty() {
            return Err(LesionError::InvalidConfig("centroid model has no centroids".into()));
        }
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(LesionError::InvalidConfig(format!(
                "centroid temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self { weights, temperature })
    }

    fn mean_color(image: &ImageBuffer) -> [f64; 3] {
        let mut sum = [0.0f64; 3];
        for px in image.as_rgba().pixels() {
            for c in 0..3 {
                sum[c] += px.0[c] as f64;
            }
        }
        let n = image.pixel_count().max(1) as f64;
        sum.map(|s| s / n)
    }

    pub fn predict(&self, mean: [f64; 3]) -> Vec<ClassifierPrediction> {
        let logits: Vec<f64> = self
            .weights
            .centroids
            .iter()
            .map(|centroid| {
                let d2: f64 = (0..3).map(|c| (mean[c] - centroid.rgb[c]).powi(2)).sum();
                -d2.sqrt() / self.temperature
            })
            .collect();

        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();

        let mut predictions: Vec<ClassifierPrediction> = self
            .weights
            .centroids
            .iter()
            .zip(exps)
            .map(|(centroid, e)| ClassifierPrediction::new(centroid.label.clone(), e / total))
            .collect();
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        predictions
    }
}

#[async_trait]
impl Classifier for CentroidClassifier {
    async fn classify(&self, image: &ImageBuffer) -> Result<Vec<ClassifierPrediction>> {
        Ok(self.predict(Self::mean_color(image)))
    }

    fn name(&self) -> &str {
        "centroid"
    }
}

/// Reads [`CentroidWeights`] from a JSON file
#[derive(Debug, Clone)]
pub struct CentroidModelLoader {
    pub weights_path: PathBuf,
    pub temperature: f64,
}

#[async_trait]
impl ModelLoader for CentroidModelLoader {
    async fn load(&self) -> Result<Arc<dyn Classifier>> {
        if !self.weights_path.exists() {
            return Err(LesionError::classifier_unavailable(format!(
                "weights file not found: {}",
                self.weights_path.display()
            )));
        }

        let content = tokio::fs::read_to_string(&self.weights_path).await?;
        let weights: CentroidWeights = serde_json::from_str(&content)?;
        info!(
            path = %self.weights_path.display(),
            centroids = weights.centroids.len(),
            "Loaded centroid weights"
        );

        Ok(Arc::new(CentroidClassifier::new(weights, self.temperature)?))
    }

    fn describe(&self) -> String {
        format!("centroid:{}", self.weights_path.display())
    }
}
