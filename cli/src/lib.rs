use chrono::{DateTime, Utc};
use lesion::{AnalysisConfig, AnalysisReport, ClassifierKind, LesionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LesionCliError {
    #[error(transparent)]
    Lesion(#[from] LesionError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Duplicate image name '{0}' in manifest")]
    DuplicateName(String),
    #[error("Invalid image name '{0}': names must be plain file stems")]
    InvalidName(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One photograph to analyze in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Batch job: which images to analyze, with which settings, and where to store results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchManifest {
    /// Analysis settings file; defaults apply when absent
    pub config: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub images: Vec<ImageEntry>,
}

impl BatchManifest {
    /// Load a manifest from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, LesionCliError> {
        let manifest: BatchManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from a JSON string
    pub fn from_json(content: &str) -> Result<Self, LesionCliError> {
        let manifest: BatchManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Auto-detect file format and load the manifest
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LesionCliError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref)?;
        let mut manifest = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            Some("json") => Self::from_json(&content)?,
            _ => return Err(LesionCliError::UnsupportedFileFormat),
        };

        // relative paths are relative to the manifest itself
        if let Some(base) = path_ref.parent() {
            manifest.resolve_relative_to(base);
        }
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), LesionCliError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.images {
            if !is_plain_name(&entry.name) {
                return Err(LesionCliError::InvalidName(entry.name.clone()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(LesionCliError::DuplicateName(entry.name.clone()));
            }
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &Path| if p.is_relative() { base.join(p) } else { p.to_path_buf() };
        self.config = self.config.as_deref().map(resolve);
        self.output_dir = resolve(&self.output_dir);
        for entry in &mut self.images {
            entry.path = resolve(&entry.path);
        }
    }

    /// The analysis configuration named by the manifest
    pub fn analysis_config(&self) -> Result<AnalysisConfig, LesionCliError> {
        match &self.config {
            Some(path) => Ok(AnalysisConfig::from_file(path)?),
            None => Ok(AnalysisConfig::default()),
        }
    }
}

/// Names become `<output_dir>/<name>.json`, so they must not leave that directory
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !Path::new(name).is_absolute()
}

/// Load analysis settings, falling back to defaults
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, LesionCliError> {
    match path {
        Some(path) => Ok(AnalysisConfig::from_file(path)?),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Apply command-line overrides on top of a loaded configuration
pub fn apply_overrides(
    mut config: AnalysisConfig,
    threshold: Option<u8>,
    classifier_cmd: Option<&str>,
    classifier_args: &[String],
) -> Result<AnalysisConfig, LesionCliError> {
    if let Some(threshold) = threshold {
        config.segmentation.threshold = threshold;
    }
    if let Some(program) = classifier_cmd {
        config.classifier.backend = Some(ClassifierKind::Command {
            program: program.to_string(),
            args: classifier_args.to_vec(),
        });
    }
    config.validate()?;
    Ok(config)
}

/// A report as persisted next to its source image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub name: String,
    pub image_path: PathBuf,
    pub analyzed_at: DateTime<Utc>,
    pub report: AnalysisReport,
}

impl StoredAnalysis {
    pub fn new(entry: &ImageEntry, report: AnalysisReport) -> Self {
        Self {
            name: entry.name.clone(),
            image_path: entry.path.clone(),
            analyzed_at: Utc::now(),
            report,
        }
    }

    /// Write as pretty JSON to `<dir>/<name>.json`, returning the path written
    pub fn save_in<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, LesionCliError> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(format!("{}.json", self.name));
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, LesionCliError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesion::{AnalysisPipeline, ClassifierPrediction, FixedClassifier, ImageBuffer};
    use std::io::Write;

    const MANIFEST: &str = r#"
        output_dir = "reports"

        [[images]]
        name = "left-forearm"
        path = "photos/forearm.png"

        [[images]]
        name = "back"
        path = "/data/back.jpg"
    "#;

    #[test]
    fn test_manifest_from_toml() {
        let manifest = BatchManifest::from_toml(MANIFEST).expect("valid manifest");
        assert_eq!(manifest.images.len(), 2);
        assert!(manifest.config.is_none());
        assert_eq!(manifest.images[0].name, "left-forearm");
    }

    #[test]
    fn test_manifest_paths_resolve_against_manifest_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("batch.toml");
        fs::File::create(&path)
            .and_then(|mut f| f.write_all(MANIFEST.as_bytes()))
            .expect("write manifest");

        let manifest = BatchManifest::from_file(&path).expect("valid manifest");
        assert_eq!(manifest.output_dir, dir.path().join("reports"));
        assert_eq!(manifest.images[0].path, dir.path().join("photos/forearm.png"));
        assert_eq!(manifest.images[1].path, PathBuf::from("/data/back.jpg"));
    }

    #[test]
    fn test_manifest_rejects_duplicates_and_unknown_formats() {
        let duplicate = r#"
            output_dir = "out"
            [[images]]
            name = "a"
            path = "a.png"
            [[images]]
            name = "a"
            path = "b.png"
        "#;
        assert!(matches!(
            BatchManifest::from_toml(duplicate),
            Err(LesionCliError::DuplicateName(_))
        ));

        let yaml = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        assert!(matches!(
            BatchManifest::from_file(yaml.path()),
            Err(LesionCliError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn test_manifest_rejects_names_outside_output_dir() {
        for name in ["../escape", "nested/report", "..", "", "C:\\temp"] {
            let manifest = BatchManifest {
                config: None,
                output_dir: PathBuf::from("out"),
                images: vec![ImageEntry {
                    name: name.to_string(),
                    path: PathBuf::from("a.png"),
                }],
            };
            let json = serde_json::to_string(&manifest).expect("serializable");
            assert!(
                matches!(BatchManifest::from_json(&json), Err(LesionCliError::InvalidName(_))),
                "{name:?}"
            );
        }

        let plain = r#"{"output_dir": "out", "images": [{"name": "left-arm.v2", "path": "a.png"}]}"#;
        assert!(BatchManifest::from_json(plain).is_ok());
    }

    #[test]
    fn test_overrides_select_command_backend() {
        let config = apply_overrides(
            AnalysisConfig::default(),
            Some(100),
            Some("classify-skin"),
            &["--top".to_string(), "3".to_string()],
        )
        .expect("valid overrides");

        assert_eq!(config.segmentation.threshold, 100);
        assert_eq!(
            config.classifier.backend,
            Some(ClassifierKind::Command {
                program: "classify-skin".into(),
                args: vec!["--top".into(), "3".into()],
            })
        );
    }

    #[tokio::test]
    async fn test_stored_analysis_written_and_read_back() {
        let pipeline = AnalysisPipeline::builder()
            .with_classifier(FixedClassifier::new(vec![ClassifierPrediction::new("mole", 0.6)]))
            .build()
            .expect("pipeline builds");
        let image = ImageBuffer::new(2, 2, [40u8, 20, 10, 255].repeat(4)).expect("valid image");
        let report = pipeline.analyze_detailed(&image).await.expect("analysis succeeds");

        let entry = ImageEntry {
            name: "spot".into(),
            path: PathBuf::from("spot.png"),
        };
        let stored = StoredAnalysis::new(&entry, report);

        let dir = tempfile::tempdir().expect("temp dir");
        let path = stored.save_in(dir.path()).expect("saved");
        assert_eq!(path, dir.path().join("spot.json"));
        assert_eq!(StoredAnalysis::from_json_file(&path).expect("readable"), stored);
    }
}
