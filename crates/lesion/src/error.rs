use thiserror::Error;

#[derive(Error, Debug)]
pub enum LesionError {
    #[error("Malformed image: {width}x{height} needs {expected} RGBA bytes, got {actual}")]
    MalformedImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed image: {width}x{height} has a zero dimension")]
    EmptyImage { width: u32, height: u32 },

    #[error("Invalid mask: expected {expected} membership cells, got {actual}")]
    InvalidMask { expected: usize, actual: usize },

    #[error("Classifier unavailable: {reason}")]
    ClassifierUnavailable { reason: String },

    #[error("No classifier configured for the pipeline")]
    MissingClassifier,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LesionError {
    pub fn classifier_unavailable(reason: impl Into<String>) -> Self {
        Self::ClassifierUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether the image buffer itself was rejected
    pub fn is_malformed_image(&self) -> bool {
        matches!(self, Self::MalformedImage { .. } | Self::EmptyImage { .. })
    }

    /// Whether the failure came from the classifier side and a retry may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClassifierUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, LesionError>;
