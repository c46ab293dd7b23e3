use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A feature row whose length differs from the first row
    #[error("feature row {row} has {found} samples, expected {expected}")]
    RaggedFeatures {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("features hold {features} samples but there are {targets} targets")]
    SampleCountMismatch { features: usize, targets: usize },

    #[error("model expects {expected} features per sample, got {found}")]
    FeatureWidthMismatch { expected: usize, found: usize },

    /// Raised by the loss when a (0-based) label does not index an output unit
    #[error("label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange { label: i64, num_classes: usize },

    #[error("no labels to size the output layer from")]
    NoLabels,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
