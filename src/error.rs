use std::path::PathBuf;

/// Errors raised while turning an attribution signal into part importances
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    /// Every query runs on exactly one sample
    #[error("batch size must be 1, got {0}")]
    BatchSize(usize),

    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Area-averaged aggregation over a part whose dilated mask is empty
    #[error("area-averaged importance of part '{part}' is undefined: mask is empty")]
    UndefinedAggregation { part: String },

    #[error("no adaptation policy for explainer variant '{0}'")]
    UnknownExplainerVariant(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid part color map: {0}")]
    InvalidPartMap(String),

    /// Failure reported by an external explainer or model
    #[error(transparent)]
    Explainer(#[from] anyhow::Error),

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AttributionError {
    /// Batch and shape errors are caller bugs, never recoverable
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::BatchSize(_) | Self::ShapeMismatch { .. })
    }

    pub(crate) fn shape(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttributionError>;
