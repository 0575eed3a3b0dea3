//! Error types for the graph convolution layers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayerError>;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Unknown combination rule: {0}")]
    UnknownRule(String),

    #[error("Open-ended rule at position {position} must be the last rule in the pipeline")]
    OpenRangeNotLast { position: usize },

    #[error("Rule range {start}..{end} out of bounds for feature vector of length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("Node {node} references neighbor {neighbor}, but graph has {num_nodes} nodes")]
    NeighborOutOfRange {
        node: usize,
        neighbor: usize,
        num_nodes: usize,
    },

    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: String,
        got: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LayerError {
    pub(crate) fn shape(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        got: impl std::fmt::Debug,
    ) -> Self {
        LayerError::ShapeMismatch {
            what: what.into(),
            expected: format!("{:?}", expected),
            got: format!("{:?}", got),
        }
    }
}
