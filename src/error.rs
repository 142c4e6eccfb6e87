//! The one error type the training core produces.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// A caller handed the network something that doesn't fit its topology.
///
/// None of these are transient. They mean the arguments are wrong, and
/// retrying the same call will fail the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Layer 0 is the input layer and has no weights or biases.
    #[error("invalid layer {layer}: must be in 1..{layers}")]
    InvalidLayer { layer: usize, layers: usize },

    #[error("index {index} out of range for layer {layer} with {len} entries")]
    InvalidIndex {
        index: usize,
        len: usize,
        layer: usize,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("expected class {class} does not exist in an output layer of {outputs} nodes")]
    InvalidClass { class: usize, outputs: usize },

    #[error("no samples")]
    NoSamples,

    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),
}

impl ConfigurationError {
    pub(crate) fn len_mismatch(expected: usize, actual: usize) -> Self {
        ConfigurationError::DimensionMismatch {
            expected: format!("length {expected}"),
            actual: format!("length {actual}"),
        }
    }

    pub(crate) fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        ConfigurationError::DimensionMismatch {
            expected: format!("shape {expected:?}"),
            actual: format!("shape {actual:?}"),
        }
    }
}
