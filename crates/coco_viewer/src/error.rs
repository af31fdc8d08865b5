//! Error types for layer operations.

use thiserror::Error;

use crate::viewer::LayerId;

/// Errors raised when a layer is added or updated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// A per-shape attribute does not have one entry per shape
    #[error("Layer field '{field}' has {found} entries, expected {expected}")]
    MismatchedLength {
        /// Name of the offending field
        field: &'static str,
        /// Number of shapes
        expected: usize,
        /// Number of entries found
        found: usize,
    },

    /// A shape has the wrong vertex layout
    #[error("Invalid shape at index {index}: {reason}")]
    InvalidShape {
        /// Index of the shape in the layer
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// Image data cannot be displayed
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// No layer with this id is in the viewer
    #[error("Layer not found: {0:?}")]
    NotFound(LayerId),

    /// A layer cannot be replaced by one of another kind
    #[error("Cannot replace {expected} layer {id:?} with a {found} layer")]
    WrongKind {
        /// Layer id
        id: LayerId,
        /// Kind of the existing layer
        expected: &'static str,
        /// Kind of the replacement
        found: &'static str,
    },
}
