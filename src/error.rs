//! Error types for `scene2gltf`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `scene2gltf` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Scene Source Errors ====================
    /// The scene source failed to load. Fatal: aborts the whole conversion
    /// before any output is written.
    #[error("failed to load scene: {message}")]
    SceneLoadFailed {
        /// The error message from the scene reader.
        message: String,
    },

    /// A node reference inside the scene points outside the node arena.
    #[error("invalid node index: {0}")]
    InvalidNodeIndex(usize),

    /// A polygon corner references a control point outside the mesh.
    #[error("polygon corner references control point {index} but mesh has {count}")]
    CornerOutOfRange {
        /// The out-of-range control point index.
        index: usize,
        /// The mesh's control point count.
        count: usize,
    },

    /// A cluster influence references a control point outside the mesh.
    #[error("cluster influence references control point {index} but mesh has {count}")]
    InfluenceOutOfRange {
        /// The out-of-range control point index.
        index: usize,
        /// The mesh's control point count.
        count: usize,
    },

    /// A resolved attribute layer has fewer values than the vertices it must
    /// cover.
    #[error("{layer} layer has {actual} values but the mesh needs {expected}")]
    LayerTooShort {
        /// The layer name (normal, uv0, uv1, color).
        layer: &'static str,
        /// One value per corner (split layers) or per control point.
        expected: usize,
        /// The resolved value count.
        actual: usize,
    },

    // ==================== Packing Errors ====================
    /// The flattened value count is not a multiple of the element arity.
    #[error("value count {count} is not a multiple of arity {arity}")]
    ArityMismatch {
        /// The flattened component count.
        count: usize,
        /// The declared element arity.
        arity: usize,
    },

    /// Quantization was requested for an element shape it does not support.
    #[error("quantization unsupported for {element_type} (float, arity <= 4 only)")]
    QuantizeUnsupported {
        /// The offending element shape name.
        element_type: &'static str,
    },

    // ==================== Document Errors ====================
    /// Failed to serialize the glTF JSON document.
    #[error("glTF JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid output path (no file stem, unrepresentable name).
    #[error("invalid output path: {path}")]
    InvalidOutputPath {
        /// The offending path.
        path: PathBuf,
    },
}

/// A specialized Result type for `scene2gltf` operations.
pub type Result<T> = std::result::Result<T, Error>;
