//! # scene2gltf
//!
//! A pure-Rust pipeline for authoring glTF 2.0 assets from in-memory 3D
//! scenes.
//!
//! The crate does not parse any proprietary scene format itself. A scene
//! reader fills the [`scene`] data model (node arena, attribute layers,
//! skin clusters, transform curves) and the converter turns it into a
//! spec-valid glTF document plus binary buffer:
//!
//! - **Vertex welding** - per-corner attribute tuples deduplicated
//!   bit-exactly into indexed vertex arrays
//! - **Skin resolution** - cluster influences capped at 4 per vertex with
//!   smallest-weight eviction, inverse bind matrices composed from bind-time
//!   transforms
//! - **Accessor packing** - little-endian accessor data with optional u16
//!   quantization and `WEB3D_quantized_attributes` decode matrices
//! - **Animation compression** - fixed-rate resampling with linear-fit
//!   keyframe reduction, one animation per animated node
//! - **Assembly** - fixed buffer-section layout, `.gltf` + `.bin` or single
//!   GLB container output
//!
//! ## Quick Start
//!
//! ```no_run
//! use scene2gltf::convert::{ConvertOptions, convert_scene_to_file};
//! use scene2gltf::scene::Scene;
//!
//! let json = std::fs::read_to_string("scene.json")?;
//! let scene: Scene = serde_json::from_str(&json)?;
//!
//! let options = ConvertOptions {
//!     binary: true,
//!     ..ConvertOptions::default()
//! };
//! convert_scene_to_file(&scene, &options, "model.glb".as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `scene2gltf` command-line binary

pub mod convert;
pub mod error;
pub mod gltf;
pub mod scene;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::scene::{
        AttributeLayer, MappingMode, MaterialSource, MeshSource, NodeId, ReferenceMode,
        SampledCurve, Scene, SceneNode, SkinCluster, TransformCurves,
    };

    pub use crate::convert::{ConvertOptions, convert_scene, convert_scene_to_file};

    pub use crate::gltf::{GltfDocument, build_glb, write_glb, write_gltf};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
