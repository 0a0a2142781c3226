//! glTF 2.0 document model and writers.

pub mod export;
pub mod types;

pub use export::{build_glb, write_glb, write_gltf};
pub use types::GltfDocument;
