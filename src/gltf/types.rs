//! Core glTF 2.0 structure types.
//!
//! Cross-references between entities are 0-based indices into the document's
//! top-level arrays; no names are used for lookup. Empty collections are
//! omitted from the JSON rather than serialized as empty arrays.

use indexmap::IndexMap;
use serde::Serialize;

/// Asset metadata
#[derive(Debug, Clone, Serialize)]
pub struct GltfAsset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

/// Scene definition
#[derive(Debug, Clone, Serialize)]
pub struct GltfScene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
}

/// Node in the scene graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct GltfNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    /// Column-major local transform. Exclusive with the TRS fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
}

/// Skin for skeletal animation
#[derive(Debug, Clone, Serialize)]
pub struct GltfSkin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "inverseBindMatrices")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<usize>,
    pub joints: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<usize>,
}

/// Mesh definition
#[derive(Debug, Clone, Serialize)]
pub struct GltfMesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<GltfPrimitive>,
}

/// Mesh primitive (geometry + material)
#[derive(Debug, Clone, Serialize)]
pub struct GltfPrimitive {
    pub attributes: IndexMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
}

/// Per-accessor extension payloads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GltfAccessorExtensions {
    /// `WEB3D_quantized_attributes`: affine decode from quantized space back
    /// to original space, column-major `(arity+1) x (arity+1)`.
    #[serde(rename = "WEB3D_quantized_attributes")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantized: Option<GltfQuantizedExtension>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfQuantizedExtension {
    #[serde(rename = "decodeMatrix")]
    pub decode_matrix: Vec<f32>,
}

/// Accessor for typed buffer data
#[derive(Debug, Clone, Serialize)]
pub struct GltfAccessor {
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    #[serde(rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<GltfAccessorExtensions>,
}

/// Buffer view (slice of a buffer)
#[derive(Debug, Clone, Serialize)]
pub struct GltfBufferView {
    pub buffer: usize,
    #[serde(rename = "byteOffset")]
    pub byte_offset: usize,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// Binary buffer
#[derive(Debug, Clone, Serialize)]
pub struct GltfBuffer {
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Texture sampler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GltfSampler {
    #[serde(rename = "wrapS")]
    pub wrap_s: u32,
    #[serde(rename = "wrapT")]
    pub wrap_t: u32,
    #[serde(rename = "minFilter")]
    pub min_filter: u32,
    #[serde(rename = "magFilter")]
    pub mag_filter: u32,
}

/// Image, referenced by URI or embedded in a buffer view
#[derive(Debug, Clone, Serialize)]
pub struct GltfImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "bufferView")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(rename = "mimeType")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Texture binding an image to a sampler
#[derive(Debug, Clone, Serialize)]
pub struct GltfTexture {
    pub source: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfTextureInfo {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfPbrMetallicRoughness {
    #[serde(rename = "baseColorFactor")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(rename = "baseColorTexture")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<GltfTextureInfo>,
    #[serde(rename = "metallicFactor")]
    pub metallic_factor: f32,
    #[serde(rename = "roughnessFactor")]
    pub roughness_factor: f32,
}

/// Material with PBR metallic-roughness values
#[derive(Debug, Clone, Serialize)]
pub struct GltfMaterial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "pbrMetallicRoughness")]
    pub pbr_metallic_roughness: GltfPbrMetallicRoughness,
    #[serde(rename = "normalTexture")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<GltfTextureInfo>,
    #[serde(rename = "emissiveFactor")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(rename = "alphaMode")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<String>,
}

/// Camera projection
#[derive(Debug, Clone, Serialize)]
pub struct GltfCamera {
    #[serde(rename = "type")]
    pub camera_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<GltfPerspective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orthographic: Option<GltfOrthographic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfPerspective {
    pub yfov: f32,
    pub znear: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zfar: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfOrthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub znear: f32,
    pub zfar: f32,
}

/// Animation sampler: input time accessor + output value accessor
#[derive(Debug, Clone, Serialize)]
pub struct GltfAnimationSampler {
    pub input: usize,
    pub interpolation: String,
    pub output: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfAnimationTarget {
    pub node: usize,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GltfAnimationChannel {
    pub sampler: usize,
    pub target: GltfAnimationTarget,
}

/// One animation: channels binding node paths to samplers
#[derive(Debug, Clone, Serialize)]
pub struct GltfAnimation {
    pub channels: Vec<GltfAnimationChannel>,
    pub samplers: Vec<GltfAnimationSampler>,
}

/// Complete glTF document
#[derive(Debug, Clone, Serialize)]
pub struct GltfDocument {
    pub asset: GltfAsset,
    #[serde(rename = "extensionsUsed")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(rename = "extensionsRequired")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<GltfScene>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<GltfNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<GltfMesh>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<GltfCamera>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skins: Vec<GltfSkin>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<GltfMaterial>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<GltfTexture>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<GltfImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<GltfSampler>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<GltfAnimation>,
    pub accessors: Vec<GltfAccessor>,
    #[serde(rename = "bufferViews")]
    pub buffer_views: Vec<GltfBufferView>,
    pub buffers: Vec<GltfBuffer>,
}
