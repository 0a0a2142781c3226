//! Source-side material and texture descriptions.
//!
//! Carries only the values the converter maps into glTF; shading-model
//! fidelity beyond value mapping is out of scope.

use serde::{Deserialize, Serialize};

/// Shading model declared by the source material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShadingModel {
    Lambert,
    Phong,
    /// Unknown models are converted with default values only.
    #[default]
    Unknown,
}

/// A file texture reference with its wrap modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSource {
    /// Path to the image file, relative to the scene's base directory.
    pub path: String,
    #[serde(default)]
    pub wrap_u: WrapMode,
    #[serde(default)]
    pub wrap_v: WrapMode,
}

/// Texture coordinate wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
}

impl WrapMode {
    /// GL enum value used by glTF samplers.
    pub fn gl_code(self) -> u32 {
        match self {
            Self::Repeat => 10497,
            Self::ClampToEdge => 33071,
        }
    }
}

/// A source material, pre-reduced to plain values and texture references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSource {
    pub name: String,
    #[serde(default)]
    pub shading: ShadingModel,
    #[serde(default)]
    pub ambient: [f32; 3],
    #[serde(default)]
    pub emissive: [f32; 3],
    #[serde(default = "default_diffuse")]
    pub diffuse: [f32; 3],
    /// 1.0 is fully opaque. Old exporters report 0 for opaque objects; that
    /// is normalized to 1 during conversion.
    #[serde(default = "default_transparency")]
    pub transparency: f32,
    #[serde(default)]
    pub specular: [f32; 3],
    #[serde(default)]
    pub shininess: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffuse_texture: Option<TextureSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureSource>,
}

fn default_diffuse() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_transparency() -> f32 {
    1.0
}

impl MaterialSource {
    /// A placeholder for meshes with no material assignment.
    pub fn placeholder(index: usize) -> Self {
        Self {
            name: format!("DEFAULT_MAT_{index}"),
            shading: ShadingModel::Unknown,
            ambient: [0.0; 3],
            emissive: [0.0; 3],
            diffuse: default_diffuse(),
            transparency: 1.0,
            specular: [0.0; 3],
            shininess: 0.0,
            diffuse_texture: None,
            normal_texture: None,
        }
    }
}
