//! Scene-source data model.
//!
//! The converter does not read any proprietary 3D format itself. An external
//! scene reader fills in these plain data structures: a flat node arena with
//! parent/child links, per-mesh polygon topology and attribute layers,
//! skin clusters, and sampled transform curves. Node identity is the arena
//! index, assigned once up front so the conversion pass can cross-reference
//! purely by index.

pub mod curve;
pub mod layer;
pub mod material;

use std::path::PathBuf;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use curve::{SampledCurve, TransformCurves};
pub use layer::{AttributeLayer, MappingMode, ReferenceMode};
pub use material::{MaterialSource, ShadingModel, TextureSource, WrapMode};

/// Index into [`Scene::nodes`]. Doubles as the glTF node index.
pub type NodeId = usize;

/// A complete in-memory scene, ready for conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Flat node arena. A node's id is its position in this list.
    pub nodes: Vec<SceneNode>,
    /// Ids of the top-level nodes (children of the source file's root).
    pub roots: Vec<NodeId>,
    /// Base directory for resolving relative texture paths when embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl Scene {
    /// Look up a node, failing on a dangling reference.
    pub fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(id).ok_or(Error::InvalidNodeIndex(id))
    }

    /// Global transform of a node at `pose_time`, composed root-down along
    /// the parent chain.
    pub fn global_transform(&self, id: NodeId, pose_time: Option<f32>) -> Result<Mat4> {
        let node = self.node(id)?;
        let local = node.local_transform(pose_time);
        match node.parent {
            Some(parent) => Ok(self.global_transform(parent, pose_time)? * local),
            None => Ok(local),
        }
    }
}

/// One node of the scene graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,

    /// Rest-pose local transform, decomposed.
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "default_rotation")]
    pub rotation: Quat,
    #[serde(default = "default_scale")]
    pub scale: Vec3,

    /// Whether this node is part of a skeleton (FBX skeleton attribute).
    /// Used for skeleton-root search and extra-joint collection.
    #[serde(default)]
    pub is_joint: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSource>,

    /// Transform curves for animation export. Absent means the node is not
    /// animated and contributes no channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curves: Option<TransformCurves>,
}

fn default_rotation() -> Quat {
    Quat::IDENTITY
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

impl SceneNode {
    /// Rest-pose TRS triple.
    pub fn rest_trs(&self) -> (Vec3, Quat, Vec3) {
        (self.translation, self.rotation, self.scale)
    }

    /// Local transform evaluated at `time`. With no time (rest pose) or no
    /// curves, the decomposed rest transform is used; otherwise each channel
    /// curve is sampled, falling back to the rest value per channel.
    pub fn local_transform(&self, time: Option<f32>) -> Mat4 {
        let (t, r, s) = match (time, &self.curves) {
            (Some(time), Some(curves)) => curves.evaluate(time, self.rest_trs()),
            _ => self.rest_trs(),
        };
        Mat4::from_scale_rotation_translation(s, r, t)
    }
}

/// Mesh geometry as read from the source: raw control points plus a
/// triangulated corner list, with attribute layers in their declared
/// mapping/reference modes. The mesh is assumed to be pre-split per material,
/// so the material assignment is uniform across its polygons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSource {
    pub name: String,
    /// Unique positions before per-corner splitting.
    pub control_points: Vec<Vec3>,
    /// Triangulated polygon corners as control-point indices.
    pub polygon_vertices: Vec<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<AttributeLayer<Vec3>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv0: Option<AttributeLayer<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv1: Option<AttributeLayer<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<AttributeLayer<Vec4>>,

    /// Node-level material table referenced by `material_mapping`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<MaterialSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_mapping: Option<MaterialMapping>,

    /// Skin clusters, in source traversal order. Empty for unskinned meshes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<SkinCluster>,

    /// Geometric (pivot) transform of the mesh attribute, folded into the
    /// inverse bind matrices.
    #[serde(default = "default_identity")]
    pub geometric_transform: Mat4,
}

fn default_identity() -> Mat4 {
    Mat4::IDENTITY
}

impl MeshSource {
    /// The single material assigned to this mesh, if any. Per-polygon layers
    /// take the first polygon's assignment (the mesh is split by material
    /// upstream, so the mapping must be uniform).
    pub fn assigned_material(&self) -> Option<&MaterialSource> {
        let index = match self.material_mapping.as_ref()? {
            MaterialMapping::AllSame { index } => *index,
            MaterialMapping::ByPolygon { indices } => *indices.first()?,
        };
        self.materials.get(index as usize)
    }
}

/// How polygons reference the node's material table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialMapping {
    /// Every polygon uses the same material.
    AllSame { index: u32 },
    /// One material index per polygon.
    ByPolygon { indices: Vec<u32> },
}

/// One skin cluster: a joint node plus the control points it influences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinCluster {
    /// The joint node this cluster binds to.
    pub joint: NodeId,
    /// `(control_point_index, weight)` pairs, in source order.
    pub influences: Vec<(u32, f32)>,
    /// Global transform of the mesh at bind time (cluster `TransformMatrix`).
    pub transform: Mat4,
    /// Global transform of the joint at bind time (cluster `TransformLinkMatrix`).
    pub transform_link: Mat4,
}

/// Camera parameters, already reduced to the glTF projection models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraSource {
    Perspective {
        /// Vertical field of view in radians.
        yfov: f32,
        znear: f32,
        zfar: f32,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}
