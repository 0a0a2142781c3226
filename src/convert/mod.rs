//! The conversion pipeline: scene source in, glTF document plus binary
//! buffer out.
//!
//! [`convert_scene`] runs two passes over the node arena. The first walks
//! every node in arena order, emitting glTF nodes (the glTF node index equals
//! the arena index) and, unless the scene is excluded, meshes, skins,
//! materials, and cameras. The second samples and compresses transform
//! curves into one animation per animated node. All accumulating state lives
//! in a [`session::ConversionSession`], which lays out the binary buffer on
//! finish.

pub mod animation;
pub mod material;
pub mod packer;
pub mod session;
pub mod skin;
pub mod weld;

use std::fs;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::gltf::types::{
    GltfAnimation, GltfAnimationChannel, GltfAnimationSampler, GltfAnimationTarget, GltfCamera,
    GltfMesh, GltfNode, GltfOrthographic, GltfPerspective, GltfPrimitive, GltfScene, GltfSkin,
};
use crate::gltf::{self, GltfDocument};
use crate::scene::{CameraSource, MaterialSource, MeshSource, NodeId, Scene};

use animation::ChannelPath;
use packer::{AccessorData, ElementType};
use session::ConversionSession;
use weld::{CornerStream, WeldedPrimitive};

/// Conversion parameters. Defaults match the common single-shot invocation:
/// whole scene, whole timeline, 50 ms sampling, rest pose, plain float
/// attributes, separate `.gltf` and `.bin` outputs.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Skip scene hierarchy output (meshes, skins, materials, cameras,
    /// the scene entry). Nodes are still numbered so animations can target
    /// them.
    pub exclude_scene: bool,
    /// Skip animation output entirely.
    pub exclude_animation: bool,
    /// Animation window start, seconds.
    pub start_time: f32,
    /// Animation window length, seconds.
    pub duration: f32,
    /// Animation sampling interval, seconds per frame.
    pub sample_rate: f32,
    /// Evaluate static node transforms at this time instead of the rest pose.
    pub pose_time: Option<f32>,
    /// Quantize float vertex attributes to u16 with decode matrices.
    pub quantize: bool,
    /// Emit a single GLB container with embedded images.
    pub binary: bool,
    /// Pretty-print the JSON document (`.gltf` output only).
    pub beautify: bool,
    /// Rescale retained joint weights to sum to 1 after influence capping.
    pub normalize_weights: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            exclude_scene: false,
            exclude_animation: false,
            start_time: 0.0,
            duration: 1000.0,
            sample_rate: 1.0 / 20.0,
            pose_time: None,
            quantize: false,
            binary: false,
            beautify: false,
            normalize_weights: false,
        }
    }
}

/// The closed set of vertex attribute semantics this pipeline emits. The
/// glTF attribute key is derived from the variant, never matched on as a
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    Position,
    Normal,
    TexCoord0,
    TexCoord1,
    Color0,
    Joints0,
    Weights0,
}

impl Semantic {
    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "POSITION",
            Self::Normal => "NORMAL",
            Self::TexCoord0 => "TEXCOORD_0",
            Self::TexCoord1 => "TEXCOORD_1",
            Self::Color0 => "COLOR_0",
            Self::Joints0 => "JOINTS_0",
            Self::Weights0 => "WEIGHTS_0",
        }
    }
}

fn flatten_vec2(values: &[Vec2]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn flatten_vec3(values: &[Vec3]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn flatten_vec4(values: &[Vec4]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn pack_float_attribute(
    flat: &[f32],
    element: ElementType,
    quantize: bool,
) -> Result<AccessorData> {
    if quantize {
        packer::quantize_f32(flat, element)
    } else {
        packer::pack_f32(flat, element, true)
    }
}

/// Topmost joint-flagged ancestor of `joint`, including `joint` itself.
fn skeleton_root(scene: &Scene, joint: NodeId) -> Result<NodeId> {
    let mut current = joint;
    while let Some(parent) = scene.node(current)?.parent {
        if !scene.node(parent)?.is_joint {
            break;
        }
        current = parent;
    }
    Ok(current)
}

struct NodePass<'a> {
    scene: &'a Scene,
    options: &'a ConvertOptions,
    /// Counter for placeholder materials on meshes without an assignment.
    default_materials: usize,
}

impl NodePass<'_> {
    fn convert_mesh(
        &mut self,
        session: &mut ConversionSession,
        mesh: &MeshSource,
    ) -> Result<(usize, Option<usize>)> {
        let normals = mesh.normals.as_ref().and_then(|l| l.resolve("normal"));
        let uv0 = mesh.uv0.as_ref().and_then(|l| l.resolve("uv0"));
        let uv1 = mesh.uv1.as_ref().and_then(|l| l.resolve("uv1"));
        let colors = mesh.color.as_ref().and_then(|l| l.resolve("color"));

        let resolved_skin = if mesh.clusters.is_empty() {
            None
        } else {
            Some(skin::resolve(
                &mesh.clusters,
                mesh.control_points.len(),
                mesh.geometric_transform,
                self.options.normalize_weights,
            )?)
        };

        let stream = CornerStream {
            control_points: &mesh.control_points,
            polygon_vertices: &mesh.polygon_vertices,
            normals: normals.as_ref(),
            uv0: uv0.as_ref(),
            uv1: uv1.as_ref(),
            colors: colors.as_ref(),
            joints: resolved_skin.as_ref().map(|s| s.vertex_joints.as_slice()),
            weights: resolved_skin.as_ref().map(|s| s.vertex_weights.as_slice()),
        };
        let welded = weld::weld(&stream)?;
        debug!(
            mesh = %mesh.name,
            corners = mesh.polygon_vertices.len(),
            unique = welded.unique_count(),
            "welded mesh"
        );

        let attributes = self.pack_attributes(session, &welded)?;

        let indices = if welded.needs_wide_indices() {
            packer::pack_u32(&welded.indices, ElementType::Scalar)?
        } else {
            let narrow: Vec<u16> = welded.indices.iter().map(|&i| i as u16).collect();
            packer::pack_u16(&narrow, ElementType::Scalar)?
        };
        let index_accessor = session.add_indices(indices);

        let material = match mesh.assigned_material() {
            Some(source) => material::convert(session, source),
            None => {
                let placeholder = MaterialSource::placeholder(self.default_materials);
                self.default_materials += 1;
                material::convert(session, &placeholder)
            }
        };

        let mesh_index = session.add_mesh(GltfMesh {
            name: Some(mesh.name.clone()),
            primitives: vec![GltfPrimitive {
                attributes,
                indices: Some(index_accessor),
                material: Some(material),
            }],
        });

        let skin_index = match resolved_skin {
            Some(resolved) => Some(self.convert_skin(session, mesh, resolved)?),
            None => None,
        };

        Ok((mesh_index, skin_index))
    }

    fn pack_attributes(
        &self,
        session: &mut ConversionSession,
        welded: &WeldedPrimitive,
    ) -> Result<IndexMap<String, usize>> {
        let quantize = self.options.quantize;
        let mut packed: Vec<(Semantic, AccessorData)> = Vec::with_capacity(7);

        packed.push((
            Semantic::Position,
            pack_float_attribute(&flatten_vec3(&welded.positions), ElementType::Vec3, quantize)?,
        ));
        if let Some(normals) = &welded.normals {
            packed.push((
                Semantic::Normal,
                pack_float_attribute(&flatten_vec3(normals), ElementType::Vec3, quantize)?,
            ));
        }
        if let Some(uv0) = &welded.uv0 {
            packed.push((
                Semantic::TexCoord0,
                pack_float_attribute(&flatten_vec2(uv0), ElementType::Vec2, quantize)?,
            ));
        }
        if let Some(uv1) = &welded.uv1 {
            packed.push((
                Semantic::TexCoord1,
                pack_float_attribute(&flatten_vec2(uv1), ElementType::Vec2, quantize)?,
            ));
        }
        if let Some(colors) = &welded.colors {
            // colors stay full float regardless of quantization
            packed.push((
                Semantic::Color0,
                packer::pack_f32(&flatten_vec4(colors), ElementType::Vec4, true)?,
            ));
        }
        if let Some(joints) = &welded.joints {
            let flat: Vec<u16> = joints.iter().flatten().copied().collect();
            packed.push((Semantic::Joints0, packer::pack_u16(&flat, ElementType::Vec4)?));
        }
        if let Some(weights) = &welded.weights {
            let flat: Vec<f32> = weights.iter().flatten().copied().collect();
            packed.push((
                Semantic::Weights0,
                packer::pack_f32(&flat, ElementType::Vec4, true)?,
            ));
        }

        Ok(packed
            .into_iter()
            .map(|(semantic, data)| (semantic.name().to_string(), session.add_attribute(data)))
            .collect())
    }

    fn convert_skin(
        &self,
        session: &mut ConversionSession,
        mesh: &MeshSource,
        resolved: skin::ResolvedSkin,
    ) -> Result<usize> {
        let mut joints = resolved.joints;
        let mut matrices = resolved.inverse_bind_matrices;

        // joint-flagged ancestors not bound by any cluster still belong to
        // the skin hierarchy; they join with identity bind matrices
        let mut i = 0;
        while i < joints.len() {
            let mut current = joints[i];
            while let Some(parent) = self.scene.node(current)?.parent {
                if !self.scene.node(parent)?.is_joint {
                    break;
                }
                if !joints.contains(&parent) {
                    joints.push(parent);
                    matrices.push(Mat4::IDENTITY);
                }
                current = parent;
            }
            i += 1;
        }

        let skeleton = match joints.first() {
            Some(&root_joint) => Some(skeleton_root(self.scene, root_joint)?),
            None => None,
        };

        let ibm_accessor = session.add_inverse_bind_matrices(&matrices)?;
        Ok(session.add_skin(GltfSkin {
            name: Some(format!("{}-skin", mesh.name)),
            inverse_bind_matrices: Some(ibm_accessor),
            joints,
            skeleton,
        }))
    }

    fn convert_camera(&self, session: &mut ConversionSession, camera: &CameraSource) -> usize {
        let entry = match *camera {
            CameraSource::Perspective { yfov, znear, zfar } => GltfCamera {
                camera_type: "perspective".to_string(),
                perspective: Some(GltfPerspective {
                    yfov,
                    znear,
                    zfar: (zfar > znear).then_some(zfar),
                }),
                orthographic: None,
            },
            CameraSource::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => GltfCamera {
                camera_type: "orthographic".to_string(),
                perspective: None,
                orthographic: Some(GltfOrthographic {
                    xmag,
                    ymag,
                    znear,
                    zfar,
                }),
            },
        };
        session.add_camera(entry)
    }

    fn run(&mut self, session: &mut ConversionSession) -> Result<()> {
        for id in 0..self.scene.nodes.len() {
            let node = self.scene.node(id)?;

            let mut entry = GltfNode {
                name: Some(node.name.clone()),
                children: node.children.clone(),
                ..GltfNode::default()
            };

            let mut local = node.local_transform(self.options.pose_time);

            if !self.options.exclude_scene {
                if let Some(mesh) = &node.mesh {
                    let (mesh_index, skin_index) = self.convert_mesh(session, mesh)?;
                    entry.mesh = Some(mesh_index);
                    if skin_index.is_some() {
                        entry.skin = skin_index;
                        // skinned vertices are posed in world space by the
                        // joint matrices; the mesh node cancels its inherited
                        // transform
                        local = match node.parent {
                            Some(parent) => self
                                .scene
                                .global_transform(parent, self.options.pose_time)?
                                .inverse(),
                            None => Mat4::IDENTITY,
                        };
                    }
                }
                if let Some(camera) = &node.camera {
                    entry.camera = Some(self.convert_camera(session, camera));
                }
            }

            if local != Mat4::IDENTITY {
                entry.matrix = Some(local.to_cols_array());
            }
            session.push_node(entry);
        }

        if !self.options.exclude_scene {
            session.add_scene(GltfScene {
                name: None,
                nodes: self.scene.roots.clone(),
            });
        }
        Ok(())
    }
}

fn convert_animations(
    session: &mut ConversionSession,
    scene: &Scene,
    options: &ConvertOptions,
) -> Result<()> {
    for (id, node) in scene.nodes.iter().enumerate() {
        let Some(curves) = &node.curves else {
            continue;
        };
        let Some(compressed) = animation::compress_node(
            curves,
            node.rest_trs(),
            options.sample_rate,
            options.start_time,
            options.duration,
        ) else {
            continue;
        };
        if compressed.is_empty() {
            continue;
        }

        let mut channels = Vec::with_capacity(compressed.len());
        let mut samplers = Vec::with_capacity(compressed.len());
        for channel in compressed {
            let element = match channel.path {
                ChannelPath::Rotation => ElementType::Vec4,
                ChannelPath::Translation | ChannelPath::Scale => ElementType::Vec3,
            };
            let input = session.add_animation_times(&channel.times)?;
            let output = session.add_animation_values(&channel.values, element)?;
            channels.push(GltfAnimationChannel {
                sampler: samplers.len(),
                target: GltfAnimationTarget {
                    node: id,
                    path: channel.path.name().to_string(),
                },
            });
            samplers.push(GltfAnimationSampler {
                input,
                interpolation: "LINEAR".to_string(),
                output,
            });
        }
        session.add_animation(GltfAnimation { channels, samplers });
    }
    Ok(())
}

fn mime_type_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/png"
    }
}

fn embed_images(session: &mut ConversionSession, scene: &Scene) {
    for (index, uri) in session.uri_images() {
        let path = match &scene.base_dir {
            Some(base) => base.join(&uri),
            None => Path::new(&uri).to_path_buf(),
        };
        match fs::read(&path) {
            Ok(bytes) => session.embed_image(index, bytes, mime_type_for(&uri)),
            Err(error) => {
                warn!(%uri, %error, "texture file unreadable, keeping uri reference");
            }
        }
    }
}

/// Convert a scene into a glTF document and its binary buffer.
///
/// The returned buffer entry carries no URI; callers writing separate files
/// patch in the side `.bin` name before serializing.
pub fn convert_scene(scene: &Scene, options: &ConvertOptions) -> Result<(GltfDocument, Vec<u8>)> {
    let mut session = ConversionSession::new();

    let mut pass = NodePass {
        scene,
        options,
        default_materials: 0,
    };
    pass.run(&mut session)?;

    if !options.exclude_animation {
        convert_animations(&mut session, scene, options)?;
    }

    if options.binary {
        embed_images(&mut session, scene);
    }

    Ok(session.finish(None))
}

/// Convert a scene and write it out, honoring the binary/beautify options.
pub fn convert_scene_to_file(scene: &Scene, options: &ConvertOptions, output: &Path) -> Result<()> {
    let (mut document, buffer) = convert_scene(scene, options)?;
    if options.binary {
        gltf::write_glb(&document, &buffer, output)
    } else {
        document.buffers[0].uri = Some(gltf::export::bin_filename(output)?);
        gltf::write_gltf(&document, &buffer, output, options.beautify)
    }
}
