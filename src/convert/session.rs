//! Conversion session: the single owner of all accumulating document state.
//!
//! Every entity table (accessors, nodes, meshes, materials, ...) lives here,
//! and each `add_*` returns the 0-based index that the rest of the document
//! uses as its only cross-reference. Accessor bytes accumulate in per-section
//! arrays; on `finish` the sections are concatenated in a fixed order —
//! attributes, inverse bind matrices, animation, indices, embedded images —
//! so that accessors committed early never have their backing storage
//! reallocated out from under their recorded offsets.

use glam::Mat4;
use indexmap::IndexMap;

use crate::error::Result;
use crate::gltf::types::{
    GltfAccessor, GltfAccessorExtensions, GltfAnimation, GltfAsset, GltfBuffer, GltfBufferView,
    GltfCamera, GltfDocument, GltfImage, GltfMaterial, GltfMesh, GltfNode, GltfQuantizedExtension,
    GltfSampler, GltfScene, GltfSkin, GltfTexture,
};
use crate::scene::WrapMode;

use super::packer::{self, AccessorData, ElementType};

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

const GL_LINEAR: u32 = 9729;
const GL_LINEAR_MIPMAP_LINEAR: u32 = 9987;

/// The fixed buffer sections, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Attribute,
    InverseBind,
    Animation,
    Index,
}

#[derive(Debug)]
struct PendingAccessor {
    section: Section,
    /// Byte offset inside the section, which becomes the offset inside the
    /// section's buffer view.
    local_offset: usize,
    data: AccessorData,
}

/// An embedded image payload, laid out after the index section.
#[derive(Debug)]
struct PendingImageData {
    image: usize,
    bytes: Vec<u8>,
}

/// Accumulator for one conversion run. Not shared between conversions.
#[derive(Default)]
pub struct ConversionSession {
    attribute_bytes: Vec<u8>,
    ibm_bytes: Vec<u8>,
    animation_bytes: Vec<u8>,
    index_bytes: Vec<u8>,

    accessors: Vec<PendingAccessor>,
    quantization_used: bool,

    nodes: Vec<GltfNode>,
    meshes: Vec<GltfMesh>,
    cameras: Vec<GltfCamera>,
    skins: Vec<GltfSkin>,
    materials: Vec<GltfMaterial>,
    scenes: Vec<GltfScene>,
    scene: Option<usize>,
    animations: Vec<GltfAnimation>,

    images: Vec<GltfImage>,
    samplers: Vec<GltfSampler>,
    textures: Vec<GltfTexture>,
    image_data: Vec<PendingImageData>,

    image_dedup: IndexMap<String, usize>,
    sampler_dedup: IndexMap<(WrapMode, WrapMode), usize>,
    texture_dedup: IndexMap<(usize, Option<usize>), usize>,
    time_dedup: IndexMap<Vec<u32>, usize>,
}

impl ConversionSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessor Methods
    // ========================================================================

    fn push_accessor(&mut self, section: Section, data: AccessorData) -> usize {
        let bytes = match section {
            Section::Attribute => &mut self.attribute_bytes,
            Section::InverseBind => &mut self.ibm_bytes,
            Section::Animation => &mut self.animation_bytes,
            Section::Index => &mut self.index_bytes,
        };
        // accessor byteOffset must be a multiple of its component size;
        // quantized u16 runs can leave the section at 2 mod 4, so realign
        // before a wider accessor lands
        let align = data.component_type.byte_size();
        while bytes.len() % align != 0 {
            bytes.push(0);
        }
        let local_offset = bytes.len();
        bytes.extend_from_slice(&data.bytes);

        if data.decode_matrix.is_some() {
            self.quantization_used = true;
        }

        let index = self.accessors.len();
        self.accessors.push(PendingAccessor {
            section,
            local_offset,
            data,
        });
        index
    }

    /// Commit a packed vertex attribute accessor.
    pub fn add_attribute(&mut self, data: AccessorData) -> usize {
        self.push_accessor(Section::Attribute, data)
    }

    /// Commit a packed element index accessor.
    pub fn add_indices(&mut self, data: AccessorData) -> usize {
        self.push_accessor(Section::Index, data)
    }

    /// Commit the inverse-bind-matrix accessor for one skin, MAT4 float with
    /// min/max over the flattened components.
    pub fn add_inverse_bind_matrices(&mut self, matrices: &[Mat4]) -> Result<usize> {
        let mut flat = Vec::with_capacity(matrices.len() * 16);
        for m in matrices {
            flat.extend_from_slice(&m.to_cols_array());
        }
        let data = packer::pack_f32(&flat, ElementType::Mat4, true)?;
        Ok(self.push_accessor(Section::InverseBind, data))
    }

    /// Commit an animation keyframe-time accessor, deduplicating identical
    /// (bit-exact) time sequences across channels and nodes.
    pub fn add_animation_times(&mut self, times: &[f32]) -> Result<usize> {
        let key: Vec<u32> = times.iter().copied().map(f32::to_bits).collect();
        if let Some(&index) = self.time_dedup.get(&key) {
            return Ok(index);
        }
        // input accessors need min/max for validity
        let data = packer::pack_f32(times, ElementType::Scalar, true)?;
        let index = self.push_accessor(Section::Animation, data);
        self.time_dedup.insert(key, index);
        Ok(index)
    }

    /// Commit an animation value accessor.
    pub fn add_animation_values(&mut self, values: &[f32], element: ElementType) -> Result<usize> {
        let data = packer::pack_f32(values, element, false)?;
        Ok(self.push_accessor(Section::Animation, data))
    }

    // ========================================================================
    // Entity Tables
    // ========================================================================

    pub fn push_node(&mut self, node: GltfNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        index
    }

    pub fn add_mesh(&mut self, mesh: GltfMesh) -> usize {
        let index = self.meshes.len();
        self.meshes.push(mesh);
        index
    }

    pub fn add_camera(&mut self, camera: GltfCamera) -> usize {
        let index = self.cameras.len();
        self.cameras.push(camera);
        index
    }

    pub fn add_skin(&mut self, skin: GltfSkin) -> usize {
        let index = self.skins.len();
        self.skins.push(skin);
        index
    }

    /// Materials are intentionally not deduplicated: each mesh assignment
    /// becomes its own entry.
    pub fn add_material(&mut self, material: GltfMaterial) -> usize {
        let index = self.materials.len();
        self.materials.push(material);
        index
    }

    pub fn add_scene(&mut self, scene: GltfScene) -> usize {
        let index = self.scenes.len();
        self.scenes.push(scene);
        self.scene = Some(index);
        index
    }

    pub fn add_animation(&mut self, animation: GltfAnimation) -> usize {
        let index = self.animations.len();
        self.animations.push(animation);
        index
    }

    // ========================================================================
    // Image/Texture/Sampler Methods (deduplicated)
    // ========================================================================

    /// Image referenced by URI; identical paths share one entry.
    pub fn add_image_uri(&mut self, path: &str) -> usize {
        if let Some(&index) = self.image_dedup.get(path) {
            return index;
        }
        let index = self.images.len();
        self.images.push(GltfImage {
            uri: Some(path.to_string()),
            buffer_view: None,
            mime_type: None,
        });
        self.image_dedup.insert(path.to_string(), index);
        index
    }

    /// Replace a URI image with payload bytes embedded in the binary buffer.
    pub fn embed_image(&mut self, image: usize, bytes: Vec<u8>, mime_type: &str) {
        self.image_data.push(PendingImageData { image, bytes });
        if let Some(entry) = self.images.get_mut(image) {
            entry.uri = None;
            entry.mime_type = Some(mime_type.to_string());
        }
    }

    /// Images still referenced by URI, as `(image index, uri)` pairs.
    pub fn uri_images(&self) -> Vec<(usize, String)> {
        self.images
            .iter()
            .enumerate()
            .filter_map(|(index, image)| image.uri.clone().map(|uri| (index, uri)))
            .collect()
    }

    /// Sampler for a wrap-mode pair; identical pairs share one entry.
    pub fn add_sampler(&mut self, wrap_u: WrapMode, wrap_v: WrapMode) -> usize {
        if let Some(&index) = self.sampler_dedup.get(&(wrap_u, wrap_v)) {
            return index;
        }
        let index = self.samplers.len();
        self.samplers.push(GltfSampler {
            wrap_s: wrap_u.gl_code(),
            wrap_t: wrap_v.gl_code(),
            min_filter: GL_LINEAR_MIPMAP_LINEAR,
            mag_filter: GL_LINEAR,
        });
        self.sampler_dedup.insert((wrap_u, wrap_v), index);
        index
    }

    /// Texture binding an image to a sampler; identical pairs share one entry.
    pub fn add_texture(&mut self, image: usize, sampler: Option<usize>) -> usize {
        if let Some(&index) = self.texture_dedup.get(&(image, sampler)) {
            return index;
        }
        let index = self.textures.len();
        self.textures.push(GltfTexture {
            source: image,
            sampler,
        });
        self.texture_dedup.insert((image, sampler), index);
        index
    }

    // ========================================================================
    // Layout & Finish
    // ========================================================================

    /// Lay out the buffer sections and compose the final document.
    ///
    /// Sections are appended in fixed order: attributes, inverse bind
    /// matrices, animation data, indices, then embedded images. Before a
    /// non-index section whose running offset is not a multiple of 4, two
    /// zero bytes of padding are inserted (all component sizes are 2 or 4
    /// bytes, so offsets are always even).
    pub fn finish(self, buffer_uri: Option<String>) -> (GltfDocument, Vec<u8>) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut buffer_views: Vec<GltfBufferView> = Vec::new();

        let mut section_views: [Option<usize>; 4] = [None; 4];
        let sections = [
            (Section::Attribute, &self.attribute_bytes, Some(ARRAY_BUFFER)),
            (Section::InverseBind, &self.ibm_bytes, None),
            (Section::Animation, &self.animation_bytes, None),
            (Section::Index, &self.index_bytes, Some(ELEMENT_ARRAY_BUFFER)),
        ];
        for (section, bytes, target) in sections {
            if bytes.is_empty() {
                continue;
            }
            if section != Section::Index && buffer.len() % 4 != 0 {
                buffer.extend_from_slice(&[0, 0]);
            }
            section_views[section as usize] = Some(buffer_views.len());
            buffer_views.push(GltfBufferView {
                buffer: 0,
                byte_offset: buffer.len(),
                byte_length: bytes.len(),
                target,
            });
            buffer.extend_from_slice(bytes);
        }

        let mut images = self.images;
        for pending in self.image_data {
            while buffer.len() % 4 != 0 {
                buffer.push(0);
            }
            let view = buffer_views.len();
            buffer_views.push(GltfBufferView {
                buffer: 0,
                byte_offset: buffer.len(),
                byte_length: pending.bytes.len(),
                target: None,
            });
            buffer.extend_from_slice(&pending.bytes);
            if let Some(entry) = images.get_mut(pending.image) {
                entry.buffer_view = Some(view);
            }
        }

        let accessors: Vec<GltfAccessor> = self
            .accessors
            .into_iter()
            .map(|pending| {
                let data = pending.data;
                GltfAccessor {
                    // sections with accessors are never empty, the view exists
                    buffer_view: section_views[pending.section as usize].unwrap_or(0),
                    byte_offset: pending.local_offset,
                    component_type: data.component_type.gl_code(),
                    count: data.count,
                    accessor_type: data.element_type.name().to_string(),
                    min: data.min,
                    max: data.max,
                    normalized: data.normalized.then_some(true),
                    extensions: data.decode_matrix.map(|decode_matrix| {
                        GltfAccessorExtensions {
                            quantized: Some(GltfQuantizedExtension {
                                decode_matrix,
                            }),
                        }
                    }),
                }
            })
            .collect();

        let extensions = if self.quantization_used {
            vec!["WEB3D_quantized_attributes".to_string()]
        } else {
            Vec::new()
        };

        let document = GltfDocument {
            asset: GltfAsset {
                version: "2.0".to_string(),
                generator: Some(format!("scene2gltf {}", env!("CARGO_PKG_VERSION"))),
            },
            extensions_used: extensions.clone(),
            extensions_required: extensions,
            scene: self.scene,
            scenes: self.scenes,
            nodes: self.nodes,
            meshes: self.meshes,
            cameras: self.cameras,
            skins: self.skins,
            materials: self.materials,
            textures: self.textures,
            images,
            samplers: self.samplers,
            animations: self.animations,
            accessors,
            buffer_views,
            buffers: vec![GltfBuffer {
                byte_length: buffer.len(),
                uri: buffer_uri,
            }],
        };

        (document, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::packer::{pack_f32, pack_u16, quantize_f32};

    #[test]
    fn sections_lay_out_in_fixed_order_with_increasing_offsets() {
        let mut session = ConversionSession::new();
        session.add_attribute(pack_f32(&[1.0, 2.0, 3.0], ElementType::Vec3, true).unwrap());
        session
            .add_inverse_bind_matrices(&[Mat4::IDENTITY])
            .unwrap();
        session.add_animation_times(&[0.0, 1.0]).unwrap();
        session.add_indices(pack_u16(&[0, 1, 2], ElementType::Scalar).unwrap());

        let (document, buffer) = session.finish(None);

        assert_eq!(document.buffer_views.len(), 4);
        let offsets: Vec<usize> = document.buffer_views.iter().map(|v| v.byte_offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(document.buffer_views[0].target, Some(ARRAY_BUFFER));
        assert_eq!(document.buffer_views[1].target, None);
        assert_eq!(document.buffer_views[2].target, None);
        assert_eq!(document.buffer_views[3].target, Some(ELEMENT_ARRAY_BUFFER));

        // 12 attr + 64 ibm + 8 times + 6 indices, no padding needed
        assert_eq!(buffer.len(), 12 + 64 + 8 + 6);
        assert_eq!(document.buffers[0].byte_length, buffer.len());
    }

    #[test]
    fn odd_section_boundary_gets_two_pad_bytes() {
        let mut session = ConversionSession::new();
        // quantized u16 vec3 x 1 element = 6 bytes, leaving the running
        // offset at 2 mod 4
        session.add_attribute(quantize_f32(&[1.0, 2.0, 3.0], ElementType::Vec3).unwrap());
        session
            .add_inverse_bind_matrices(&[Mat4::IDENTITY])
            .unwrap();

        let (document, buffer) = session.finish(None);

        assert_eq!(document.buffer_views[0].byte_offset, 0);
        assert_eq!(document.buffer_views[0].byte_length, 6);
        // 2 zero bytes of padding precede the 4-byte-component section
        assert_eq!(document.buffer_views[1].byte_offset, 8);
        assert_eq!(&buffer[6..8], &[0, 0]);

        // alignment invariant: every view holding 4-byte components sits on
        // a multiple of 4
        assert_eq!(document.buffer_views[1].byte_offset % 4, 0);
    }

    #[test]
    fn float_accessor_realigns_after_quantized_data() {
        let mut session = ConversionSession::new();
        // quantized u16 vec3 x 1 element leaves the section at 6 bytes
        session.add_attribute(quantize_f32(&[1.0, 2.0, 3.0], ElementType::Vec3).unwrap());
        session.add_attribute(pack_f32(&[0.5, 0.5, 0.5, 1.0], ElementType::Vec4, true).unwrap());

        let (document, buffer) = session.finish(None);

        assert_eq!(document.accessors[0].byte_offset, 0);
        // the 4-byte-component accessor lands on the next multiple of 4
        assert_eq!(document.accessors[1].byte_offset, 8);
        assert_eq!(&buffer[6..8], &[0, 0]);
    }

    #[test]
    fn quantized_accessor_carries_decode_matrix_and_extension() {
        let mut session = ConversionSession::new();
        session.add_attribute(quantize_f32(&[0.0, 0.5, 1.0, 2.0], ElementType::Vec2).unwrap());
        let (document, _) = session.finish(None);

        assert_eq!(
            document.extensions_used,
            vec!["WEB3D_quantized_attributes".to_string()]
        );
        let ext = document.accessors[0].extensions.as_ref().unwrap();
        let decode = &ext.quantized.as_ref().unwrap().decode_matrix;
        assert_eq!(decode.len(), 9);
    }

    #[test]
    fn identical_time_sequences_share_one_accessor() {
        let mut session = ConversionSession::new();
        let a = session.add_animation_times(&[0.0, 0.5, 1.0]).unwrap();
        let b = session.add_animation_times(&[0.0, 0.5, 1.0]).unwrap();
        let c = session.add_animation_times(&[0.0, 0.5, 1.5]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn samplers_textures_and_images_deduplicate() {
        let mut session = ConversionSession::new();
        let s1 = session.add_sampler(WrapMode::Repeat, WrapMode::Repeat);
        let s2 = session.add_sampler(WrapMode::Repeat, WrapMode::Repeat);
        let s3 = session.add_sampler(WrapMode::ClampToEdge, WrapMode::Repeat);
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);

        let i1 = session.add_image_uri("textures/wood.png");
        let i2 = session.add_image_uri("textures/wood.png");
        assert_eq!(i1, i2);

        let t1 = session.add_texture(i1, Some(s1));
        let t2 = session.add_texture(i1, Some(s1));
        let t3 = session.add_texture(i1, Some(s3));
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);
    }

    #[test]
    fn empty_collections_are_omitted_from_json() {
        let session = ConversionSession::new();
        let (document, _) = session.finish(Some("out.bin".to_string()));
        let json = serde_json::to_value(&document).unwrap();
        let object = json.as_object().unwrap();

        for absent in [
            "cameras", "skins", "materials", "images", "samplers", "textures", "animations",
            "scene", "scenes", "nodes", "meshes",
        ] {
            assert!(!object.contains_key(absent), "unexpected key {absent}");
        }
        assert!(object.contains_key("buffers"));
        assert!(object.contains_key("asset"));
    }

    #[test]
    fn embedded_images_land_after_indices_aligned() {
        let mut session = ConversionSession::new();
        session.add_indices(pack_u16(&[0, 1, 2], ElementType::Scalar).unwrap());
        let image = session.add_image_uri("skin.png");
        session.embed_image(image, vec![9; 5], "image/png");

        let (document, buffer) = session.finish(None);

        let image_entry = &document.images[0];
        assert!(image_entry.uri.is_none());
        let view = &document.buffer_views[image_entry.buffer_view.unwrap()];
        assert_eq!(view.byte_offset % 4, 0);
        assert_eq!(view.byte_length, 5);
        assert_eq!(&buffer[view.byte_offset..view.byte_offset + 5], &[9; 5]);
    }
}
