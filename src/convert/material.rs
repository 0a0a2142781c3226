//! Source material to glTF PBR value mapping.
//!
//! Legacy shading values map onto metallic-roughness by convention: diffuse
//! becomes the base color, metallic is pinned to 0, and roughness derives
//! from shininess when the source is Phong. Only value mapping is attempted;
//! no shading-model emulation.

use crate::gltf::types::{
    GltfMaterial, GltfPbrMetallicRoughness, GltfTextureInfo,
};
use crate::scene::{MaterialSource, ShadingModel, TextureSource};

use super::session::ConversionSession;

/// Shininess above this maps to fully smooth.
const MAX_SHININESS: f32 = 1024.0;

fn bind_texture(session: &mut ConversionSession, texture: &TextureSource) -> GltfTextureInfo {
    let image = session.add_image_uri(&texture.path);
    let sampler = session.add_sampler(texture.wrap_u, texture.wrap_v);
    GltfTextureInfo {
        index: session.add_texture(image, Some(sampler)),
    }
}

/// Convert one source material, registering its textures with the session.
pub fn convert(session: &mut ConversionSession, source: &MaterialSource) -> usize {
    let mut alpha = source.transparency;
    // old exporters write 0 for opaque objects
    if alpha == 0.0 {
        alpha = 1.0;
    }

    let base_color_texture = source
        .diffuse_texture
        .as_ref()
        .map(|texture| bind_texture(session, texture));
    let normal_texture = source
        .normal_texture
        .as_ref()
        .map(|texture| bind_texture(session, texture));

    let roughness = match source.shading {
        ShadingModel::Phong => {
            1.0 - (source.shininess.clamp(0.0, MAX_SHININESS) / MAX_SHININESS).sqrt()
        }
        ShadingModel::Lambert | ShadingModel::Unknown => 1.0,
    };

    let [r, g, b] = source.diffuse;
    let material = GltfMaterial {
        name: Some(source.name.clone()),
        pbr_metallic_roughness: GltfPbrMetallicRoughness {
            base_color_factor: Some([r, g, b, alpha]),
            base_color_texture,
            metallic_factor: 0.0,
            roughness_factor: roughness,
        },
        normal_texture,
        emissive_factor: (source.emissive != [0.0; 3]).then_some(source.emissive),
        alpha_mode: (alpha < 1.0).then(|| "BLEND".to_string()),
    };
    session.add_material(material)
}
