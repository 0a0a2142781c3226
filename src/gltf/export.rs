//! Writers for the two output modes: `.gltf` + side `.bin`, and the single
//! chunked GLB container.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

use super::types::GltfDocument;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

/// Build a GLB byte stream: 12-byte header, JSON chunk padded to 4 with
/// ASCII spaces, binary chunk padded to 4 with zeros.
pub fn build_glb(document: &GltfDocument, buffer: &[u8]) -> Result<Vec<u8>> {
    let json = serde_json::to_string(document)?;
    let json_bytes = json.as_bytes();

    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_len = json_bytes.len() + json_padding;

    let bin_padding = (4 - (buffer.len() % 4)) % 4;
    let bin_chunk_len = buffer.len() + bin_padding;

    let total_len = 12 + 8 + json_chunk_len + 8 + bin_chunk_len;

    let mut output = Vec::with_capacity(total_len);

    // GLB header
    output.extend_from_slice(GLB_MAGIC);
    output.extend_from_slice(&GLB_VERSION.to_le_bytes());
    output.extend_from_slice(&(total_len as u32).to_le_bytes());

    // JSON chunk
    output.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
    output.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    output.extend_from_slice(json_bytes);
    for _ in 0..json_padding {
        output.push(b' ');
    }

    // Binary chunk
    output.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
    output.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    output.extend_from_slice(buffer);
    for _ in 0..bin_padding {
        output.push(0u8);
    }

    Ok(output)
}

/// Write a GLB file.
pub fn write_glb(document: &GltfDocument, buffer: &[u8], path: &Path) -> Result<()> {
    let glb = build_glb(document, buffer)?;
    let mut file = File::create(path)?;
    file.write_all(&glb)?;
    Ok(())
}

/// Derive the side `.bin` file name for a `.gltf` output path.
pub fn bin_filename(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| format!("{s}.bin"))
        .ok_or_else(|| Error::InvalidOutputPath {
            path: path.to_path_buf(),
        })
}

/// Write separate `.gltf` (JSON) and `.bin` (binary buffer) files. The
/// document's buffer entry must already carry the `.bin` URI.
pub fn write_gltf(
    document: &GltfDocument,
    buffer: &[u8],
    path: &Path,
    beautify: bool,
) -> Result<()> {
    let bin_path = path.with_file_name(bin_filename(path)?);

    let json = if beautify {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };

    let mut gltf_file = File::create(path)?;
    gltf_file.write_all(json.as_bytes())?;

    let mut bin_file = File::create(&bin_path)?;
    bin_file.write_all(buffer)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::types::{GltfAsset, GltfBuffer};

    fn empty_document() -> GltfDocument {
        GltfDocument {
            asset: GltfAsset {
                version: "2.0".to_string(),
                generator: None,
            },
            extensions_used: Vec::new(),
            extensions_required: Vec::new(),
            scene: None,
            scenes: Vec::new(),
            nodes: Vec::new(),
            meshes: Vec::new(),
            cameras: Vec::new(),
            skins: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            images: Vec::new(),
            samplers: Vec::new(),
            animations: Vec::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            buffers: vec![GltfBuffer {
                byte_length: 5,
                uri: None,
            }],
        }
    }

    #[test]
    fn glb_header_and_chunk_alignment() {
        let glb = build_glb(&empty_document(), &[1, 2, 3, 4, 5]).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(glb[4..8].try_into().unwrap()), 2);
        assert_eq!(
            u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize,
            glb.len()
        );

        let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
        assert_eq!(json_len % 4, 0);
        assert_eq!(u32::from_le_bytes(glb[16..20].try_into().unwrap()), CHUNK_JSON);

        let bin_chunk = 20 + json_len;
        let bin_len = u32::from_le_bytes(glb[bin_chunk..bin_chunk + 4].try_into().unwrap()) as usize;
        assert_eq!(bin_len % 4, 0);
        assert_eq!(
            u32::from_le_bytes(glb[bin_chunk + 4..bin_chunk + 8].try_into().unwrap()),
            CHUNK_BIN
        );
        // 5 payload bytes are zero-padded to 8
        assert_eq!(bin_len, 8);
        assert_eq!(&glb[bin_chunk + 8..bin_chunk + 13], &[1, 2, 3, 4, 5]);
        assert_eq!(&glb[bin_chunk + 13..], &[0, 0, 0]);
    }

    #[test]
    fn json_chunk_is_space_padded() {
        let glb = build_glb(&empty_document(), &[]).unwrap();
        let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
        let json_chunk = &glb[20..20 + json_len];
        // any padding at the end of the JSON chunk must be ASCII space
        let text_end = json_chunk.iter().rposition(|&b| b == b'}').unwrap() + 1;
        assert!(json_chunk[text_end..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn bin_filename_follows_output_stem() {
        assert_eq!(bin_filename(Path::new("out/model.gltf")).unwrap(), "model.bin");
    }
}
