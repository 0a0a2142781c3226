//! Vertex welding: deduplication of per-corner attribute tuples into a
//! unique indexed vertex set.
//!
//! Two corners are the same vertex iff every attribute component compares
//! bit-for-bit equal; floats are keyed on their raw bit patterns with no
//! epsilon. Re-expanding the unique arrays through the index list reproduces
//! the original per-corner attribute stream exactly.

use glam::{Vec2, Vec3, Vec4};
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::scene::layer::ResolvedLayer;

/// Per-corner inputs of one primitive, with layers already resolved.
#[derive(Debug, Default)]
pub struct CornerStream<'a> {
    /// Raw control points.
    pub control_points: &'a [Vec3],
    /// Triangulated corner list as control-point indices.
    pub polygon_vertices: &'a [u32],
    pub normals: Option<&'a ResolvedLayer<Vec3>>,
    pub uv0: Option<&'a ResolvedLayer<Vec2>>,
    pub uv1: Option<&'a ResolvedLayer<Vec2>>,
    pub colors: Option<&'a ResolvedLayer<Vec4>>,
    /// Per-control-point joint slots from skin resolution.
    pub joints: Option<&'a [[u16; 4]]>,
    /// Per-control-point weight slots from skin resolution.
    pub weights: Option<&'a [[f32; 4]]>,
}

/// Welded output: unique attribute arrays plus the index list.
#[derive(Debug, Default)]
pub struct WeldedPrimitive {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uv0: Option<Vec<Vec2>>,
    pub uv1: Option<Vec<Vec2>>,
    pub colors: Option<Vec<Vec4>>,
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
}

impl WeldedPrimitive {
    pub fn unique_count(&self) -> usize {
        self.positions.len()
    }

    /// Index width is decided once per primitive: u16 iff the unique vertex
    /// count is below 0xFFFF.
    pub fn needs_wide_indices(&self) -> bool {
        self.unique_count() >= 0xFFFF
    }
}

fn layer_value<T: Copy>(layer: &ResolvedLayer<T>, corner: usize, control_point: usize) -> Option<T> {
    let index = if layer.split { corner } else { control_point };
    layer.values.get(index).copied()
}

/// A layer must cover every corner (split) or every control point; anything
/// shorter would leave the unique attribute arrays unequal in length.
fn check_layer_len<T>(
    name: &'static str,
    layer: Option<&ResolvedLayer<T>>,
    corners: usize,
    control_points: usize,
) -> Result<()> {
    let Some(layer) = layer else {
        return Ok(());
    };
    let expected = if layer.split { corners } else { control_points };
    if layer.values.len() < expected {
        return Err(Error::LayerTooShort {
            layer: name,
            expected,
            actual: layer.values.len(),
        });
    }
    Ok(())
}

/// Weld a corner stream into unique vertex arrays plus indices.
///
/// If no resolved layer requires per-corner splitting, the raw control-point
/// arrays are canonical and pass through untouched together with the
/// polygon-vertex list. Otherwise corners are deduplicated through an
/// insertion-ordered map keyed on the bit-exact attribute tuple.
pub fn weld(stream: &CornerStream<'_>) -> Result<WeldedPrimitive> {
    let corners = stream.polygon_vertices.len();
    let control_points = stream.control_points.len();
    check_layer_len("normal", stream.normals, corners, control_points)?;
    check_layer_len("uv0", stream.uv0, corners, control_points)?;
    check_layer_len("uv1", stream.uv1, corners, control_points)?;
    check_layer_len("color", stream.colors, corners, control_points)?;

    let needs_split = [
        stream.normals.map(|l| l.split),
        stream.uv0.map(|l| l.split),
        stream.uv1.map(|l| l.split),
        stream.colors.map(|l| l.split),
    ]
    .into_iter()
    .flatten()
    .any(|split| split);

    if !needs_split {
        // per-control-point arrays are canonical; extra trailing values past
        // the control-point count would desync the accessor counts
        return Ok(WeldedPrimitive {
            positions: stream.control_points.to_vec(),
            normals: stream.normals.map(|l| l.values[..control_points].to_vec()),
            uv0: stream.uv0.map(|l| l.values[..control_points].to_vec()),
            uv1: stream.uv1.map(|l| l.values[..control_points].to_vec()),
            colors: stream.colors.map(|l| l.values[..control_points].to_vec()),
            joints: stream.joints.map(<[_]>::to_vec),
            weights: stream.weights.map(<[_]>::to_vec),
            indices: stream.polygon_vertices.to_vec(),
        });
    }

    let mut out = WeldedPrimitive {
        normals: stream.normals.map(|_| Vec::new()),
        uv0: stream.uv0.map(|_| Vec::new()),
        uv1: stream.uv1.map(|_| Vec::new()),
        colors: stream.colors.map(|_| Vec::new()),
        joints: stream.joints.map(|_| Vec::new()),
        weights: stream.weights.map(|_| Vec::new()),
        ..WeldedPrimitive::default()
    };

    let mut vertex_map: IndexMap<Vec<u32>, u32> = IndexMap::new();

    for (corner, &cp) in stream.polygon_vertices.iter().enumerate() {
        let cp = cp as usize;
        let position = stream
            .control_points
            .get(cp)
            .copied()
            .ok_or(Error::CornerOutOfRange {
                index: cp,
                count: stream.control_points.len(),
            })?;

        let normal = stream.normals.and_then(|l| layer_value(l, corner, cp));
        let uv0 = stream.uv0.and_then(|l| layer_value(l, corner, cp));
        let uv1 = stream.uv1.and_then(|l| layer_value(l, corner, cp));
        let color = stream.colors.and_then(|l| layer_value(l, corner, cp));
        let joints = stream.joints.and_then(|j| j.get(cp).copied());
        let weights = stream.weights.and_then(|w| w.get(cp).copied());

        // bit-exact welding key over every attribute present at this corner
        let mut key: Vec<u32> = Vec::with_capacity(20);
        key.extend(position.to_array().map(f32::to_bits));
        if let Some(n) = normal {
            key.extend(n.to_array().map(f32::to_bits));
        }
        if let Some(uv) = uv0 {
            key.extend(uv.to_array().map(f32::to_bits));
        }
        if let Some(uv) = uv1 {
            key.extend(uv.to_array().map(f32::to_bits));
        }
        if let Some(c) = color {
            key.extend(c.to_array().map(f32::to_bits));
        }
        if let Some(j) = joints {
            key.extend(j.map(u32::from));
        }
        if let Some(w) = weights {
            key.extend(w.map(f32::to_bits));
        }

        if let Some(&index) = vertex_map.get(&key) {
            out.indices.push(index);
            continue;
        }

        let index = vertex_map.len() as u32;
        vertex_map.insert(key, index);
        out.indices.push(index);

        out.positions.push(position);
        if let (Some(values), Some(n)) = (out.normals.as_mut(), normal) {
            values.push(n);
        }
        if let (Some(values), Some(uv)) = (out.uv0.as_mut(), uv0) {
            values.push(uv);
        }
        if let (Some(values), Some(uv)) = (out.uv1.as_mut(), uv1) {
            values.push(uv);
        }
        if let (Some(values), Some(c)) = (out.colors.as_mut(), color) {
            values.push(c);
        }
        if let (Some(values), Some(j)) = (out.joints.as_mut(), joints) {
            values.push(j);
        }
        if let (Some(values), Some(w)) = (out.weights.as_mut(), weights) {
            values.push(w);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corner_layer<T>(values: Vec<T>) -> ResolvedLayer<T> {
        ResolvedLayer { values, split: true }
    }

    fn point_layer<T>(values: Vec<T>) -> ResolvedLayer<T> {
        ResolvedLayer { values, split: false }
    }

    fn v3(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn fast_path_passes_control_point_arrays_through() {
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)];
        let polygon_vertices = vec![0, 1, 2];
        let normals = point_layer(vec![Vec3::Z; 3]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };

        let welded = weld(&stream).unwrap();
        assert_eq!(welded.positions, control_points);
        assert_eq!(welded.indices, polygon_vertices);
        assert_eq!(welded.normals.unwrap(), vec![Vec3::Z; 3]);
    }

    #[test]
    fn triangle_with_uv_seam_keeps_three_vertices() {
        // 3 distinct positions, shared normal, 2 distinct uvs due to a seam:
        // the uv difference alone keeps all corners unique.
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)];
        let polygon_vertices = vec![0, 1, 2];
        let normals = point_layer(vec![Vec3::Z; 3]);
        let uv0 = corner_layer(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 0.0),
        ]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            uv0: Some(&uv0),
            ..CornerStream::default()
        };

        let welded = weld(&stream).unwrap();
        assert_eq!(welded.unique_count(), 3);
        assert_eq!(welded.indices, vec![0, 1, 2]);
    }

    #[test]
    fn quad_shares_edge_vertices() {
        // quad split into two triangles; the shared edge welds
        let control_points = vec![
            v3(0.0, 0.0, 0.0),
            v3(1.0, 0.0, 0.0),
            v3(1.0, 1.0, 0.0),
            v3(0.0, 1.0, 0.0),
        ];
        let polygon_vertices = vec![0, 1, 2, 0, 2, 3];
        let normals = corner_layer(vec![Vec3::Z; 6]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };

        let welded = weld(&stream).unwrap();
        assert_eq!(welded.unique_count(), 4);
        assert_eq!(welded.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn welding_is_idempotent_under_reexpansion() {
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)];
        let polygon_vertices = vec![0, 1, 2, 2, 1, 0];
        let corner_normals: Vec<Vec3> = vec![
            Vec3::Z,
            Vec3::Z,
            Vec3::Z,
            Vec3::X,
            Vec3::X,
            Vec3::X,
        ];
        let normals = corner_layer(corner_normals.clone());
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };

        let welded = weld(&stream).unwrap();
        let unique_normals = welded.normals.unwrap();

        // unique arrays stay parallel
        assert_eq!(welded.positions.len(), unique_normals.len());
        // every index is in bounds
        assert!(welded
            .indices
            .iter()
            .all(|&i| (i as usize) < welded.positions.len()));

        // re-expansion reproduces the original corner stream exactly
        let expanded_positions: Vec<Vec3> = welded
            .indices
            .iter()
            .map(|&i| welded.positions[i as usize])
            .collect();
        let expected_positions: Vec<Vec3> = polygon_vertices
            .iter()
            .map(|&cp| control_points[cp as usize])
            .collect();
        assert_eq!(expanded_positions, expected_positions);

        let expanded_normals: Vec<Vec3> = welded
            .indices
            .iter()
            .map(|&i| unique_normals[i as usize])
            .collect();
        assert_eq!(expanded_normals, corner_normals);
    }

    #[test]
    fn negative_zero_is_a_distinct_vertex() {
        // bit-for-bit comparison: -0.0 and 0.0 do not weld
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(-0.0, 0.0, 0.0)];
        let polygon_vertices = vec![0, 1, 0];
        let normals = corner_layer(vec![Vec3::Z; 3]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };

        let welded = weld(&stream).unwrap();
        assert_eq!(welded.unique_count(), 2);
        assert_eq!(welded.indices, vec![0, 1, 0]);
    }

    #[test]
    fn short_split_layer_is_an_error() {
        // 3 corners but only 2 per-corner normals: welding through would
        // leave positions and normals with unequal lengths
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)];
        let polygon_vertices = vec![0, 1, 2];
        let normals = corner_layer(vec![Vec3::Z; 2]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };
        assert!(matches!(
            weld(&stream),
            Err(Error::LayerTooShort {
                layer: "normal",
                expected: 3,
                actual: 2,
            })
        ));
    }

    #[test]
    fn short_control_point_layer_is_an_error() {
        let control_points = vec![v3(0.0, 0.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 1.0, 0.0)];
        let polygon_vertices = vec![0, 1, 2];
        let uv0 = point_layer(vec![Vec2::ZERO; 2]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            uv0: Some(&uv0),
            ..CornerStream::default()
        };
        assert!(matches!(
            weld(&stream),
            Err(Error::LayerTooShort { layer: "uv0", .. })
        ));
    }

    #[test]
    fn corner_out_of_range_is_an_error() {
        let control_points = vec![v3(0.0, 0.0, 0.0)];
        let polygon_vertices = vec![0, 7, 0];
        let normals = corner_layer(vec![Vec3::Z; 3]);
        let stream = CornerStream {
            control_points: &control_points,
            polygon_vertices: &polygon_vertices,
            normals: Some(&normals),
            ..CornerStream::default()
        };
        assert!(weld(&stream).is_err());
    }
}
