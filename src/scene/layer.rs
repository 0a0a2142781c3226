//! Per-vertex attribute layers and their mapping/reference modes.
//!
//! A layer stores its values the way the source file declares them: either
//! one value per control point or one per polygon corner, either directly or
//! through an index array. [`AttributeLayer::resolve`] expands the layer into
//! a flat value array and reports whether the values are per-corner (which
//! forces vertex splitting downstream).

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How layer values map onto the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingMode {
    /// One value per control point.
    ByControlPoint,
    /// One value per polygon corner.
    ByPolygonVertex,
    /// One value per polygon. Not meaningful for vertex attributes.
    ByPolygon,
    /// A single value for the whole mesh. Not meaningful for vertex attributes.
    AllSame,
}

/// How layer values are referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceMode {
    /// Values read straight out of the direct array.
    Direct,
    /// Values read through an index array into the direct array.
    IndexToDirect,
}

/// An attribute layer (normal, uv, color) with its declared modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeLayer<T> {
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
    /// The direct value array.
    pub direct: Vec<T>,
    /// The index array, used only with [`ReferenceMode::IndexToDirect`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<u32>,
}

/// A layer expanded to a flat value array.
#[derive(Debug, Clone)]
pub struct ResolvedLayer<T> {
    /// One value per control point (`split == false`) or per polygon corner
    /// (`split == true`).
    pub values: Vec<T>,
    /// Whether the values are per-corner and force vertex splitting.
    pub split: bool,
}

impl<T: Copy> AttributeLayer<T> {
    /// Expand the layer according to its mapping/reference modes.
    ///
    /// Unsupported combinations are a hard stop for this layer only: a
    /// warning is logged and `None` is returned, which propagates as an
    /// absent attribute rather than an error.
    pub fn resolve(&self, layer_name: &str) -> Option<ResolvedLayer<T>> {
        match (self.mapping, self.reference) {
            (MappingMode::ByControlPoint, ReferenceMode::Direct) => Some(ResolvedLayer {
                values: self.direct.clone(),
                split: false,
            }),
            (MappingMode::ByControlPoint, ReferenceMode::IndexToDirect) => {
                let values = self.lookup_indices(layer_name)?;
                Some(ResolvedLayer { values, split: false })
            }
            (MappingMode::ByPolygonVertex, ReferenceMode::Direct) => Some(ResolvedLayer {
                values: self.direct.clone(),
                split: true,
            }),
            (MappingMode::ByPolygonVertex, ReferenceMode::IndexToDirect) => {
                let values = self.lookup_indices(layer_name)?;
                Some(ResolvedLayer { values, split: true })
            }
            (mapping, reference) => {
                warn!(
                    layer = layer_name,
                    ?mapping,
                    ?reference,
                    "unsupported layer mapping/reference mode, dropping layer"
                );
                None
            }
        }
    }

    fn lookup_indices(&self, layer_name: &str) -> Option<Vec<T>> {
        let mut values = Vec::with_capacity(self.indices.len());
        for &idx in &self.indices {
            match self.direct.get(idx as usize) {
                Some(&v) => values.push(v),
                None => {
                    warn!(
                        layer = layer_name,
                        index = idx,
                        len = self.direct.len(),
                        "layer index out of range, dropping layer"
                    );
                    return None;
                }
            }
        }
        Some(values)
    }
}
