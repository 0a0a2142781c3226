//! Skin resolution: bounded per-vertex joint influences and inverse bind
//! matrices.
//!
//! Joint indices are assigned in first-seen cluster order. Each control point
//! gets exactly 4 joint and 4 weight slots; the 5th and later influences
//! evict the currently-smallest-weight slot in favor of the new influence.
//! The eviction outcome depends on cluster traversal order — deterministic
//! for a given scene, but not order-independent. Weights are left
//! unnormalized unless explicitly requested.

use glam::Mat4;
use indexmap::IndexMap;
use tracing::warn;

use crate::error::{Error, Result};
use crate::scene::{NodeId, SkinCluster};

/// Maximum joint influences per vertex in the output format.
pub const MAX_INFLUENCES: usize = 4;

/// Resolved skin data for one mesh.
#[derive(Debug, Clone)]
pub struct ResolvedSkin {
    /// Joint nodes in first-seen cluster order.
    pub joints: Vec<NodeId>,
    /// Exactly 4 joint slots per control point; unused slots are joint 0.
    pub vertex_joints: Vec<[u16; 4]>,
    /// Exactly 4 weight slots per control point; unused slots are weight 0.
    pub vertex_weights: Vec<[f32; 4]>,
    /// One inverse bind matrix per joint, in `joints` order.
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Resolve cluster influence lists into bounded per-vertex arrays.
///
/// `geometric_transform` is the mesh's pivot transform, folded into every
/// inverse bind matrix:
/// `IBM = inverse(transform_link) * transform * geometric_transform`.
pub fn resolve(
    clusters: &[SkinCluster],
    control_point_count: usize,
    geometric_transform: Mat4,
    normalize_weights: bool,
) -> Result<ResolvedSkin> {
    let mut joint_indices: IndexMap<NodeId, u16> = IndexMap::new();
    let mut inverse_bind_matrices: Vec<Mat4> = Vec::new();

    let mut vertex_joints = vec![[0u16; MAX_INFLUENCES]; control_point_count];
    let mut vertex_weights = vec![[0.0f32; MAX_INFLUENCES]; control_point_count];
    let mut influence_counts = vec![0usize; control_point_count];

    let mut evicted_vertices = 0usize;
    let mut worst_influences = 0usize;

    for cluster in clusters {
        let joint_index = match joint_indices.get(&cluster.joint) {
            Some(&index) => index,
            None => {
                let index = joint_indices.len() as u16;
                joint_indices.insert(cluster.joint, index);
                // the first cluster naming a joint supplies its bind matrices
                inverse_bind_matrices
                    .push(cluster.transform_link.inverse() * cluster.transform * geometric_transform);
                index
            }
        };

        for &(control_point, weight) in &cluster.influences {
            let cp = control_point as usize;
            if cp >= control_point_count {
                return Err(Error::InfluenceOutOfRange {
                    index: cp,
                    count: control_point_count,
                });
            }

            let count = influence_counts[cp];
            if count < MAX_INFLUENCES {
                vertex_joints[cp][count] = joint_index;
                vertex_weights[cp][count] = weight;
            } else {
                // replace the smallest-weight slot, first-found minimum on ties
                let mut min_slot = 0;
                for slot in 1..MAX_INFLUENCES {
                    if vertex_weights[cp][slot] < vertex_weights[cp][min_slot] {
                        min_slot = slot;
                    }
                }
                vertex_joints[cp][min_slot] = joint_index;
                vertex_weights[cp][min_slot] = weight;

                if count == MAX_INFLUENCES {
                    evicted_vertices += 1;
                }
            }
            influence_counts[cp] = count + 1;
            worst_influences = worst_influences.max(count + 1);
        }
    }

    if evicted_vertices > 0 {
        warn!(
            vertices = evicted_vertices,
            worst = worst_influences,
            "more than {MAX_INFLUENCES} joint influences per vertex; \
             smallest-weight influences evicted"
        );
    }

    for cp in 0..control_point_count {
        // glTF requires joint 0 in slots with weight 0
        for slot in 0..MAX_INFLUENCES {
            if vertex_weights[cp][slot] == 0.0 {
                vertex_joints[cp][slot] = 0;
            }
        }
        if normalize_weights {
            let sum: f32 = vertex_weights[cp].iter().sum();
            if sum > 0.0 {
                for w in &mut vertex_weights[cp] {
                    *w /= sum;
                }
            }
        }
    }

    Ok(ResolvedSkin {
        joints: joint_indices.into_keys().collect(),
        vertex_joints,
        vertex_weights,
        inverse_bind_matrices,
    })
}
