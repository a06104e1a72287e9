//! 顶点蒙皮计算

use glam::Vec3;
use rayon::prelude::*;

use crate::model::{Vertex, Weight};
use crate::skeleton::Joint;

use super::{SkinningInput, SkinningOutput};

/// 蒙皮上下文
#[derive(Clone, Debug)]
pub struct SkinningContext {
    /// 顶点数达到该值时使用 rayon 并行计算
    pub parallel_threshold: usize,
}

impl Default for SkinningContext {
    fn default() -> Self {
        Self {
            parallel_threshold: 2048,
        }
    }
}

/// 计算蒙皮，结果写入 `output`（复用已有分配）
///
/// position = Σ bias * (joint.world ∘ offset)
pub fn compute_skinning(input: &SkinningInput, context: &SkinningContext, output: &mut SkinningOutput) {
    let vertex_count = input.vertices.len();
    output.positions.resize(vertex_count, Vec3::ZERO);

    if vertex_count >= context.parallel_threshold {
        output
            .positions
            .par_iter_mut()
            .zip(input.vertices.par_iter())
            .for_each(|(pos_out, vertex)| {
                *pos_out = compute_single_vertex(vertex, input.weights, input.joints);
            });
    } else {
        for (pos_out, vertex) in output.positions.iter_mut().zip(input.vertices) {
            *pos_out = compute_single_vertex(vertex, input.weights, input.joints);
        }
    }
}

/// 计算单个顶点的蒙皮
fn compute_single_vertex(vertex: &Vertex, weights: &[Weight], joints: &[Joint]) -> Vec3 {
    let end = vertex.weight_start.saturating_add(vertex.weight_count);
    let Some(vertex_weights) = weights.get(vertex.weight_start..end) else {
        return Vec3::ZERO;
    };

    vertex_weights.iter().fold(Vec3::ZERO, |acc, weight| {
        match joints.get(weight.joint_index) {
            Some(joint) => acc + joint.world.transform_point(weight.offset) * weight.bias,
            None => acc,
        }
    })
}

/// 按三角形面积加权重新计算顶点法线
pub fn compute_normals(positions: &[Vec3], triangles: &[[u32; 3]], normals: &mut Vec<Vec3>) {
    normals.clear();
    normals.resize(positions.len(), Vec3::ZERO);

    for tri in triangles {
        let [a, b, c] = tri.map(|i| i as usize);
        let (Some(&p0), Some(&p1), Some(&p2)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        // 叉积长度即两倍面积
        let face = (p1 - p0).cross(p2 - p0);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    for n in normals.iter_mut() {
        *n = n.normalize_or_zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::JointTransform;
    use glam::{Quat, Vec2};
    use std::f32::consts::FRAC_PI_2;

    fn joint(translation: Vec3, orientation: Quat) -> Joint {
        Joint::new("joint", -1, JointTransform::new(translation, orientation))
    }

    fn vertex(start: usize, count: usize) -> Vertex {
        Vertex {
            uv: Vec2::ZERO,
            weight_start: start,
            weight_count: count,
        }
    }

    fn weight(joint_index: usize, bias: f32, offset: Vec3) -> Weight {
        Weight {
            joint_index,
            bias,
            offset,
        }
    }

    #[test]
    fn test_single_weight_follows_joint() {
        let joints = [joint(Vec3::new(0.0, 2.0, 0.0), Quat::from_rotation_z(FRAC_PI_2))];
        let vertices = [vertex(0, 1)];
        let weights = [weight(0, 1.0, Vec3::X)];
        let mut output = SkinningOutput::default();
        compute_skinning(
            &SkinningInput {
                vertices: &vertices,
                weights: &weights,
                joints: &joints,
            },
            &SkinningContext::default(),
            &mut output,
        );
        assert!(output.positions[0].abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_weights_are_blended_by_bias() {
        let joints = [
            joint(Vec3::ZERO, Quat::IDENTITY),
            joint(Vec3::new(4.0, 0.0, 0.0), Quat::IDENTITY),
        ];
        let vertices = [vertex(0, 2)];
        let weights = [weight(0, 0.75, Vec3::ZERO), weight(1, 0.25, Vec3::ZERO)];
        let mut output = SkinningOutput::default();
        compute_skinning(
            &SkinningInput {
                vertices: &vertices,
                weights: &weights,
                joints: &joints,
            },
            &SkinningContext::default(),
            &mut output,
        );
        assert_eq!(output.positions[0], Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let joints = [
            joint(Vec3::new(1.0, 0.0, 0.0), Quat::from_rotation_y(0.3)),
            joint(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_x(0.7)),
        ];
        let weights: Vec<Weight> = (0..200)
            .flat_map(|i| {
                let offset = Vec3::new(i as f32 * 0.01, 1.0, -0.5);
                [weight(0, 0.4, offset), weight(1, 0.6, offset)]
            })
            .collect();
        let vertices: Vec<Vertex> = (0..200).map(|i| vertex(i * 2, 2)).collect();
        let input = SkinningInput {
            vertices: &vertices,
            weights: &weights,
            joints: &joints,
        };

        let mut sequential = SkinningOutput::default();
        compute_skinning(&input, &SkinningContext { parallel_threshold: usize::MAX }, &mut sequential);
        let mut parallel = SkinningOutput::default();
        compute_skinning(&input, &SkinningContext { parallel_threshold: 1 }, &mut parallel);
        assert_eq!(sequential.positions, parallel.positions);
    }

    #[test]
    fn test_out_of_range_weights_do_not_panic() {
        let joints = [joint(Vec3::ZERO, Quat::IDENTITY)];
        let vertices = [vertex(5, 3)];
        let weights = [weight(3, 1.0, Vec3::ONE)];
        let mut output = SkinningOutput::default();
        compute_skinning(
            &SkinningInput {
                vertices: &vertices,
                weights: &weights,
                joints: &joints,
            },
            &SkinningContext::default(),
            &mut output,
        );
        assert_eq!(output.positions[0], Vec3::ZERO);
    }

    #[test]
    fn test_normals() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let mut normals = Vec::new();
        compute_normals(&positions, &[[0, 1, 2]], &mut normals);
        for n in &normals {
            assert!(n.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }
}
