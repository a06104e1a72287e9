//! 网格与蒙皮变形

use std::sync::Arc;

use crate::skeleton::Skeleton;
use crate::skinning::{compute_normals, compute_skinning, DoubleBuffer, SkinningContext, SkinningInput, SkinningOutput};

use super::{Vertex, Weight};

/// 可蒙皮网格
///
/// 顶点位置每次更新都从骨骼当前的世界变换重新计算，写入后台缓冲，
/// 完整计算结束后再与前台缓冲交换，渲染端始终读取完整的一帧。
#[derive(Debug)]
pub struct Mesh {
    pub shader: String,
    vertices: Vec<Vertex>,
    triangles: Vec<[u32; 3]>,
    weights: Vec<Weight>,
    buffer: DoubleBuffer<SkinningOutput>,
    compute_normals: bool,
    context: SkinningContext,
}

impl Mesh {
    pub fn new(
        shader: impl Into<String>,
        vertices: Vec<Vertex>,
        triangles: Vec<[u32; 3]>,
        weights: Vec<Weight>,
    ) -> Self {
        Self {
            shader: shader.into(),
            vertices,
            triangles,
            weights,
            buffer: DoubleBuffer::default(),
            compute_normals: true,
            context: SkinningContext::default(),
        }
    }

    /// 是否在蒙皮后重新计算法线
    pub fn with_normals(mut self, enabled: bool) -> Self {
        self.compute_normals = enabled;
        self
    }

    pub fn with_skinning_context(mut self, context: SkinningContext) -> Self {
        self.context = context;
        self
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// 按骨骼当前姿势重新蒙皮，结果写入后台缓冲
    ///
    /// 必须在骨骼世界变换刷新之后调用；调用 `swap_buffer` 后渲染端才能读到。
    pub fn update_mesh(&self, skeleton: &Skeleton) {
        let input = SkinningInput {
            vertices: &self.vertices,
            weights: &self.weights,
            joints: skeleton.joints(),
        };
        self.buffer.write_back(|back| {
            compute_skinning(&input, &self.context, back);
            if self.compute_normals {
                compute_normals(&back.positions, &self.triangles, &mut back.normals);
            } else {
                back.normals.clear();
            }
        });
    }

    /// 发布最近一次蒙皮结果
    ///
    /// 自上次交换以来没有新的 `update_mesh` 时不做任何事并返回 false。
    pub fn swap_buffer(&self) -> bool {
        self.buffer.swap_buffer()
    }

    /// 最近一次完整蒙皮结果
    pub fn skinned(&self) -> Arc<SkinningOutput> {
        self.buffer.front()
    }

    /// 已完成的蒙皮次数
    pub fn generation(&self) -> u64 {
        self.buffer.generation()
    }
}

impl Clone for Mesh {
    fn clone(&self) -> Self {
        Self {
            shader: self.shader.clone(),
            vertices: self.vertices.clone(),
            triangles: self.triangles.clone(),
            weights: self.weights.clone(),
            buffer: self.buffer.duplicate(),
            compute_normals: self.compute_normals,
            context: self.context.clone(),
        }
    }
}
