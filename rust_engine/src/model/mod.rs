//! MD5 模型运行时管理

mod loader;
mod mesh;
mod runtime;

pub use loader::{parse_md5mesh, MeshFile};
pub use mesh::Mesh;
pub use runtime::{JointRef, Md5Model, SceneNode};

use glam::{Vec2, Vec3};

/// 顶点：UV 与在网格权重数组中的区间
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub uv: Vec2,
    pub weight_start: usize,
    pub weight_count: usize,
}

/// 顶点骨骼权重
///
/// `offset` 位于关节的绑定空间；同一顶点所有权重的 bias 之和应为 1。
#[derive(Clone, Debug, PartialEq)]
pub struct Weight {
    pub joint_index: usize,
    pub bias: f32,
    pub offset: Vec3,
}
