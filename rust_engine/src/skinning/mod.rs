//! 顶点蒙皮计算

mod buffer;
mod skinning;

pub use buffer::DoubleBuffer;
pub use skinning::{compute_normals, compute_skinning, SkinningContext};

use glam::Vec3;

use crate::model::{Vertex, Weight};
use crate::skeleton::Joint;

/// 蒙皮输入数据
pub struct SkinningInput<'a> {
    pub vertices: &'a [Vertex],
    /// 网格的全部权重，顶点按区间引用
    pub weights: &'a [Weight],
    /// 关节（读取当前世界变换）
    pub joints: &'a [Joint],
}

/// 蒙皮输出数据
#[derive(Clone, Debug, Default)]
pub struct SkinningOutput {
    /// 变换后的顶点位置
    pub positions: Vec<Vec3>,
    /// 变换后的顶点法线
    pub normals: Vec<Vec3>,
}
