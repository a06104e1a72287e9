//! 关节节点

use glam::Mat4;

use super::JointTransform;

/// 关节节点
#[derive(Clone, Debug)]
pub struct Joint {
    pub index: usize,
    pub name: String,
    /// 父关节索引，根关节为 -1
    pub parent_index: i32,

    // 绑定姿势（相对父关节）
    pub bind_local: JointTransform,
    // 绑定姿势（模型空间），权重偏移以此为参考
    pub bind_world: JointTransform,
    // 逆绑定矩阵（在 Skeleton::new 中计算）
    pub inverse_bind_matrix: Mat4,

    // 当前姿势
    pub local: JointTransform,
    pub world: JointTransform,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent_index: i32, bind_local: JointTransform) -> Self {
        Self {
            index: 0,
            name: name.into(),
            parent_index,
            bind_local,
            bind_world: bind_local,
            inverse_bind_matrix: Mat4::IDENTITY,
            local: bind_local,
            world: bind_local,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 父关节索引（根关节返回 None）
    pub fn parent(&self) -> Option<usize> {
        if self.parent_index < 0 {
            None
        } else {
            Some(self.parent_index as usize)
        }
    }

    /// 恢复绑定姿势（世界变换由 Skeleton 重新计算）
    pub fn reset_to_bind(&mut self) {
        self.local = self.bind_local;
    }

    /// 获取蒙皮矩阵 = 当前世界变换 * 逆绑定矩阵
    pub fn skinning_matrix(&self) -> Mat4 {
        self.world.to_matrix() * self.inverse_bind_matrix
    }
}
