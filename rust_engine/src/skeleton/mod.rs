//! 骨骼系统

mod joint;
mod skeleton;

pub use joint::Joint;
pub use skeleton::Skeleton;

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;

/// 多个模型共享的骨骼（依赖模型按引用共享，而非复制）
pub type SharedSkeleton = Arc<RwLock<Skeleton>>;

/// 关节变换数据（MD5 没有缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointTransform {
    pub translation: Vec3,
    pub orientation: Quat,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, orientation: Quat) -> Self {
        Self {
            translation,
            orientation,
        }
    }

    /// 组合变换：`self ∘ child`，即先应用 child 再应用 self
    pub fn compose(&self, child: &JointTransform) -> JointTransform {
        JointTransform {
            translation: self.translation + self.orientation * child.translation,
            orientation: (self.orientation * child.orientation).normalize(),
        }
    }

    pub fn inverse(&self) -> JointTransform {
        let inv = self.orientation.inverse();
        JointTransform {
            translation: inv * -self.translation,
            orientation: inv,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.orientation * point
    }

    /// 平移线性插值，旋转走最短弧球面插值
    ///
    /// `t <= 0` 精确返回 `self`，`t >= 1` 精确返回 `other`。
    pub fn interpolate(&self, other: &JointTransform, t: f32) -> JointTransform {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }
        JointTransform {
            translation: self.translation.lerp(other.translation, t),
            orientation: self.orientation.slerp(other.orientation, t),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.translation)
    }
}
