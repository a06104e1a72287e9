//! 姿势帧

use glam::Vec3;

use crate::skeleton::JointTransform;
use crate::{Md5Error, Result};

/// 单帧姿势：每个关节一个相对父关节的变换
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Frame {
    transforms: Vec<JointTransform>,
}

impl Frame {
    pub fn new(transforms: Vec<JointTransform>) -> Self {
        Self { transforms }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn transforms(&self) -> &[JointTransform] {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut [JointTransform] {
        &mut self.transforms
    }

    pub fn get(&self, joint: usize) -> Option<&JointTransform> {
        self.transforms.get(joint)
    }

    /// 逐关节混合两个姿势
    ///
    /// `t <= 0` 精确返回 `self`，`t >= 1` 精确返回 `other`。
    pub fn blend(&self, other: &Frame, t: f32) -> Frame {
        if t <= 0.0 {
            return self.clone();
        }
        if t >= 1.0 {
            return other.clone();
        }
        Frame {
            transforms: self
                .transforms
                .iter()
                .zip(&other.transforms)
                .map(|(a, b)| a.interpolate(b, t))
                .collect(),
        }
    }
}

/// 基准帧：绑定姿势 + 独立的父索引数组
///
/// 解析动画时骨骼尚不存在，层级信息随基准帧一起保存。
#[derive(Clone, Debug, PartialEq)]
pub struct BaseFrame {
    pub names: Vec<String>,
    pub parents: Vec<i32>,
    pub pose: Frame,
}

impl BaseFrame {
    pub fn new(names: Vec<String>, parents: Vec<i32>, pose: Frame) -> Result<Self> {
        if names.len() != parents.len() || pose.len() != parents.len() {
            return Err(Md5Error::malformed(format!(
                "base frame has {} names, {} parents and {} transforms",
                names.len(),
                parents.len(),
                pose.len()
            )));
        }
        Ok(Self {
            names,
            parents,
            pose,
        })
    }

    pub fn joint_count(&self) -> usize {
        self.parents.len()
    }
}

/// 轴对齐包围盒
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn lerp(&self, other: &Bounds, t: f32) -> Bounds {
        Bounds {
            min: self.min.lerp(other.min, t),
            max: self.max.lerp(other.max, t),
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}
