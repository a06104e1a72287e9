//! 骨骼

use std::collections::HashMap;

use glam::Mat4;

use crate::animation::Frame;
use crate::{Md5Error, Result};

use super::{Joint, JointTransform};

/// 骨骼：按拓扑顺序排列的关节集合
///
/// 构造后关节数量与层级不再变化，每个非根关节的父索引都小于自身索引，
/// 因此世界变换可以按索引升序一次正向遍历完成，无需递归。
#[derive(Clone, Debug)]
pub struct Skeleton {
    joints: Vec<Joint>,
    name_to_index: HashMap<String, usize>,
    skinning_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// 从绑定姿势（相对父关节）构建骨骼，并计算逆绑定矩阵
    pub fn new(mut joints: Vec<Joint>) -> Result<Self> {
        if joints.is_empty() {
            return Err(Md5Error::malformed("skeleton has no joints"));
        }

        let mut name_to_index = HashMap::with_capacity(joints.len());
        for (i, joint) in joints.iter_mut().enumerate() {
            validate_parent(i, joint.parent_index)?;
            joint.index = i;
            // 重名关节按第一个出现的为准
            name_to_index.entry(joint.name.clone()).or_insert(i);
        }

        let mut skeleton = Self {
            joints,
            name_to_index,
            skinning_matrices: Vec::new(),
        };

        skeleton.update_world_transforms();
        for joint in &mut skeleton.joints {
            joint.bind_world = joint.world;
            joint.inverse_bind_matrix = joint.bind_world.to_matrix().inverse();
        }
        // 初始状态下：skinning_matrix = world * inverse_bind = I
        skeleton.update_skinning_matrices();

        Ok(skeleton)
    }

    /// 获取关节数量
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// 获取关节
    pub fn joint(&self, index: usize) -> Result<&Joint> {
        self.joints.get(index).ok_or(Md5Error::IndexOutOfRange {
            index,
            len: self.joints.len(),
        })
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// 通过名称查找关节
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 父索引数组
    pub fn parents(&self) -> Vec<i32> {
        self.joints.iter().map(|j| j.parent_index).collect()
    }

    /// 检查层级是否与给定父索引数组一致，不一致时返回原因
    pub fn topology_mismatch(&self, parents: &[i32]) -> Option<String> {
        if parents.len() != self.joints.len() {
            return Some(format!(
                "expected {} joints, found {}",
                self.joints.len(),
                parents.len()
            ));
        }
        self.joints
            .iter()
            .zip(parents)
            .find(|(joint, &parent)| joint.parent_index != parent)
            .map(|(joint, &parent)| {
                format!(
                    "joint {} ('{}') has parent {}, animation expects {}",
                    joint.index, joint.name, joint.parent_index, parent
                )
            })
    }

    /// 应用姿势：写入本地变换后按索引升序重新计算世界变换
    pub fn apply_pose(&mut self, frame: &Frame) -> Result<()> {
        if frame.len() != self.joints.len() {
            return Err(Md5Error::IncompatibleSkeleton {
                expected: self.joints.len(),
                found: frame.len(),
            });
        }

        for (joint, transform) in self.joints.iter_mut().zip(frame.transforms()) {
            joint.local = *transform;
        }
        self.update_world_transforms();
        self.update_skinning_matrices();
        Ok(())
    }

    /// 恢复绑定姿势
    pub fn reset_to_bind_pose(&mut self) {
        for joint in &mut self.joints {
            joint.reset_to_bind();
        }
        self.update_world_transforms();
        self.update_skinning_matrices();
    }

    /// 绑定姿势（相对父关节）
    pub fn bind_pose(&self) -> Frame {
        Frame::new(self.joints.iter().map(|j| j.bind_local).collect())
    }

    /// 当前姿势（相对父关节）
    pub fn current_pose(&self) -> Frame {
        Frame::new(self.joints.iter().map(|j| j.local).collect())
    }

    /// 获取世界变换
    pub fn world_transform(&self, index: usize) -> Result<JointTransform> {
        self.joint(index).map(|j| j.world)
    }

    /// 获取蒙皮矩阵数组
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    fn update_world_transforms(&mut self) {
        for i in 0..self.joints.len() {
            let world = match self.joints[i].parent() {
                // 父索引小于自身索引，父关节已在本轮更新
                Some(parent) => self.joints[parent].world.compose(&self.joints[i].local),
                None => self.joints[i].local,
            };
            self.joints[i].world = world;
        }
    }

    fn update_skinning_matrices(&mut self) {
        self.skinning_matrices.clear();
        self.skinning_matrices
            .extend(self.joints.iter().map(Joint::skinning_matrix));
    }
}

fn validate_parent(index: usize, parent: i32) -> Result<()> {
    if index == 0 {
        if parent != -1 {
            return Err(Md5Error::malformed(format!(
                "joint 0 must be the root, found parent {}",
                parent
            )));
        }
        return Ok(());
    }
    if parent < 0 {
        return Err(Md5Error::malformed(format!(
            "joint {} is a second root; only joint 0 may be a root",
            index
        )));
    }
    if parent as usize >= index {
        return Err(Md5Error::malformed(format!(
            "joint {} has parent index {} which is not smaller than its own",
            index, parent
        )));
    }
    Ok(())
}
