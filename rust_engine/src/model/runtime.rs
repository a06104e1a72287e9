//! MD5 运行时模型

use std::sync::Arc;

use parking_lot::RwLock;

use crate::animation::{AnimationClip, AnimationController, Bounds, ControllerConfig};
use crate::observer::Observer;
use crate::skeleton::{JointTransform, SharedSkeleton, Skeleton};
use crate::{Md5Error, Result};

use super::Mesh;

/// 外部场景图节点，挂接到关节后随关节移动
pub trait SceneNode: Send {
    /// `world` 为关节的模型空间变换
    fn set_joint_transform(&mut self, world: &JointTransform);
}

/// 按名称或索引引用关节
#[derive(Clone, Copy, Debug)]
pub enum JointRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for JointRef<'a> {
    fn from(name: &'a str) -> Self {
        JointRef::Name(name)
    }
}

impl From<usize> for JointRef<'_> {
    fn from(index: usize) -> Self {
        JointRef::Index(index)
    }
}

struct Attachment {
    joint_index: usize,
    node: Box<dyn SceneNode>,
}

/// 依赖模型的重新蒙皮：主控制器刷新骨骼后触发
struct DependentRefresh {
    skeleton: SharedSkeleton,
    meshes: Arc<Vec<Mesh>>,
}

impl Observer for DependentRefresh {
    fn on_update(&self, _sequence: u64) {
        let skeleton = self.skeleton.read();
        for mesh in self.meshes.iter() {
            mesh.update_mesh(&skeleton);
            mesh.swap_buffer();
        }
    }
}

/// MD5 运行时模型
///
/// 拥有骨骼、网格与动画控制器。依赖模型（例如头部、武器）与主模型共享同一骨骼，
/// 由主模型的控制器驱动。
pub struct Md5Model {
    pub name: String,
    skeleton: SharedSkeleton,
    meshes: Arc<Vec<Mesh>>,
    controller: AnimationController,
    attachments: Vec<Attachment>,
    dependents: Vec<Md5Model>,
}

impl Md5Model {
    /// 创建模型，网格按绑定姿势完成首次蒙皮
    pub fn new(name: impl Into<String>, skeleton: Skeleton, meshes: Vec<Mesh>) -> Self {
        Self::with_config(name, skeleton, meshes, ControllerConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        skeleton: Skeleton,
        meshes: Vec<Mesh>,
        config: ControllerConfig,
    ) -> Self {
        let skeleton: SharedSkeleton = Arc::new(RwLock::new(skeleton));
        let controller = AnimationController::with_config(Arc::clone(&skeleton), config);
        Self::from_parts(name.into(), skeleton, Arc::new(meshes), controller)
    }

    fn from_parts(
        name: String,
        skeleton: SharedSkeleton,
        meshes: Arc<Vec<Mesh>>,
        controller: AnimationController,
    ) -> Self {
        let model = Self {
            name,
            skeleton,
            meshes,
            controller,
            attachments: Vec::new(),
            dependents: Vec::new(),
        };
        model.refresh_meshes();
        model
    }

    pub fn skeleton(&self) -> &SharedSkeleton {
        &self.skeleton
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn controller(&self) -> &AnimationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AnimationController {
        &mut self.controller
    }

    /// 注册动画到控制器
    pub fn add_animation(&mut self, clip: impl Into<Arc<AnimationClip>>) -> Result<()> {
        self.controller.add_animation(clip)
    }

    /// 推进动画并刷新网格与挂接节点
    ///
    /// 依赖模型的网格通过观察者通知刷新，这里只同步它们的挂接节点。
    pub fn update(&mut self, delta_time: f32) -> bool {
        if !self.controller.update(delta_time) {
            return false;
        }
        self.refresh_meshes();
        self.refresh_attachments();
        for dependent in &mut self.dependents {
            dependent.refresh_attachments();
        }
        true
    }

    /// 把场景节点挂接到关节，立即同步一次变换
    pub fn attach_child<'a>(
        &mut self,
        mut node: Box<dyn SceneNode>,
        joint: impl Into<JointRef<'a>>,
    ) -> Result<()> {
        let joint_index = self.resolve_joint(joint.into())?;
        let world = self.skeleton.read().world_transform(joint_index)?;
        node.set_joint_transform(&world);
        self.attachments.push(Attachment { joint_index, node });
        Ok(())
    }

    /// 移除所有挂接节点，按挂接顺序返回
    pub fn detach_children(&mut self) -> Vec<Box<dyn SceneNode>> {
        self.attachments.drain(..).map(|a| a.node).collect()
    }

    pub fn child_count(&self) -> usize {
        self.attachments.len()
    }

    /// 挂接依赖模型：改为共享本模型的骨骼，由本模型的控制器驱动
    ///
    /// 层级不一致时失败，`dependent` 原样丢弃。
    pub fn attach_dependent(&mut self, dependent: Md5Model) -> Result<()> {
        let parents = dependent.skeleton.read().parents();
        if let Some(reason) = self.skeleton.read().topology_mismatch(&parents) {
            return Err(Md5Error::SkeletonMismatch { reason });
        }

        let Md5Model {
            name,
            meshes,
            controller,
            attachments,
            dependents,
            ..
        } = dependent;

        let skeleton = Arc::clone(&self.skeleton);
        let mut shared = Md5Model::from_parts(
            name,
            Arc::clone(&skeleton),
            meshes,
            controller.clone_inactive(Arc::clone(&skeleton)),
        );
        shared.attachments = attachments;
        shared.refresh_attachments();

        self.controller.register(Arc::new(DependentRefresh {
            skeleton,
            meshes: Arc::clone(&shared.meshes),
        }));
        log::debug!("模型 '{}' 挂接依赖模型 '{}'", self.name, shared.name);
        self.dependents.push(shared);

        for nested in dependents {
            self.attach_dependent(nested)?;
        }
        Ok(())
    }

    pub fn dependents(&self) -> &[Md5Model] {
        &self.dependents
    }

    /// 创建独立实例：深拷贝骨骼与网格，共享只读动画数据
    ///
    /// 新实例的控制器处于未播放状态，观察者与挂接节点不复制；
    /// 依赖模型按原有关系重新挂接到新实例的骨骼上。
    pub fn clone_instance(&self) -> Self {
        let skeleton: SharedSkeleton = Arc::new(RwLock::new(self.skeleton.read().clone()));
        let controller = self.controller.clone_inactive(Arc::clone(&skeleton));
        let mut instance = Self::from_parts(
            self.name.clone(),
            skeleton,
            Arc::new(self.meshes.as_ref().clone()),
            controller,
        );

        for dependent in &self.dependents {
            let copy = Self::from_parts(
                dependent.name.clone(),
                Arc::clone(&instance.skeleton),
                Arc::new(dependent.meshes.as_ref().clone()),
                dependent
                    .controller
                    .clone_inactive(Arc::clone(&instance.skeleton)),
            );
            instance.controller.register(Arc::new(DependentRefresh {
                skeleton: Arc::clone(&instance.skeleton),
                meshes: Arc::clone(&copy.meshes),
            }));
            instance.dependents.push(copy);
        }
        instance
    }

    /// 当前动画包围盒
    pub fn current_bounds(&self) -> Option<Bounds> {
        self.controller.current_bounds()
    }

    /// 关节当前模型空间变换
    pub fn joint_transform<'a>(&self, joint: impl Into<JointRef<'a>>) -> Result<JointTransform> {
        let index = self.resolve_joint(joint.into())?;
        self.skeleton.read().world_transform(index)
    }

    fn resolve_joint(&self, joint: JointRef<'_>) -> Result<usize> {
        let skeleton = self.skeleton.read();
        match joint {
            JointRef::Name(name) => skeleton
                .find_joint(name)
                .ok_or_else(|| Md5Error::UnknownJoint(name.to_string())),
            JointRef::Index(index) if index < skeleton.joint_count() => Ok(index),
            JointRef::Index(index) => Err(Md5Error::IndexOutOfRange {
                index,
                len: skeleton.joint_count(),
            }),
        }
    }

    fn refresh_meshes(&self) {
        let skeleton = self.skeleton.read();
        for mesh in self.meshes.iter() {
            mesh.update_mesh(&skeleton);
            mesh.swap_buffer();
        }
    }

    fn refresh_attachments(&mut self) {
        if self.attachments.is_empty() {
            return;
        }
        let skeleton = self.skeleton.read();
        for attachment in &mut self.attachments {
            if let Some(joint) = skeleton.joints().get(attachment.joint_index) {
                attachment.node.set_joint_transform(&joint.world);
            }
        }
    }
}

impl std::fmt::Debug for Md5Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md5Model")
            .field("name", &self.name)
            .field("meshes", &self.meshes.len())
            .field("attachments", &self.attachments.len())
            .field("dependents", &self.dependents.len())
            .finish()
    }
}
