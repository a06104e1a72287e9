//! MD5 Engine - Rust 实现的 MD5 (Doom 3) 骨骼动画运行时
//!
//! 提供与引擎无关的骨骼动画核心：
//! - md5mesh / md5anim 文本格式加载
//! - 骨骼层级与世界变换计算
//! - 帧插值、循环模式与动画淡入淡出
//! - 顶点蒙皮计算（双缓冲）
//! - 观察者通知（依赖模型共享骨骼）

pub mod animation;
pub mod loader;
pub mod model;
pub mod observer;
pub mod skeleton;
pub mod skinning;

pub use animation::{
    AnimationClip, AnimationController, BaseFrame, Bounds, ControllerConfig, ControllerState,
    Frame, RepeatType,
};
pub use loader::{LoaderConfig, Md5Loader};
pub use model::{JointRef, Md5Model, Mesh, SceneNode, Vertex, Weight};
pub use observer::{ChannelObserver, Observable, Observer};
pub use skeleton::{Joint, JointTransform, SharedSkeleton, Skeleton};
pub use skinning::{DoubleBuffer, SkinningContext};

use thiserror::Error;

/// 错误类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// 文件读写失败
    Io,
    /// 版本不支持或数据格式错误，加载中止
    Format,
    /// 骨骼与动画的关节数量或层级不一致
    Topology,
    /// 未知的关节或动画名称、索引越界
    Lookup,
    /// 控制器状态不允许该操作
    State,
}

#[derive(Error, Debug)]
pub enum Md5Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported MD5 version: {version}")]
    InvalidVersion { version: i32 },

    #[error("malformed MD5 data (line {line}): {message}")]
    MalformedData { line: usize, message: String },

    #[error("incompatible skeleton: expected {expected} joints, found {found}")]
    IncompatibleSkeleton { expected: usize, found: usize },

    #[error("skeleton topology mismatch: {reason}")]
    SkeletonMismatch { reason: String },

    #[error("animation '{name}' does not fit the skeleton: {reason}")]
    InvalidAnimation { name: String, reason: String },

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown animation: {0}")]
    UnknownAnimation(String),

    #[error("unknown joint: {0}")]
    UnknownJoint(String),

    #[error("duplicate animation name: {0}")]
    DuplicateName(String),

    #[error("no animation registered on controller")]
    NoAnimation,
}

impl Md5Error {
    /// 构造不带行号的格式错误
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Md5Error::MalformedData {
            line: 0,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Md5Error::Io(_) => ErrorKind::Io,
            Md5Error::InvalidVersion { .. } | Md5Error::MalformedData { .. } => ErrorKind::Format,
            Md5Error::IncompatibleSkeleton { .. }
            | Md5Error::SkeletonMismatch { .. }
            | Md5Error::InvalidAnimation { .. } => ErrorKind::Topology,
            Md5Error::IndexOutOfRange { .. }
            | Md5Error::UnknownAnimation(_)
            | Md5Error::UnknownJoint(_)
            | Md5Error::DuplicateName(_) => ErrorKind::Lookup,
            Md5Error::NoAnimation => ErrorKind::State,
        }
    }
}

pub type Result<T> = std::result::Result<T, Md5Error>;
