//! 动画系统
//!
//! 提供 md5anim 解析、帧采样、循环模式与动画控制器。

mod clip;
mod controller;
mod frame;
mod md5anim_loader;
mod repeat;

pub use clip::AnimationClip;
pub use controller::{AnimationController, ControllerConfig, ControllerState};
pub use frame::{BaseFrame, Bounds, Frame};
pub use md5anim_loader::parse_md5anim;
pub use repeat::RepeatType;
