//! 动画片段

use crate::{Md5Error, Result};

use super::{BaseFrame, Bounds, Frame, RepeatType};

/// 动画片段：按固定帧率采样的一组姿势帧
#[derive(Clone, Debug)]
pub struct AnimationClip {
    name: String,
    frame_rate: f32,
    base_frame: BaseFrame,
    frames: Vec<Frame>,
    bounds: Vec<Bounds>,
}

impl AnimationClip {
    /// 创建动画片段
    ///
    /// 至少需要一帧，帧率必须为正，每帧的关节数与基准帧一致，
    /// 包围盒要么为空要么与帧数一致。
    pub fn new(
        name: impl Into<String>,
        frame_rate: f32,
        base_frame: BaseFrame,
        frames: Vec<Frame>,
        bounds: Vec<Bounds>,
    ) -> Result<Self> {
        let name = name.into();
        if frames.is_empty() {
            return Err(Md5Error::malformed(format!("animation '{}' has no frames", name)));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(Md5Error::malformed(format!(
                "animation '{}' has invalid frame rate {}",
                name, frame_rate
            )));
        }
        let joint_count = base_frame.joint_count();
        if let Some((i, frame)) = frames.iter().enumerate().find(|(_, f)| f.len() != joint_count) {
            return Err(Md5Error::malformed(format!(
                "animation '{}' frame {} has {} joints, expected {}",
                name,
                i,
                frame.len(),
                joint_count
            )));
        }
        if !bounds.is_empty() && bounds.len() != frames.len() {
            return Err(Md5Error::malformed(format!(
                "animation '{}' has {} bounds for {} frames",
                name,
                bounds.len(),
                frames.len()
            )));
        }

        Ok(Self {
            name,
            frame_rate,
            base_frame,
            frames,
            bounds,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// 时长（秒）= 帧数 / 帧率
    pub fn duration(&self) -> f32 {
        self.frames.len() as f32 / self.frame_rate
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn base_frame(&self) -> &BaseFrame {
        &self.base_frame
    }

    pub fn parents(&self) -> &[i32] {
        &self.base_frame.parents
    }

    pub fn joint_count(&self) -> usize {
        self.base_frame.joint_count()
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// 采样任意时刻的姿势（帧索引按帧数取模，最后一帧与第一帧之间也会插值）
    pub fn sample(&self, time: f32) -> Frame {
        let (lower, upper, t) = self.frame_span(time, true);
        self.frames[lower].blend(&self.frames[upper], t)
    }

    /// 先按循环模式映射时间再采样
    ///
    /// Clamp 与 Cycle 不在最后一帧与第一帧之间插值，到达结尾时停在最后一帧。
    pub fn sample_with(&self, time: f32, repeat: RepeatType) -> Frame {
        let mapped = repeat.map_time(time, self.duration());
        let (lower, upper, t) = self.frame_span(mapped, repeat.wraps_frames());
        self.frames[lower].blend(&self.frames[upper], t)
    }

    /// 插值包围盒
    pub fn bounds_at(&self, time: f32, repeat: RepeatType) -> Option<Bounds> {
        if self.bounds.is_empty() {
            return None;
        }
        let mapped = repeat.map_time(time, self.duration());
        let (lower, upper, t) = self.frame_span(mapped, repeat.wraps_frames());
        Some(self.bounds[lower].lerp(&self.bounds[upper], t))
    }

    /// 计算前后帧索引与插值系数
    fn frame_span(&self, time: f32, wrap: bool) -> (usize, usize, f32) {
        let count = self.frames.len();
        if count == 1 || !time.is_finite() {
            return (0, 0, 0.0);
        }

        let frame_time = time * self.frame_rate;
        let floor = frame_time.floor();
        let t = frame_time - floor;

        if wrap {
            let lower = (floor as i64).rem_euclid(count as i64) as usize;
            (lower, (lower + 1) % count, t)
        } else {
            let last = count - 1;
            if floor < 0.0 {
                return (0, 0, 0.0);
            }
            let lower = (floor as usize).min(last);
            if lower == last {
                (last, last, 0.0)
            } else {
                (lower, lower + 1, t)
            }
        }
    }
}
