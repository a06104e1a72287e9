//! 循环模式

/// 将无界的播放时间映射到动画时长上的策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RepeatType {
    /// 播放到结尾后停在最后一帧
    Clamp,
    /// 往返播放（三角波）
    Cycle,
    /// 从头循环
    #[default]
    Wrap,
}

impl RepeatType {
    /// 把原始时间映射到 `[0, duration]`
    pub fn map_time(self, time: f32, duration: f32) -> f32 {
        if duration <= 0.0 || !time.is_finite() {
            return 0.0;
        }
        match self {
            RepeatType::Clamp => time.clamp(0.0, duration),
            RepeatType::Wrap => time.rem_euclid(duration),
            RepeatType::Cycle => {
                let period = duration * 2.0;
                let t = time.rem_euclid(period);
                if t > duration {
                    period - t
                } else {
                    t
                }
            }
        }
    }

    /// 映射后的时间是否在两端之间环绕（只有 Wrap 会在最后一帧与第一帧之间插值）
    pub(crate) fn wraps_frames(self) -> bool {
        matches!(self, RepeatType::Wrap)
    }
}
