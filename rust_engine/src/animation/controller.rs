//! 动画控制器 - 驱动骨骼播放与淡入淡出
//!
//! 同一时刻最多两个动画参与：单独播放，或从当前动画过渡到目标动画。
//! 所有可能失败的检查都在注册 / 切换时完成，`update` 每帧调用且不会失败。

use std::collections::HashMap;
use std::sync::Arc;

use crate::observer::{Observable, Observer};
use crate::skeleton::SharedSkeleton;
use crate::{Md5Error, Result};

use super::{AnimationClip, Bounds, Frame, RepeatType};

/// 控制器状态
#[derive(Clone, Debug)]
pub enum ControllerState {
    /// 未播放
    Inactive,
    /// 单独播放
    SinglePlay { clip: Arc<AnimationClip> },
    /// 淡入淡出中
    Fading {
        from: Arc<AnimationClip>,
        to: Arc<AnimationClip>,
        elapsed: f32,
        duration: f32,
    },
}

/// 控制器配置
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// 播放速度倍率
    pub speed: f32,
    /// 循环模式
    pub repeat_type: RepeatType,
    /// 是否推进时间
    pub active: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            repeat_type: RepeatType::Wrap,
            active: true,
        }
    }
}

/// 动画控制器
pub struct AnimationController {
    skeleton: SharedSkeleton,
    /// 按注册顺序保存的动画
    animations: Vec<Arc<AnimationClip>>,
    name_to_index: HashMap<String, usize>,
    state: ControllerState,
    config: ControllerConfig,
    local_time: f32,
    /// Clamp 模式下已停在最后一帧
    frozen: bool,
    observable: Observable,
}

impl AnimationController {
    pub fn new(skeleton: SharedSkeleton) -> Self {
        Self::with_config(skeleton, ControllerConfig::default())
    }

    pub fn with_config(skeleton: SharedSkeleton, mut config: ControllerConfig) -> Self {
        config.speed = sanitize_speed(config.speed);
        Self {
            skeleton,
            animations: Vec::new(),
            name_to_index: HashMap::new(),
            state: ControllerState::Inactive,
            config,
            local_time: 0.0,
            frozen: false,
            observable: Observable::new(),
        }
    }

    /// 绑定的骨骼
    pub fn skeleton(&self) -> &SharedSkeleton {
        &self.skeleton
    }

    /// 注册动画
    ///
    /// 名称重复或层级与骨骼不一致时失败；当前没有播放中的动画时立即开始播放。
    pub fn add_animation(&mut self, clip: impl Into<Arc<AnimationClip>>) -> Result<()> {
        let clip = clip.into();
        if self.name_to_index.contains_key(clip.name()) {
            return Err(Md5Error::DuplicateName(clip.name().to_string()));
        }
        self.check_topology(&clip)?;

        log::debug!(
            "注册动画 '{}': {} 帧, {} fps",
            clip.name(),
            clip.frame_count(),
            clip.frame_rate()
        );
        self.name_to_index
            .insert(clip.name().to_string(), self.animations.len());
        self.animations.push(Arc::clone(&clip));

        if matches!(self.state, ControllerState::Inactive) {
            self.start(clip);
        }
        Ok(())
    }

    /// 按名称获取动画
    pub fn animation(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.name_to_index.get(name).map(|&i| &self.animations[i])
    }

    /// 所有动画（按注册顺序）
    pub fn animations(&self) -> &[Arc<AnimationClip>] {
        &self.animations
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.iter().map(|clip| clip.name())
    }

    /// 立即切换到指定动画并从头播放
    pub fn play(&mut self, name: &str) -> Result<()> {
        let clip = self.lookup(name)?;
        self.start(clip);
        Ok(())
    }

    /// 过渡到已注册的动画
    ///
    /// `scale_with_speed` 为 true 时 `duration` 按实际经过的秒数计算，
    /// 不受播放速度影响。速度为 0 时按播放时间计算，过渡暂停直到速度恢复。
    pub fn fade_to(&mut self, name: &str, duration: f32, scale_with_speed: bool) -> Result<()> {
        if self.animations.is_empty() {
            return Err(Md5Error::NoAnimation);
        }
        let clip = self.lookup(name)?;
        self.begin_fade(clip, duration, scale_with_speed);
        Ok(())
    }

    /// 过渡到给定动画，未注册的动画会先注册
    pub fn fade_to_clip(
        &mut self,
        clip: impl Into<Arc<AnimationClip>>,
        duration: f32,
        scale_with_speed: bool,
    ) -> Result<()> {
        if self.animations.is_empty() {
            return Err(Md5Error::NoAnimation);
        }
        let clip = clip.into();
        self.check_topology(&clip)?;

        let registered = self
            .animation(clip.name())
            .map(|existing| Arc::ptr_eq(existing, &clip));
        match registered {
            Some(true) => {}
            Some(false) => return Err(Md5Error::DuplicateName(clip.name().to_string())),
            None => {
                self.name_to_index
                    .insert(clip.name().to_string(), self.animations.len());
                self.animations.push(Arc::clone(&clip));
            }
        }
        self.begin_fade(clip, duration, scale_with_speed);
        Ok(())
    }

    /// 停止播放，回到未播放状态（已注册的动画保留）
    pub fn stop(&mut self) {
        self.state = ControllerState::Inactive;
        self.local_time = 0.0;
        self.frozen = false;
    }

    /// 是否推进时间；停用时保留当前状态
    pub fn set_active(&mut self, active: bool) {
        self.config.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    /// 设置播放速度（负值按 0 处理）
    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = sanitize_speed(speed);
    }

    pub fn speed(&self) -> f32 {
        self.config.speed
    }

    pub fn set_repeat_type(&mut self, repeat_type: RepeatType) {
        self.config.repeat_type = repeat_type;
        self.frozen = false;
    }

    pub fn repeat_type(&self) -> RepeatType {
        self.config.repeat_type
    }

    pub fn local_time(&self) -> f32 {
        self.local_time
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: f32) {
        if time.is_finite() {
            self.local_time = time.max(0.0);
            self.frozen = false;
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// 当前驱动姿势的动画（过渡中返回目标动画）
    pub fn active_animation(&self) -> Option<&Arc<AnimationClip>> {
        match &self.state {
            ControllerState::Inactive => None,
            ControllerState::SinglePlay { clip } => Some(clip),
            ControllerState::Fading { to, .. } => Some(to),
        }
    }

    pub fn is_fading(&self) -> bool {
        matches!(self.state, ControllerState::Fading { .. })
    }

    /// 过渡进度 `[0, 1]`，未在过渡时返回 None
    pub fn fade_progress(&self) -> Option<f32> {
        match &self.state {
            ControllerState::Fading {
                elapsed, duration, ..
            } => Some(fade_blend(*elapsed, *duration)),
            _ => None,
        }
    }

    /// 注册观察者，每次骨骼刷新后收到通知
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.observable.register(observer);
    }

    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    /// 按当前状态计算姿势（不修改任何状态）
    pub fn current_pose(&self) -> Option<Frame> {
        let repeat = self.config.repeat_type;
        match &self.state {
            ControllerState::Inactive => None,
            ControllerState::SinglePlay { clip } => Some(clip.sample_with(self.local_time, repeat)),
            ControllerState::Fading {
                from,
                to,
                elapsed,
                duration,
            } => {
                let blend = fade_blend(*elapsed, *duration);
                let from_pose = from.sample_with(self.local_time, repeat);
                let to_pose = to.sample_with(self.local_time, repeat);
                Some(from_pose.blend(&to_pose, blend))
            }
        }
    }

    /// 当前包围盒（取驱动姿势的动画）
    pub fn current_bounds(&self) -> Option<Bounds> {
        self.active_animation()
            .and_then(|clip| clip.bounds_at(self.local_time, self.config.repeat_type))
    }

    /// 推进时间并刷新骨骼，返回本次是否写入了姿势
    pub fn update(&mut self, delta_time: f32) -> bool {
        if !self.config.active || matches!(self.state, ControllerState::Inactive) {
            return false;
        }

        let dt = delta_time * self.config.speed;
        if !dt.is_finite() {
            return false;
        }
        self.local_time += dt;

        match &mut self.state {
            ControllerState::Inactive => return false,
            ControllerState::SinglePlay { clip } => {
                if self.config.repeat_type == RepeatType::Clamp
                    && self.local_time >= clip.duration()
                {
                    // 已停在最后一帧，骨骼无需再变化
                    if self.frozen {
                        return false;
                    }
                    self.frozen = true;
                }
            }
            ControllerState::Fading { elapsed, .. } => {
                *elapsed += dt;
            }
        }

        let Some(pose) = self.current_pose() else {
            return false;
        };
        self.finish_fade_if_complete();
        self.apply(&pose);
        true
    }

    /// 克隆一个绑定到另一骨骼的控制器：动画与配置相同，状态为未播放，观察者列表为空
    pub fn clone_inactive(&self, skeleton: SharedSkeleton) -> Self {
        Self {
            skeleton,
            animations: self.animations.clone(),
            name_to_index: self.name_to_index.clone(),
            state: ControllerState::Inactive,
            config: self.config.clone(),
            local_time: 0.0,
            frozen: false,
            observable: Observable::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Arc<AnimationClip>> {
        self.animation(name)
            .cloned()
            .ok_or_else(|| Md5Error::UnknownAnimation(name.to_string()))
    }

    fn check_topology(&self, clip: &AnimationClip) -> Result<()> {
        match self.skeleton.read().topology_mismatch(clip.parents()) {
            Some(reason) => Err(Md5Error::InvalidAnimation {
                name: clip.name().to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn start(&mut self, clip: Arc<AnimationClip>) {
        log::debug!("播放动画 '{}'", clip.name());
        self.state = ControllerState::SinglePlay { clip };
        self.local_time = 0.0;
        self.frozen = false;
    }

    fn begin_fade(&mut self, target: Arc<AnimationClip>, duration: f32, scale_with_speed: bool) {
        // elapsed 以播放时间累计，换算成同一时间域；
        // 速度为 0 时不换算，过渡随播放一起暂停，恢复速度后继续
        let duration = if scale_with_speed && self.config.speed > 0.0 {
            duration * self.config.speed
        } else {
            duration
        };

        let current = match &self.state {
            ControllerState::Inactive => None,
            ControllerState::SinglePlay { clip } => Some(Arc::clone(clip)),
            ControllerState::Fading { to, .. } => Some(Arc::clone(to)),
        };

        match current {
            None => self.start(target),
            Some(from) if duration.is_nan() || duration <= 0.0 => {
                log::debug!("切换动画 '{}' -> '{}'", from.name(), target.name());
                self.state = ControllerState::SinglePlay { clip: target };
                self.frozen = false;
            }
            Some(from) => {
                log::debug!(
                    "淡入淡出 '{}' -> '{}', 时长 {:.3}s",
                    from.name(),
                    target.name(),
                    duration
                );
                self.state = ControllerState::Fading {
                    from,
                    to: target,
                    elapsed: 0.0,
                    duration,
                };
                self.frozen = false;
            }
        }
    }

    /// 过渡完成后只保留目标动画，local_time 不变以便目标动画无缝衔接
    fn finish_fade_if_complete(&mut self) {
        let finished = match &self.state {
            ControllerState::Fading {
                to,
                elapsed,
                duration,
                ..
            } if fade_blend(*elapsed, *duration) >= 1.0 => Some(Arc::clone(to)),
            _ => None,
        };
        if let Some(clip) = finished {
            log::debug!("过渡完成，当前动画 '{}'", clip.name());
            self.state = ControllerState::SinglePlay { clip };
        }
    }

    fn apply(&self, pose: &Frame) {
        {
            let mut skeleton = self.skeleton.write();
            // 注册时已校验层级，这里不应失败
            if let Err(e) = skeleton.apply_pose(pose) {
                log::error!("应用姿势失败: {}", e);
                return;
            }
        }
        self.observable.notify_update();
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        self.observable.clear();
    }
}

fn fade_blend(elapsed: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        (elapsed / duration).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn sanitize_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.max(0.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::BaseFrame;
    use crate::skeleton::{Joint, JointTransform, Skeleton};
    use glam::{Quat, Vec3};
    use parking_lot::{Mutex, RwLock};
    use std::f32::consts::FRAC_PI_2;

    fn skeleton() -> SharedSkeleton {
        Arc::new(RwLock::new(
            Skeleton::new(vec![
                Joint::new("root", -1, JointTransform::IDENTITY),
                Joint::new(
                    "child",
                    0,
                    JointTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY),
                ),
            ])
            .unwrap(),
        ))
    }

    fn base() -> BaseFrame {
        let skeleton = skeleton();
        let skeleton = skeleton.read();
        BaseFrame::new(
            vec!["root".into(), "child".into()],
            skeleton.parents(),
            skeleton.bind_pose(),
        )
        .unwrap()
    }

    /// 子关节从绑定姿势旋转到 `angle`
    fn rotate_clip(name: &str, angle: f32) -> AnimationClip {
        let base = base();
        let mut end = base.pose.clone();
        end.transforms_mut()[1].orientation = Quat::from_rotation_z(angle);
        AnimationClip::new(name, 1.0, base.clone(), vec![base.pose.clone(), end], Vec::new()).unwrap()
    }

    /// 根关节平移固定不变
    fn hold_clip(name: &str, x: f32) -> AnimationClip {
        let base = base();
        let mut pose = base.pose.clone();
        pose.transforms_mut()[0].translation = Vec3::new(x, 0.0, 0.0);
        AnimationClip::new(name, 1.0, base, vec![pose.clone(), pose], Vec::new()).unwrap()
    }

    fn root_x(controller: &AnimationController) -> f32 {
        controller.skeleton().read().joint(0).unwrap().local.translation.x
    }

    #[test]
    fn test_first_animation_starts_playing() {
        let mut controller = AnimationController::new(skeleton());
        assert!(matches!(controller.state(), ControllerState::Inactive));
        assert!(!controller.update(0.1));

        controller.add_animation(rotate_clip("A", FRAC_PI_2)).unwrap();
        controller.add_animation(hold_clip("B", 1.0)).unwrap();
        assert_eq!(controller.active_animation().unwrap().name(), "A");
        assert_eq!(controller.animation_names().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_name() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        assert!(matches!(
            controller.add_animation(hold_clip("A", 1.0)),
            Err(Md5Error::DuplicateName(name)) if name == "A"
        ));
    }

    #[test]
    fn test_rejects_mismatched_clip() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();

        let wide = BaseFrame::new(
            vec!["root".into(), "a".into(), "b".into()],
            vec![-1, 0, 0],
            Frame::new(vec![JointTransform::IDENTITY; 3]),
        )
        .unwrap();
        let clip = AnimationClip::new("wide", 24.0, wide.clone(), vec![wide.pose.clone()], Vec::new())
            .unwrap();

        assert!(matches!(
            controller.add_animation(clip.clone()),
            Err(Md5Error::InvalidAnimation { .. })
        ));
        assert!(matches!(
            controller.fade_to_clip(clip, 1.0, false),
            Err(Md5Error::InvalidAnimation { .. })
        ));
    }

    #[test]
    fn test_fade_errors() {
        let mut controller = AnimationController::new(skeleton());
        assert!(matches!(
            controller.fade_to("A", 1.0, false),
            Err(Md5Error::NoAnimation)
        ));
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        assert!(matches!(
            controller.fade_to("missing", 1.0, false),
            Err(Md5Error::UnknownAnimation(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_single_play_samples_clip() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(rotate_clip("A", FRAC_PI_2)).unwrap();
        assert!(controller.update(0.5));

        let skeleton = controller.skeleton().read();
        let child = skeleton.joint(1).unwrap().local.orientation;
        assert!(child.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_2 / 2.0), 1e-5));
    }

    #[test]
    fn test_fade_half_way() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 2.0)).unwrap();

        controller.fade_to("B", 2.0, false).unwrap();
        assert!(controller.update(1.0));
        assert_eq!(controller.fade_progress(), Some(0.5));
        assert_eq!(controller.active_animation().unwrap().name(), "B");
        assert!((root_x(&controller) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fade_endpoints_exact() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(rotate_clip("A", FRAC_PI_2)).unwrap();
        controller.add_animation(rotate_clip("B", -FRAC_PI_2)).unwrap();
        controller.update(0.25);

        controller.fade_to("B", 1.0, false).unwrap();
        controller.update(0.0);
        let a = controller.animation("A").unwrap().sample_with(0.25, RepeatType::Wrap);
        assert_eq!(controller.skeleton().read().current_pose(), a);

        controller.update(1.0);
        let b = controller.animation("B").unwrap().sample_with(1.25, RepeatType::Wrap);
        assert_eq!(controller.skeleton().read().current_pose(), b);
        assert!(!controller.is_fading());
        assert_eq!(controller.active_animation().unwrap().name(), "B");
        assert_eq!(controller.local_time(), 1.25);
    }

    #[test]
    fn test_fade_scaled_with_speed() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 2.0)).unwrap();
        controller.set_speed(2.0);

        controller.fade_to("B", 2.0, true).unwrap();
        controller.update(1.0);
        assert_eq!(controller.fade_progress(), Some(0.5));

        controller.fade_to("A", 2.0, false).unwrap();
        controller.update(0.5);
        assert_eq!(controller.fade_progress(), Some(0.5));
    }

    #[test]
    fn test_fade_at_zero_speed_waits() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 2.0)).unwrap();
        controller.set_speed(0.0);

        controller.fade_to("B", 1.0, true).unwrap();
        assert!(controller.is_fading());
        controller.update(5.0);
        assert_eq!(controller.fade_progress(), Some(0.0));

        controller.set_speed(1.0);
        controller.update(0.5);
        assert_eq!(controller.fade_progress(), Some(0.5));
    }

    #[test]
    fn test_zero_duration_fade_switches() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 3.0)).unwrap();
        controller.fade_to("B", 0.0, false).unwrap();
        assert!(!controller.is_fading());
        controller.update(0.1);
        assert_eq!(root_x(&controller), 3.0);
    }

    #[test]
    fn test_fade_to_unregistered_clip() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.fade_to_clip(hold_clip("C", 1.0), 1.0, false).unwrap();
        assert!(controller.animation("C").is_some());
        assert!(matches!(
            controller.fade_to_clip(hold_clip("C", 5.0), 1.0, false),
            Err(Md5Error::DuplicateName(_))
        ));
    }

    #[test]
    fn test_inactive_freezes_time() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(rotate_clip("A", FRAC_PI_2)).unwrap();
        controller.update(0.25);
        controller.set_active(false);
        assert!(!controller.update(1.0));
        assert_eq!(controller.local_time(), 0.25);
        assert!(matches!(controller.state(), ControllerState::SinglePlay { .. }));

        controller.set_active(true);
        assert!(controller.update(0.25));
        assert_eq!(controller.local_time(), 0.5);
    }

    #[test]
    fn test_clamp_freezes_pose() {
        let mut controller = AnimationController::new(skeleton());
        controller.set_repeat_type(RepeatType::Clamp);
        controller.add_animation(rotate_clip("A", FRAC_PI_2)).unwrap();

        assert!(controller.update(2.5));
        let last = controller.animation("A").unwrap().frames()[1].clone();
        assert_eq!(controller.skeleton().read().current_pose(), last);
        assert!(!controller.update(1.0));
    }

    #[test]
    fn test_notifies_after_each_refresh() {
        let mut controller = AnimationController::new(skeleton());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.register(Arc::new(move |seq: u64| sink.lock().push(seq)));

        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.update(0.1);
        controller.update(0.1);
        controller.set_active(false);
        controller.update(0.1);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_clone_inactive() {
        let mut controller = AnimationController::new(skeleton());
        controller.register(Arc::new(|_seq: u64| {}));
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 1.0)).unwrap();
        controller.fade_to("B", 1.0, false).unwrap();

        let clone = controller.clone_inactive(skeleton());
        assert!(matches!(clone.state(), ControllerState::Inactive));
        assert_eq!(clone.animations().len(), 2);
        assert!(clone.observable().is_empty());
    }

    #[test]
    fn test_play_resets_time() {
        let mut controller = AnimationController::new(skeleton());
        controller.add_animation(hold_clip("A", 0.0)).unwrap();
        controller.add_animation(hold_clip("B", 4.0)).unwrap();
        controller.update(0.75);
        controller.play("B").unwrap();
        assert_eq!(controller.local_time(), 0.0);
        controller.update(0.1);
        assert_eq!(root_x(&controller), 4.0);
        assert!(controller.play("nope").is_err());
    }
}
