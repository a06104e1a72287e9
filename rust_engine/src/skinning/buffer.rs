//! 双缓冲
//!
//! 蒙皮写入后台缓冲，渲染端读取前台缓冲；一次完整写入结束后交换。
//! 没有新写入时交换不生效，前台不会退回上一帧。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// 双缓冲
pub struct DoubleBuffer<T> {
    front: RwLock<Arc<T>>,
    back: Mutex<Arc<T>>,
    /// 后台缓冲有尚未发布的写入，仅在持有 back 锁时修改
    pending: AtomicBool,
    generation: AtomicU64,
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn new(initial: T) -> Self {
        Self {
            front: RwLock::new(Arc::new(initial.clone())),
            back: Mutex::new(Arc::new(initial)),
            pending: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// 写入后台缓冲，不阻塞读取前台缓冲的一方
    ///
    /// 如果读取方仍持有交换出去的旧快照，会先复制一份再写。
    pub fn write_back<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut back = self.back.lock();
        let result = f(Arc::make_mut(&mut *back));
        self.pending.store(true, Ordering::Release);
        result
    }

    /// 交换前后台缓冲，发布最近一次写入
    ///
    /// 后台没有新写入时不交换，返回 false。
    pub fn swap_buffer(&self) -> bool {
        let mut back = self.back.lock();
        if !self.pending.swap(false, Ordering::AcqRel) {
            return false;
        }
        let mut front = self.front.write();
        std::mem::swap(&mut *front, &mut *back);
        self.generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// 后台缓冲是否有尚未发布的写入
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// 获取前台缓冲快照
    pub fn front(&self) -> Arc<T> {
        Arc::clone(&self.front.read())
    }

    /// 已交换次数
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 复制当前前台内容，生成独立的双缓冲
    pub fn duplicate(&self) -> Self {
        Self::new(self.front().as_ref().clone())
    }
}

impl<T: Clone + Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for DoubleBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
