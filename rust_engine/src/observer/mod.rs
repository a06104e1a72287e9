//! 观察者通知
//!
//! 控制器每次刷新骨骼后推送通知，依赖同一骨骼的模型据此重新蒙皮。
//! 注册与通知可以在不同线程并发进行：通知先取当前列表的快照再逐个调用，
//! 追加注册只在极短的写锁内完成，不会等待正在进行的通知。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// 观察者
///
/// 通知在调用方的线程上同步执行，观察者不应假设特定线程。
pub trait Observer: Send + Sync {
    /// `sequence` 为通知序号，从 1 开始递增
    fn on_update(&self, sequence: u64);
}

impl<F> Observer for F
where
    F: Fn(u64) + Send + Sync,
{
    fn on_update(&self, sequence: u64) {
        self(sequence)
    }
}

/// 可观察对象：按注册顺序保存观察者
#[derive(Default)]
pub struct Observable {
    observers: RwLock<Arc<Vec<Arc<dyn Observer>>>>,
    sequence: AtomicU64,
}

impl Observable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册观察者（追加到末尾）
    ///
    /// 通常是 O(1) 追加；若此时有通知正持有列表快照，会先复制整个列表，
    /// 代价为 O(n)。观察者数量一般很少，这一开销可以忽略。
    pub fn register(&self, observer: Arc<dyn Observer>) {
        let mut observers = self.observers.write();
        Arc::make_mut(&mut *observers).push(observer);
    }

    /// 同步通知所有观察者，返回本次通知序号
    ///
    /// 通知开始后才注册的观察者不保证收到本次通知。
    pub fn notify_update(&self) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::clone(&self.observers.read());
        for observer in snapshot.iter() {
            observer.on_update(sequence);
        }
        sequence
    }

    /// 清空注册列表
    pub fn clear(&self) {
        *self.observers.write() = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// 已发出的通知次数
    pub fn notify_count(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.len())
            .field("sequence", &self.notify_count())
            .finish()
    }
}

/// 把通知转发到通道的观察者，用于跨线程消费
pub struct ChannelObserver {
    sender: Mutex<Sender<u64>>,
}

impl ChannelObserver {
    /// 创建观察者与对应的接收端
    pub fn channel() -> (Arc<Self>, Receiver<u64>) {
        let (sender, receiver) = mpsc::channel();
        (
            Arc::new(Self {
                sender: Mutex::new(sender),
            }),
            receiver,
        )
    }
}

impl Observer for ChannelObserver {
    fn on_update(&self, sequence: u64) {
        if self.sender.lock().send(sequence).is_err() {
            log::debug!("通知 #{} 丢弃: 接收端已关闭", sequence);
        }
    }
}
