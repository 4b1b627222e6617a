use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::{
    config::PipeConfig,
    error::{PipeError, Result},
    segment::Segment,
    sync::{self, Arc, Condvar, Mutex},
};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// `SegmentPool` 把一块连续 slab 切分为等长段，并以自由链表管理空闲段，
/// 为管道提供**有界、可复用**的写入缓冲来源。
///
/// # 模块角色（Why）
/// - 写入路径从池中借段、读取路径把读空的段还回池，整个生命周期只在构造时分配一次；
/// - 池容量即背压上限：所有段都在途时，生产者阻塞在 [`acquire`](Self::acquire)，
///   直到消费者归还段为止。
///
/// # 核心机制（How）
/// - slab 以 `BytesMut::zeroed` 一次性分配，再逐段 `split_to`，各段共享同一块内存；
/// - 自由链表为互斥锁保护的 `VecDeque<Segment>`，配合条件变量：`release` 入队后无条件
///   `notify_one`，`acquire` 被唤醒后重新检查链表，虚假唤醒只会导致再次等待；
/// - `PoolMetrics` 以原子计数记录租借、归还与阻塞次数，支撑 [`statistics`](Self::statistics) 快照；
///   在途计数只在持有自由链表锁时变更，与段的实际移动同步，快照中“空闲 + 在途”恒等于段总数。
///
/// # 契约说明（What）
/// - **线程安全**：`SegmentPool` 满足 `Send + Sync`，克隆句柄共享同一个池；
/// - **守恒**：空闲段与所有在途段的并集恒等于构造时的段集合；
/// - **失败语义**：耗尽时只阻塞不报错；归还其它池的段返回 [`PipeError::ForeignSegment`]。
///
/// # 设计权衡（Trade-offs）
/// - 条件变量等待不设超时，调用方看到的是无界阻塞契约，终止依赖对端归还或关闭管道；
/// - 链表用 FIFO 顺序仅为保持段轮转均匀，段身份本身可互换。
#[derive(Clone)]
pub struct SegmentPool {
    inner: Arc<PoolInner>,
}

/// 段池统计快照。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub segment_count: usize,
    pub segment_size: usize,
    /// 快照时刻位于自由链表中的段数。
    pub free_segments: usize,
    /// 快照时刻被生产者、交接队列或消费者持有的段数。
    pub leased_segments: usize,
    /// 历史上同时在途段数的峰值。
    pub peak_leased: usize,
    pub total_acquisitions: u64,
    pub total_releases: u64,
    /// 因池耗尽而进入等待的租借次数，在租借方开始等待时即计入。
    pub blocked_acquisitions: u64,
}

impl SegmentPool {
    /// 按配置分配 slab 并填充自由链表。
    pub fn new(config: PipeConfig) -> Result<Self> {
        config.validate()?;
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        let mut slab = BytesMut::zeroed(config.slab_len());
        let mut free = VecDeque::with_capacity(config.segment_count);
        for ordinal in 0..config.segment_count {
            let window = slab.split_to(config.segment_size);
            free.push_back(Segment::new(id, ordinal * config.segment_size, window));
        }

        debug!(
            pool = id,
            segment_count = config.segment_count,
            segment_size = config.segment_size,
            slab_len = config.slab_len(),
            "segment pool allocated"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                config,
                free: Mutex::new(free),
                available: Condvar::new(),
                metrics: PoolMetrics::default(),
            }),
        })
    }

    /// 池的几何参数。
    pub fn config(&self) -> PipeConfig {
        self.inner.config
    }

    /// slab 总字节数。
    pub fn slab_len(&self) -> usize {
        self.inner.config.slab_len()
    }

    /// 租借一个空闲段；池耗尽时阻塞，直到有段被归还。
    pub fn acquire(&self) -> Segment {
        let inner = &*self.inner;
        let mut free = sync::lock(&inner.free);
        let mut blocked = false;
        loop {
            if let Some(segment) = free.pop_front() {
                inner.metrics.on_acquire();
                return segment;
            }
            if !blocked {
                blocked = true;
                inner.metrics.on_block();
                debug!(pool = inner.id, "segment pool exhausted, waiting for release");
            }
            free = sync::wait(&inner.available, free);
        }
    }

    /// 非阻塞租借；池耗尽时返回 `None`。
    pub fn try_acquire(&self) -> Option<Segment> {
        let mut free = sync::lock(&self.inner.free);
        let segment = free.pop_front()?;
        self.inner.metrics.on_acquire();
        Some(segment)
    }

    /// 归还段并唤醒一个等待中的租借方。
    pub fn release(&self, mut segment: Segment) -> Result<()> {
        let inner = &*self.inner;
        if segment.pool_id() != inner.id {
            warn!(
                pool = inner.id,
                owner = segment.pool_id(),
                "rejected segment released to a foreign pool"
            );
            return Err(PipeError::ForeignSegment {
                expected: inner.id,
                actual: segment.pool_id(),
            });
        }

        segment.reset();
        let mut free = sync::lock(&inner.free);
        inner.metrics.on_release();
        free.push_back(segment);
        drop(free);
        inner.available.notify_one();
        Ok(())
    }

    /// 生成统计快照。
    pub fn statistics(&self) -> PoolStats {
        let inner = &*self.inner;
        let free = sync::lock(&inner.free);
        PoolStats {
            segment_count: inner.config.segment_count,
            segment_size: inner.config.segment_size,
            free_segments: free.len(),
            leased_segments: inner.metrics.leased.load(Ordering::Relaxed),
            peak_leased: inner.metrics.peak_leased.load(Ordering::Relaxed),
            total_acquisitions: inner.metrics.acquisitions.load(Ordering::Relaxed),
            total_releases: inner.metrics.releases.load(Ordering::Relaxed),
            blocked_acquisitions: inner.metrics.blocked.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SegmentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentPool")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

struct PoolInner {
    id: u64,
    config: PipeConfig,
    free: Mutex<VecDeque<Segment>>,
    available: Condvar,
    metrics: PoolMetrics,
}

#[derive(Default)]
struct PoolMetrics {
    leased: AtomicUsize,
    peak_leased: AtomicUsize,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    blocked: AtomicU64,
}

impl PoolMetrics {
    fn on_acquire(&self) {
        let leased = self.leased.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_leased.fetch_max(leased, Ordering::Relaxed);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    /// 在首次进入等待前记录，使观察者能在租借方仍阻塞时看到计数。
    fn on_block(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    fn on_release(&self) {
        self.leased.fetch_sub(1, Ordering::Relaxed);
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}
