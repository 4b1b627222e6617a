use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::{
    config::PipeConfig,
    error::{PipeError, Result, check_range},
    handoff::HandoffQueue,
    pool::{PoolStats, SegmentPool},
    segment::Segment,
    sync::{self, Arc, Mutex},
};

/// `Pipe` 是建立在 [`SegmentPool`] 之上的单生产者 / 单消费者阻塞字节管道。
///
/// # 模块角色（Why）
/// - 生产者以任意粒度写入，消费者以任意粒度读取，二者通过固定大小的段解耦；
/// - 读取端跨调用保留“当前段”，使一个段能连续服务多次小块读取，
///   写入端则把大块输入切分到多个段中，缓冲区大小彼此无需匹配。
///
/// # 核心机制（How）
/// - **写入**：循环租借段 → 拷入 `min(剩余, 段容量)` 字节 → 设置 `committed` → 提交交接队列；
///   池耗尽时阻塞在租借上，形成背压；
/// - **读取**：未持有段时阻塞出队；持有段后拷出字节并递减 `committed`，读空即归还，
///   若目标缓冲仍有空间，仅以**非阻塞**方式尝试衔接下一个段；
/// - **流结束**：关闭交接队列，已提交的段依旧可读，排空后读取返回 `0`。
///
/// # 契约说明（What）
/// - **线程模型**：`Pipe: Send + Sync`，可经 `Arc` 由一个生产者线程与一个消费者线程共享，
///   或通过 [`Pipe::split`] 得到各自独占的两端；多个消费者并发读取不破坏内存安全，但字节顺序不再有保证；
/// - **顺序**：读取端得到的字节串恰为所有成功写入的字节按提交顺序拼接；
/// - **部分读取**：一次读取至少返回 1 字节（流结束时为 0），一旦手中有字节便不再阻塞。
///
/// # 设计权衡（Trade-offs）
/// - 消费者槽位放在独立互斥锁后，SPSC 场景下永不争用，换取 `&self` 接口与多线程共享的便利；
/// - 写入与关闭竞态时，已提交的前缀仍然有效，剩余部分以 [`PipeError::Closed`] 报告。
pub struct Pipe {
    pool: SegmentPool,
    handoff: HandoffQueue,
    slot: Mutex<ReadSlot>,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

/// 消费者当前持有的段与读取游标（slab 绝对偏移）。
///
/// 游标恒落在 `[segment.index, segment.index + segment.capacity]` 内。
#[derive(Default)]
struct ReadSlot {
    current: Option<Segment>,
    cursor: usize,
}

impl ReadSlot {
    fn hold(&mut self, segment: Segment) {
        self.cursor = segment.index();
        self.current = Some(segment);
    }
}

/// 管道统计快照。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PipeStats {
    pub pool: PoolStats,
    /// 已提交但尚未被消费者取走的段数。
    pub queued_segments: usize,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub closed: bool,
}

impl Default for Pipe {
    /// 使用默认几何参数（64 × 64 KiB）构造管道。
    fn default() -> Self {
        Self::from_pool(
            SegmentPool::new(PipeConfig::default()).expect("default pipe configuration is valid"),
        )
    }
}

impl Pipe {
    pub fn new(config: PipeConfig) -> Result<Self> {
        Ok(Self::from_pool(SegmentPool::new(config)?))
    }

    /// 以段数量与段大小直接构造管道。
    pub fn with_segments(segment_count: usize, segment_size: usize) -> Result<Self> {
        Self::new(PipeConfig::new(segment_count, segment_size)?)
    }

    fn from_pool(pool: SegmentPool) -> Self {
        let segment_count = pool.config().segment_count;
        Self {
            pool,
            handoff: HandoffQueue::new(segment_count),
            slot: Mutex::new(ReadSlot::default()),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }

    /// 管道使用的段池几何参数。
    pub fn config(&self) -> PipeConfig {
        self.pool.config()
    }

    /// 写入整个 `src`。
    pub fn write(&self, src: &[u8]) -> Result<()> {
        self.write_range(src, 0, src.len())
    }

    /// 写入 `src[offset..offset + count]`，返回时全部字节均已提交到交接队列。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：区间须落在 `src` 内，否则返回 [`PipeError::InvalidArgument`] 且不产生副作用；
    /// - **阻塞**：段池耗尽时阻塞，直到消费者归还段；
    /// - **失败**：流结束后写入返回 [`PipeError::Closed`]；`count == 0` 且管道开放时立即返回。
    pub fn write_range(&self, src: &[u8], offset: usize, count: usize) -> Result<()> {
        check_range(src.len(), offset, count)?;
        if self.handoff.is_closed() {
            warn!(count, "write rejected, pipe already closed");
            return Err(PipeError::Closed);
        }

        let mut pending = &src[offset..offset + count];
        while !pending.is_empty() {
            let mut segment = self.pool.acquire();
            let filled = segment.fill(pending);
            let index = segment.index();
            if let Err(rejected) = self.handoff.push(segment) {
                self.pool.release(rejected)?;
                warn!(
                    remaining = pending.len(),
                    "pipe closed while write was in progress"
                );
                return Err(PipeError::Closed);
            }
            trace!(index, filled, "segment committed");
            self.bytes_written.fetch_add(filled as u64, Ordering::Relaxed);
            pending = &pending[filled..];
        }
        Ok(())
    }

    /// 读取至多 `dst.len()` 字节。
    pub fn read(&self, dst: &mut [u8]) -> Result<usize> {
        let len = dst.len();
        self.read_range(dst, 0, len)
    }

    /// 读取至多 `count` 字节到 `dst[offset..]`，返回实际读取数。
    ///
    /// # 契约说明（What）
    /// - 返回 `0` 仅表示流已结束且队列排空（或 `count == 0`）；
    /// - 未持有任何可读字节时阻塞等待生产者；一旦读到字节便不再阻塞，
    ///   后续段只以非阻塞方式衔接；
    /// - 区间越界返回 [`PipeError::InvalidArgument`]，不改变读取状态。
    pub fn read_range(&self, dst: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        check_range(dst.len(), offset, count)?;
        if count == 0 {
            return Ok(0);
        }
        let dst = &mut dst[offset..offset + count];

        let mut slot = sync::lock(&self.slot);
        if slot.current.is_none() {
            match self.handoff.pop_blocking() {
                Some(segment) => slot.hold(segment),
                None => {
                    trace!("read observed end of stream");
                    return Ok(0);
                }
            }
        }

        let mut copied = 0;
        while copied < dst.len() {
            let ReadSlot { current, cursor } = &mut *slot;
            let Some(segment) = current.as_mut() else {
                break;
            };
            let drained = segment.drain_into(&mut dst[copied..], *cursor);
            *cursor += drained;
            copied += drained;

            if !segment.is_drained() {
                break;
            }
            if let Some(segment) = current.take() {
                trace!(index = segment.index(), "segment drained");
                self.pool.release(segment)?;
            }
            if copied < dst.len()
                && let Some(next) = self.handoff.try_pop()
            {
                slot.hold(next);
            }
        }
        drop(slot);

        self.bytes_read.fetch_add(copied as u64, Ordering::Relaxed);
        Ok(copied)
    }

    /// 发出流结束信号：拒绝后续写入，唤醒阻塞中的读取端。幂等。
    pub fn end_of_stream(&self) {
        if self.handoff.close() {
            debug!(
                queued_segments = self.handoff.len(),
                bytes_written = self.bytes_written.load(Ordering::Relaxed),
                "end of stream signalled"
            );
        }
    }

    /// 拆除管道，语义等同 [`end_of_stream`](Self::end_of_stream)；slab 随段池一同释放。
    pub fn teardown(&self) {
        self.end_of_stream();
    }

    /// 空操作：写入返回时字节已经提交。
    pub fn flush(&self) -> Result<()> {
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.handoff.is_closed()
    }

    pub fn statistics(&self) -> PipeStats {
        PipeStats {
            pool: self.pool.statistics(),
            queued_segments: self.handoff.len(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            closed: self.handoff.is_closed(),
        }
    }

    /// 拆分为独占的写端与读端。写端被丢弃时自动发出流结束信号。
    ///
    /// 读端须一直读到返回 `0`：读端提前丢弃后段不再归还，池耗尽时写端将永久阻塞在租借上。
    pub fn split(self) -> (PipeWriter, PipeReader) {
        let pipe = Arc::new(self);
        (
            PipeWriter {
                pipe: Arc::clone(&pipe),
            },
            PipeReader { pipe },
        )
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("pool", &self.pool)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// 管道写端，由 [`Pipe::split`] 产生。
pub struct PipeWriter {
    pipe: Arc<Pipe>,
}

impl PipeWriter {
    pub fn write(&self, src: &[u8]) -> Result<()> {
        self.pipe.write(src)
    }

    pub fn write_range(&self, src: &[u8], offset: usize, count: usize) -> Result<()> {
        self.pipe.write_range(src, offset, count)
    }

    /// 显式结束写入；丢弃写端有同样效果。
    pub fn end_of_stream(&self) {
        self.pipe.end_of_stream();
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }
}

impl std::fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PipeWriter").field(&*self.pipe).finish()
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.pipe.end_of_stream();
    }
}

/// 管道读端，由 [`Pipe::split`] 产生。
pub struct PipeReader {
    pipe: Arc<Pipe>,
}

impl PipeReader {
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.pipe.read(dst)
    }

    pub fn read_range(&mut self, dst: &mut [u8], offset: usize, count: usize) -> Result<usize> {
        self.pipe.read_range(dst, offset, count)
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PipeReader").field(&*self.pipe).finish()
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn read_returns_available_bytes_without_blocking() {
        let pipe = Pipe::with_segments(4, 8).expect("构造管道");
        pipe.write(b"hello").expect("写入");

        let mut buf = [0u8; 64];
        assert_eq!(pipe.read(&mut buf).expect("读取"), 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn small_reads_share_one_segment() {
        let pipe = Pipe::with_segments(2, 8).expect("构造管道");
        pipe.write(b"abcdef").expect("写入");

        let mut buf = [0u8; 2];
        let mut out = Vec::new();
        for _ in 0..3 {
            let n = pipe.read(&mut buf).expect("读取");
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcdef");
        assert_eq!(pipe.statistics().pool.free_segments, 2);
    }

    #[test]
    fn read_chains_queued_segments_in_one_call() {
        let pipe = Pipe::with_segments(4, 3).expect("构造管道");
        pipe.write(b"abcdefgh").expect("写入");
        assert_eq!(pipe.statistics().queued_segments, 3);

        let mut buf = [0u8; 16];
        assert_eq!(pipe.read(&mut buf).expect("读取"), 8);
        assert_eq!(&buf[..8], b"abcdefgh");
    }

    #[test]
    fn write_range_honours_offset_across_segments() {
        let pipe = Pipe::with_segments(8, 2).expect("构造管道");
        let src = b"__spark-pipe__";
        pipe.write_range(src, 2, 10).expect("写入");
        pipe.end_of_stream();

        let mut buf = [0u8; 32];
        let mut out = Vec::new();
        loop {
            let n = pipe.read_range(&mut buf, 4, 5).expect("读取");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[4..4 + n]);
        }
        assert_eq!(out, b"spark-pipe");
    }

    #[test]
    fn invalid_ranges_leave_state_untouched() {
        let pipe = Pipe::with_segments(2, 4).expect("构造管道");
        assert!(matches!(
            pipe.write_range(b"abc", 2, 2),
            Err(PipeError::InvalidArgument { .. })
        ));
        pipe.write(b"ok").expect("写入");

        let mut buf = [0u8; 4];
        assert!(matches!(
            pipe.read_range(&mut buf, 3, 2),
            Err(PipeError::InvalidArgument { .. })
        ));
        assert_eq!(pipe.read(&mut buf).expect("读取"), 2);
    }

    #[test]
    fn empty_requests_return_immediately() {
        let pipe = Pipe::with_segments(1, 4).expect("构造管道");
        pipe.write(&[]).expect("空写入");
        assert_eq!(pipe.statistics().queued_segments, 0);
        assert_eq!(pipe.read(&mut []).expect("空读取"), 0);
        assert!(!pipe.is_closed());
    }

    #[traced_test]
    #[test]
    fn end_of_stream_is_idempotent_and_logged() {
        let pipe = Pipe::with_segments(1, 4).expect("构造管道");
        pipe.end_of_stream();
        pipe.teardown();
        assert!(pipe.is_closed());
        assert!(logs_contain("end of stream signalled"));
        assert_eq!(pipe.write(b"x"), Err(PipeError::Closed));
    }

    #[test]
    fn dropping_writer_ends_stream() {
        let (writer, mut reader) = Pipe::with_segments(2, 4).expect("构造管道").split();
        writer.write(b"tail").expect("写入");
        drop(writer);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).expect("读取"), 4);
        assert_eq!(reader.read(&mut buf).expect("读取"), 0);
        assert!(reader.pipe().statistics().closed);
    }
}
