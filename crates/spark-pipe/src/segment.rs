use bytes::BytesMut;

/// `Segment` 是 slab 中一段固定窗口的描述符，也是该窗口字节的唯一所有权凭证。
///
/// # 角色定位（Why）
/// - 段在构造段池时一次性切出，之后只在“空闲 → 生产者填充 → 交接队列 → 消费者读取 → 空闲”
///   之间流转，永不销毁，从而把写入路径上的分配成本摊销为零；
/// - 类型不实现 `Clone`，所有权转移即状态转移：同一个段不可能被归还两次，也不可能被两方同时持有。
///
/// # 数据结构解析（How）
/// - `window`：由 slab 的 `BytesMut::split_to` 切出，与其它段共享同一块连续分配，
///   长度恒等于段容量，只按下标读写，从不移动内部游标；
/// - `index`：窗口在 slab 内的字节偏移，读取游标以它为基准；
/// - `committed`：生产者填充时设置，消费者每读出 `n` 字节便减少 `n`，表示尚未读出的字节数；
/// - `pool_id`：所属段池的标识，替代回指指针以避免池与描述符之间的引用环。
///
/// # 契约说明（What）
/// - 恒有 `0 <= committed <= capacity`；
/// - 已读出字节数与 `committed` 之和等于最近一次 [`fill`](Segment::fill) 写入的字节数。
#[derive(Debug)]
pub struct Segment {
    pool_id: u64,
    index: usize,
    committed: usize,
    window: BytesMut,
}

impl Segment {
    pub(crate) fn new(pool_id: u64, index: usize, window: BytesMut) -> Self {
        Self {
            pool_id,
            index,
            committed: 0,
            window,
        }
    }

    /// 段在 slab 中的起始偏移。
    pub fn index(&self) -> usize {
        self.index
    }

    /// 段容量，等于段池的段大小。
    pub fn capacity(&self) -> usize {
        self.window.len()
    }

    /// 尚未被消费的已提交字节数。
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// 已提交字节是否全部读出。
    pub fn is_drained(&self) -> bool {
        self.committed == 0
    }

    /// 将 `src` 的前缀拷入段首，返回拷贝的字节数（不超过段容量）并以此设置 `committed`。
    pub fn fill(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(self.capacity());
        self.window[..len].copy_from_slice(&src[..len]);
        self.committed = len;
        len
    }

    /// 从 slab 绝对偏移 `cursor` 处拷出至多 `dst.len()` 个已提交字节，返回实际拷贝数。
    ///
    /// 调用方负责让 `cursor` 从 [`index`](Segment::index) 开始，并按返回值推进。
    pub(crate) fn drain_into(&mut self, dst: &mut [u8], cursor: usize) -> usize {
        debug_assert!(cursor >= self.index);
        let start = cursor - self.index;
        let len = dst.len().min(self.committed);
        debug_assert!(start + len <= self.capacity());
        dst[..len].copy_from_slice(&self.window()[start..start + len]);
        self.committed -= len;
        len
    }

    /// 段在 slab 中的窗口视图。
    pub(crate) fn window(&self) -> &[u8] {
        &self.window
    }

    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// 归还前清空计数，窗口内残留字节无需擦除。
    pub(crate) fn reset(&mut self) {
        self.committed = 0;
    }
}
