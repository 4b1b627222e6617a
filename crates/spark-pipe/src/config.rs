//! 管道构造参数。

use crate::error::{PipeError, Result};

/// 默认段数量。
pub const DEFAULT_SEGMENT_COUNT: usize = 64;

/// 默认段大小（字节）。
pub const DEFAULT_SEGMENT_SIZE: usize = 65_536;

/// `PipeConfig` 描述段池的几何形状：slab 被切分为 `segment_count` 个、每个
/// `segment_size` 字节的段。
///
/// # 契约说明（What）
/// - 两个参数均须为正数，且 `segment_count × segment_size` 不得溢出 `usize`；
/// - 经 [`PipeConfig::new`] 或 [`PipeConfig::validate`] 校验后，[`PipeConfig::slab_len`]
///   即为管道整个生命周期内持有的堆内存上限。
///
/// # 设计权衡（Trade-offs）
/// - 段越小，慢速消费者拖住的内存越少，但每次写入需要更多次交接；
/// - 段越多，生产者在背压前能领先消费者越远，代价是 slab 常驻内存增大。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipeConfig {
    pub segment_count: usize,
    pub segment_size: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl PipeConfig {
    /// 创建并校验配置。
    pub fn new(segment_count: usize, segment_size: usize) -> Result<Self> {
        let config = Self {
            segment_count,
            segment_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// 覆盖段数量，需在使用前重新 [`validate`](Self::validate)。
    pub fn with_segment_count(mut self, segment_count: usize) -> Self {
        self.segment_count = segment_count;
        self
    }

    /// 覆盖段大小，需在使用前重新 [`validate`](Self::validate)。
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    /// 校验参数是否可用于构造段池。
    pub fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(PipeError::InvalidConfig {
                reason: "segment_count must be positive",
            });
        }
        if self.segment_size == 0 {
            return Err(PipeError::InvalidConfig {
                reason: "segment_size must be positive",
            });
        }
        if self.segment_count.checked_mul(self.segment_size).is_none() {
            return Err(PipeError::InvalidConfig {
                reason: "segment_count * segment_size overflows usize",
            });
        }
        Ok(())
    }

    /// slab 总字节数。调用前须已通过校验，否则乘法可能回绕。
    pub fn slab_len(&self) -> usize {
        self.segment_count.wrapping_mul(self.segment_size)
    }
}
