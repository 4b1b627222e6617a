//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为管道与段池对外暴露的失败语义提供集中定义；
//! - 流结束不是错误：读取端以返回 `0` 表达，不在此枚举中出现。
//!
//! ## 设计要求（What）
//! - 所有错误均派生 `thiserror::Error`，并可无损转换为 [`std::io::Error`]，
//!   使 `std::io` 适配层直接以 `?` 传播；
//! - 错误不携带、也不修改管道状态：一次误用不会“毒化”后续读写。

use std::io;

use thiserror::Error;

/// crate 级别的 `Result` 别名。
pub type Result<T, E = PipeError> = core::result::Result<T, E>;

/// 管道与段池的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“调用方误用”（参数越界、能力不支持）与“生命周期冲突”（写入已关闭的管道），
///   便于调用方决定是修正调用还是结束生产；
/// - **契约 (What)**：所有变体均为 `Send + Sync + 'static`，在操作入口同步返回，
///   且返回前不产生任何副作用（关闭竞态下的部分写入除外，见 [`PipeError::Closed`]）；
/// - **设计权衡 (Trade-offs)**：`operation` 采用 `&'static str`，避免在错误路径上分配字符串。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PipeError {
    /// 管道不支持随机访问、长度或位置查询。
    #[error("operation `{operation}` is not supported by a pipe stream")]
    Unsupported { operation: &'static str },

    /// `offset`/`count` 描述的区间超出调用方缓冲区。
    #[error("range offset={offset} count={count} exceeds buffer of {len} bytes")]
    InvalidArgument {
        offset: usize,
        count: usize,
        len: usize,
    },

    /// 管道已收到流结束信号，拒绝继续写入。
    ///
    /// 写入与关闭并发时，已提交到交接队列的前缀仍会被读取端消费。
    #[error("pipe has been closed for writing")]
    Closed,

    /// 归还的段不属于当前段池。
    #[error("segment belongs to pool #{actual}, not pool #{expected}")]
    ForeignSegment { expected: u64, actual: u64 },

    /// 段数量或段大小不合法。
    #[error("invalid pipe configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

impl PipeError {
    /// 为不支持的操作构造错误。
    pub(crate) fn unsupported(operation: &'static str) -> Self {
        PipeError::Unsupported { operation }
    }

    /// 映射为 `std::io` 的错误类别。
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            PipeError::Unsupported { .. } => io::ErrorKind::Unsupported,
            PipeError::InvalidArgument { .. } | PipeError::InvalidConfig { .. } => {
                io::ErrorKind::InvalidInput
            }
            PipeError::Closed => io::ErrorKind::BrokenPipe,
            PipeError::ForeignSegment { .. } => io::ErrorKind::Other,
        }
    }
}

impl From<PipeError> for io::Error {
    fn from(value: PipeError) -> Self {
        io::Error::new(value.io_kind(), value)
    }
}

/// 校验 `buffer[offset..offset + count]` 是否落在长度为 `len` 的缓冲区内。
pub(crate) fn check_range(len: usize, offset: usize, count: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(PipeError::InvalidArgument { offset, count, len }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_rejects_overflow_and_overrun() {
        assert!(check_range(8, 0, 8).is_ok());
        assert!(check_range(8, 8, 0).is_ok());
        assert_eq!(
            check_range(8, 4, 5),
            Err(PipeError::InvalidArgument {
                offset: 4,
                count: 5,
                len: 8
            })
        );
        assert!(check_range(8, usize::MAX, 2).is_err());
    }

    #[test]
    fn io_conversion_keeps_kind_and_message() {
        let err: io::Error = PipeError::Closed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(err.to_string(), "pipe has been closed for writing");

        let err: io::Error = PipeError::unsupported("seek").into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
