//! `spark-pipe` 提供单生产者 / 单消费者的进程内阻塞字节管道。
//!
//! # 模块定位（Why）
//! - 生产者提交任意长度的字节区间，消费者按提交顺序读取全部字节，并在生产者发出
//!   “流结束”信号后读到 `0`，形成与 `std::io::Read`/`Write` 同构的流式契约；
//! - 管道在构造时一次性分配一块连续 slab，切分为固定大小的段循环复用，
//!   写入路径不再发生逐次堆分配，内存占用恒定为 `segment_count × segment_size`。
//!
//! # 设计概要（How）
//! - `pool` 模块实现 [`SegmentPool`]：持有段描述符的自由链表，池耗尽时阻塞租借方，
//!   形成天然的背压；
//! - `handoff` 模块实现生产者与消费者之间的 FIFO 交接队列，并承载“已关闭”标记；
//! - `pipe` 模块实现 [`Pipe`]：拆分写入、跨调用保留“当前段”以服务小块读取；
//! - `stream` 模块补齐流能力声明（不可 seek、无长度/位置）与 `std::io` 适配。
//!
//! # 并发契约（What）
//! - 同一时刻仅支持一个生产者线程与一个消费者线程；多消费者不会破坏内存安全，
//!   但不再保证字节顺序；
//! - 段的字节区间由当前持有者独占，所有权经线程安全的队列转移，无需额外加锁保护 slab。
//!
//! ```
//! use std::{
//!     io::{Read, Write},
//!     thread,
//! };
//! use spark_pipe::{Pipe, PipeConfig};
//!
//! let config = PipeConfig::new(4, 16).expect("合法配置");
//! let (mut writer, mut reader) = Pipe::new(config).expect("构造管道").split();
//!
//! let producer = thread::spawn(move || {
//!     writer.write_all(b"hello spark").expect("写入");
//!     // `writer` 在此被丢弃，自动发出流结束信号。
//! });
//!
//! let mut received = Vec::new();
//! reader.read_to_end(&mut received).expect("读取");
//! producer.join().expect("生产者线程");
//! assert_eq!(received, b"hello spark");
//! ```

mod config;
mod error;
mod handoff;
mod pipe;
mod pool;
mod segment;
mod stream;
mod sync;

pub use config::{DEFAULT_SEGMENT_COUNT, DEFAULT_SEGMENT_SIZE, PipeConfig};
pub use error::{PipeError, Result};
pub use pipe::{Pipe, PipeReader, PipeStats, PipeWriter};
pub use pool::{PoolStats, SegmentPool};
pub use segment::Segment;
