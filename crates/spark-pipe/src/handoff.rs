//! 生产者与消费者之间的段交接队列。
//!
//! # 设计概要（How）
//! - 段 FIFO 与 `closed` 标记放在同一把互斥锁下：读取端在锁内同时观察“队列为空”与“已关闭”，
//!   因此关闭之前入队的段一定先于流结束被看到；
//! - 入队与关闭都会唤醒等待中的读取端；入队即发布点，段内 `committed` 的写入经由互斥锁
//!   对出队方可见。

use std::collections::VecDeque;

use crate::{
    segment::Segment,
    sync::{self, Condvar, Mutex},
};

struct HandoffState {
    segments: VecDeque<Segment>,
    closed: bool,
}

pub(crate) struct HandoffQueue {
    state: Mutex<HandoffState>,
    ready: Condvar,
}

impl HandoffQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HandoffState {
                segments: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// 提交一个已填充的段；队列已关闭时原样交还，由调用方负责回收。
    pub(crate) fn push(&self, segment: Segment) -> Result<(), Segment> {
        {
            let mut state = sync::lock(&self.state);
            if state.closed {
                return Err(segment);
            }
            state.segments.push_back(segment);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// 阻塞出队；返回 `None` 表示队列已关闭且全部排空。
    pub(crate) fn pop_blocking(&self) -> Option<Segment> {
        let mut state = sync::lock(&self.state);
        loop {
            if let Some(segment) = state.segments.pop_front() {
                return Some(segment);
            }
            if state.closed {
                return None;
            }
            state = sync::wait(&self.ready, state);
        }
    }

    pub(crate) fn try_pop(&self) -> Option<Segment> {
        sync::lock(&self.state).segments.pop_front()
    }

    /// 关闭队列，仅首次调用返回 `true`。
    pub(crate) fn close(&self) -> bool {
        let first = {
            let mut state = sync::lock(&self.state);
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            self.ready.notify_all();
        }
        first
    }

    pub(crate) fn is_closed(&self) -> bool {
        sync::lock(&self.state).closed
    }

    pub(crate) fn len(&self) -> usize {
        sync::lock(&self.state).segments.len()
    }
}
