//! 同步原语垫片。
//!
//! 常规构建使用 `parking_lot` 的互斥锁与条件变量；以 `--cfg loom` 构建时切换到
//! `loom::sync`，使模型检查能够枚举租借、归还与交接之间的全部调度交错。
//! 两套后端的 API 差异（毒化、`wait` 的签名）统一收敛到 [`lock`] 与 [`wait`]。

#[cfg(not(any(loom, spark_loom)))]
mod imp {
    pub(crate) use parking_lot::{Condvar, Mutex, MutexGuard};
    pub(crate) use std::sync::Arc;

    pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock()
    }

    pub(crate) fn wait<'a, T>(condvar: &Condvar, mut guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        condvar.wait(&mut guard);
        guard
    }
}

#[cfg(any(loom, spark_loom))]
mod imp {
    use std::sync::PoisonError;

    pub(crate) use loom::sync::{Arc, Condvar, Mutex, MutexGuard};

    // 持锁方 panic 后数据仍保持段守恒，直接取回守卫继续工作。
    pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) use imp::{Arc, Condvar, Mutex, lock, wait};
