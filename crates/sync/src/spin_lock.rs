//! 关中断自旋锁
//!
//! 缺页处理可能发生在任意 CPU、任意时刻（包括开中断期间），
//! 被缺页路径访问的全局表都用 [`SpinLock`] 保护。

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::intr_guard::IntrGuard;

/// 持锁期间关闭本地中断的自旋锁。
///
/// 不可重入：同一 CPU 上嵌套获取同一把锁会死锁。
#[derive(Debug)]
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: 对 data 的访问由 locked 串行化
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// 创建一把未上锁的锁
    pub const fn new(data: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// 关中断并自旋直到拿到锁
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let intr_guard = IntrGuard::new();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        SpinLockGuard {
            lock: self,
            _intr_guard: intr_guard,
        }
    }

    /// 尝试获取锁，失败时立即恢复中断状态并返回 None
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let intr_guard = IntrGuard::new();
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard {
                lock: self,
                _intr_guard: intr_guard,
            })
    }

    /// 锁当前是否被占用（仅用于调试）
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// 通过独占引用直接访问数据，无需上锁
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// 消耗锁并取出数据
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// [`SpinLock`] 的 RAII 保护器
///
/// drop 顺序：先释放锁标志，再由 `_intr_guard` 恢复中断。
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    _intr_guard: IntrGuard,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: 持有锁
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: 持有锁
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_and_modify() {
        let lock = SpinLock::new(0usize);
        {
            let mut guard = lock.lock();
            *guard += 1;
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_into_inner() {
        let mut lock = SpinLock::new(7u32);
        *lock.get_mut() = 9;
        assert_eq!(lock.into_inner(), 9);
    }
}
