//! 基于 `lock_api` 的自旋互斥锁
//!
//! 不改变中断状态。页表锁的持有者在持锁期间不会再去等待帧池或交换区，
//! 所以不需要关中断。

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// 不带中断保护的原始自旋锁
pub struct RawSpin {
    locked: AtomicBool,
}

// SAFETY: lock 成功返回后其它线程的 lock/try_lock 都会失败，直到 unlock
unsafe impl lock_api::RawMutex for RawSpin {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpin {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = lock_api::GuardSend;

    fn lock(&self) {
        while !self.try_lock() {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// 自旋互斥锁
pub type SpinMutex<T> = lock_api::Mutex<RawSpin, T>;

/// [`SpinMutex`] 的 RAII 保护器
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpin, T>;
