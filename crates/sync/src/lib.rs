//! 同步原语
//!
//! 为内存管理子系统提供两类锁：
//!
//! - [`SpinLock`]：持锁期间关闭本地中断，用于可能在缺页（陷入）上下文中被访问的全局表
//!   （帧池、交换区位图、驻留集、映射区域表）。
//! - [`SpinMutex`]：基于 `lock_api` 的普通自旋互斥锁，不触碰中断状态，用于每个地址空间的页表。
//!
//! # 架构依赖
//!
//! 中断开关通过 [`ArchOps`] 抽象，使用前必须调用 [`register_arch_ops`] 注册实现。

#![no_std]

mod intr_guard;
mod spin_lock;
mod spin_mutex;

pub use intr_guard::IntrGuard;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use spin_mutex::{RawSpin, SpinMutex, SpinMutexGuard};

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关操作
///
/// 由内核主体实现并注册，提供本地中断的开关。
pub trait ArchOps: Send + Sync {
    /// 关闭本地中断并返回之前的中断状态
    ///
    /// # Safety
    /// 返回值只能交给 [`ArchOps::restore_interrupts`]。
    unsafe fn read_and_disable_interrupts(&self) -> usize;

    /// 恢复中断状态
    ///
    /// # Safety
    /// `flags` 必须来自之前的 [`ArchOps::read_and_disable_interrupts`]。
    unsafe fn restore_interrupts(&self, flags: usize);
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在其它 CPU 启动前调用，且只能调用一次。
pub unsafe fn register_arch_ops(ops: &'static dyn ArchOps) {
    let ptr = ops as *const dyn ArchOps;
    // SAFETY: 胖指针布局为 (data, vtable)
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn ArchOps, (usize, usize)>(ptr) };
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
    ARCH_OPS_DATA.store(data, Ordering::Release);
}

/// 获取已注册的架构操作实现
///
/// # Panics
/// 尚未注册时 panic（测试构建下回退到 Mock 实现）。
#[inline]
pub(crate) fn arch_ops() -> &'static dyn ArchOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    if data == 0 {
        #[cfg(test)]
        {
            extern crate test_support;
            return &test_support::mock::arch::MOCK_ARCH_OPS;
        }
        #[cfg(not(test))]
        panic!("sync: ArchOps not registered, call register_arch_ops first");
    }
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    // SAFETY: data 与 vtable 来自 register_arch_ops
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchOps>((data, vtable)) }
}
