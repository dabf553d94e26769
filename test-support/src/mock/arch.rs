//! 架构相关操作的 Mock 实现

use core::sync::atomic::{AtomicBool, Ordering};

/// 中断使能位（与 RISC-V sstatus.SIE 相同）
pub const MOCK_SIE: usize = 0x2;

/// Mock 架构操作
pub struct MockArchOps {
    pub interrupt_state: AtomicBool,
}

impl MockArchOps {
    pub const fn new() -> Self {
        Self {
            interrupt_state: AtomicBool::new(true),
        }
    }

    /// 关中断，返回之前的 sstatus 风格标志
    ///
    /// # Safety
    /// 仅用于测试。
    pub unsafe fn read_and_disable_interrupts(&self) -> usize {
        if self.interrupt_state.swap(false, Ordering::SeqCst) {
            MOCK_SIE
        } else {
            0
        }
    }

    /// 恢复中断状态
    ///
    /// # Safety
    /// 仅用于测试。
    pub unsafe fn restore_interrupts(&self, flags: usize) {
        self.interrupt_state
            .store(flags & MOCK_SIE != 0, Ordering::SeqCst);
    }
}

impl Default for MockArchOps {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();
