//! 中断保护器
//!
//! 关中断只挡住本地 CPU 上的中断重入，跨 CPU 的互斥仍然依赖自旋锁。

use crate::arch_ops;

/// RAII 中断保护器：创建时关闭本地中断，drop 时恢复原状态。
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 关闭本地中断并记录之前的状态
    pub fn new() -> Self {
        // SAFETY: flags 只会在 drop 中交还给 restore_interrupts
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };
        IntrGuard { flags }
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntrGuard {
    fn drop(&mut self) {
        // SAFETY: flags 由 new 保存
        unsafe { arch_ops().restore_interrupts(self.flags) };
    }
}
