//! 地址空间

use alloc::sync::Arc;
use sync::{SpinMutex, SpinMutexGuard};

use crate::Pid;
use crate::page_table::PageTable;

/// 进程的地址空间
///
/// 只持有用户页表。映射区域登记在全局的 [`RegionTable`](super::RegionTable) 中，
/// 以进程号关联。
#[derive(Debug)]
pub struct MemorySpace {
    pid: Pid,
    table: SpinMutex<PageTable>,
}

impl MemorySpace {
    /// 为进程 `pid` 创建空的地址空间
    pub fn new(pid: Pid) -> Arc<Self> {
        Arc::new(Self {
            pid,
            table: SpinMutex::new(PageTable::new()),
        })
    }

    /// 所属进程
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// 锁住页表
    pub fn table(&self) -> SpinMutexGuard<'_, PageTable> {
        self.table.lock()
    }
}
