//! 文件映射接口 trait 定义

use alloc::sync::Arc;

use crate::Pid;

/// 可用于内存映射读取的 Inode 接口
///
/// 此 trait 抽象了按需调页所需的最小文件 I/O 接口。
pub trait MmInode: Send + Sync {
    /// 从指定偏移读取数据到缓冲区，返回实际读取的字节数
    ///
    /// 越过文件末尾时返回的字节数可以小于 `buf.len()`。
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize>;

    /// 是否为普通文件
    fn is_regular(&self) -> bool;
}

/// 可映射到内存的文件接口
///
/// 内核的打开文件对象需要实现此 trait。
pub trait MmFile: Send + Sync {
    /// 获取底层 Inode 用于读取操作
    fn inode(&self) -> Result<Arc<dyn MmInode>, isize>;

    /// 打开方式是否允许读
    fn readable(&self) -> bool;

    /// 打开方式是否允许写
    fn writable(&self) -> bool;
}

/// 进程文件描述符表的查询接口
///
/// 系统调用层通过它把 `fd` 解析为打开的文件。
pub trait MmFdTable: Send + Sync {
    /// 查找进程 `pid` 的描述符 `fd`，不存在时返回 `None`
    fn get_file(&self, pid: Pid, fd: i32) -> Option<Arc<dyn MmFile>>;
}
