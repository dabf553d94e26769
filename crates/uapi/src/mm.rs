//! 内存映射系统调用（mmap / munmap）的用户态 ABI

use bitflags::bitflags;

bitflags! {
    /// mmap 的保护标志
    ///
    /// 只接受 `READ` 和 `READ | WRITE` 两种组合，没有只写或可执行映射。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProtFlags: u32 {
        /// 可读
        const READ = 0x1;
        /// 可写
        const WRITE = 0x2;
    }
}

bitflags! {
    /// mmap 的映射标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        /// 匿名映射（不关联文件，fd 必须为 -1）
        const ANONYMOUS = 0x1;
        /// 立即填充整个映射区域，而不是等到第一次缺页
        const POPULATE = 0x2;
    }
}

impl ProtFlags {
    /// 是否为合法的保护组合（只读或读写）
    pub fn is_valid_mapping(self) -> bool {
        self == ProtFlags::READ || self == ProtFlags::READ | ProtFlags::WRITE
    }
}

impl MapFlags {
    /// 是否为匿名映射
    pub fn is_anonymous(self) -> bool {
        self.contains(MapFlags::ANONYMOUS)
    }

    /// 是否要求立即填充
    pub fn is_populate(self) -> bool {
        self.contains(MapFlags::POPULATE)
    }
}

/// mmap 失败时的返回值
///
/// 映射基址总是位于 mmap 窗口内，因此 0 不会与合法地址冲突。
pub const MAP_FAILED: usize = 0;

/// munmap 成功时的返回值
pub const MUNMAP_OK: isize = 1;

/// munmap 失败时的返回值
pub const MUNMAP_FAILED: isize = -1;

/// 匿名映射使用的文件描述符
pub const ANON_FD: i32 = -1;
