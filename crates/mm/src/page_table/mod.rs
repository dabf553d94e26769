//! 页表模块
//!
//! 本模块提供用户页表的映射、换出、换入、解除映射和翻译等操作，
//! 以及分页子系统统一使用的错误类型 [`PagingError`]。
mod entry;
mod table;

pub use entry::*;
pub use table::*;

use uapi::errno::{EACCES, EBADF, EFAULT, EINVAL, EIO, EMFILE, ENOMEM, ENOSPC};

/// 分页操作中可能发生的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// 虚拟地址未被映射
    NotMapped,
    /// 虚拟地址已被映射
    AlreadyMapped,
    /// 提供了无效的地址（未对齐或越出 mmap 窗口）
    InvalidAddress,
    /// 长度、保护位或标志组合无效
    InvalidArgument,
    /// 文件描述符无效或文件不能被映射
    BadFile,
    /// 文件打开方式不允许所请求的访问
    PermissionDenied,
    /// 映射表已满
    NoCapacity,
    /// 交换区没有空闲槽位
    SwapFull,
    /// 没有空闲帧且无法换出任何页
    OutOfMemory,
    /// 访问的地址不属于任何映射区域
    SegmentationFault,
    /// 向只读区域写入
    ProtectionViolation,
    /// 交换设备或文件读写失败
    IoError,
}

impl PagingError {
    /// 转换为对应的 errno（负值约定由调用方处理）
    pub fn to_errno(self) -> i32 {
        match self {
            PagingError::NotMapped
            | PagingError::AlreadyMapped
            | PagingError::InvalidAddress
            | PagingError::InvalidArgument => EINVAL,
            PagingError::BadFile => EBADF,
            PagingError::PermissionDenied => EACCES,
            PagingError::NoCapacity => EMFILE,
            PagingError::OutOfMemory => ENOMEM,
            PagingError::SwapFull => ENOSPC,
            PagingError::SegmentationFault | PagingError::ProtectionViolation => EFAULT,
            PagingError::IoError => EIO,
        }
    }

    /// 缺页处理返回此错误时，触发缺页的进程应被终止
    pub fn kills_process(self) -> bool {
        matches!(
            self,
            PagingError::SegmentationFault
                | PagingError::ProtectionViolation
                | PagingError::OutOfMemory
                | PagingError::IoError
        )
    }
}

impl core::fmt::Display for PagingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            PagingError::NotMapped => "address not mapped",
            PagingError::AlreadyMapped => "address already mapped",
            PagingError::InvalidAddress => "invalid address",
            PagingError::InvalidArgument => "invalid argument",
            PagingError::BadFile => "bad file",
            PagingError::PermissionDenied => "permission denied",
            PagingError::NoCapacity => "region table full",
            PagingError::SwapFull => "no free swap slot",
            PagingError::OutOfMemory => "out of memory",
            PagingError::SegmentationFault => "segmentation fault",
            PagingError::ProtectionViolation => "write to read-only region",
            PagingError::IoError => "I/O error",
        };
        f.write_str(msg)
    }
}

/// 分页操作的结果类型
pub type PagingResult<T> = Result<T, PagingError>;
