//! mmap 文件映射信息

use alloc::sync::Arc;

use crate::MmFile;
use crate::config::PAGE_SIZE;
use crate::page_table::{PagingError, PagingResult};

/// 文件映射信息
#[derive(Clone)]
pub struct MmapFile {
    /// 文件对象引用（用于权限检查和获取 Inode）
    pub file: Arc<dyn MmFile>,
    /// 文件偏移量（字节）
    pub offset: usize,
}

impl MmapFile {
    /// 读取映射区域第 `page_index` 页对应的文件内容
    ///
    /// 文件在这一页内提前结束时，`buf` 余下部分保持不变。
    pub fn read_page(&self, page_index: usize, buf: &mut [u8]) -> PagingResult<usize> {
        let inode = self.file.inode().map_err(|_| PagingError::BadFile)?;
        let file_offset = page_index
            .checked_mul(PAGE_SIZE)
            .and_then(|off| off.checked_add(self.offset))
            .ok_or(PagingError::InvalidArgument)?;
        let read = inode
            .read_at(file_offset, buf)
            .map_err(|_| PagingError::IoError)?;
        if read < buf.len() {
            log::warn!(
                "mmap: short read at file offset {:#x}, got {} of {} bytes",
                file_offset,
                read,
                buf.len()
            );
        }
        Ok(read)
    }
}

// 手动实现 Debug，因为 dyn MmFile 没有实现 Debug
impl core::fmt::Debug for MmapFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MmapFile")
            .field("file", &"<dyn MmFile>")
            .field("offset", &self.offset)
            .finish()
    }
}
