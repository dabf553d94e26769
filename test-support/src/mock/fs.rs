//! 文件的 Mock 实现
//!
//! 注意：这里不直接依赖 `mm` crate（避免循环依赖）。
//! `mm` crate 在 `cfg(test)` 下为这些类型实现 `MmFile` / `MmInode`。

use std::sync::{Arc, Mutex};

/// 内存中的文件
pub struct MockFile {
    data: Mutex<Vec<u8>>,
    pub readable: bool,
    pub writable: bool,
    pub regular: bool,
}

impl MockFile {
    /// 以读写方式打开的普通文件
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
            readable: true,
            writable: true,
            regular: true,
        }
    }

    /// 以只读方式打开的普通文件
    pub fn read_only(data: Vec<u8>) -> Self {
        Self {
            writable: false,
            ..Self::new(data)
        }
    }

    /// 非普通文件（例如管道或设备）
    pub fn non_regular() -> Self {
        Self {
            regular: false,
            ..Self::new(Vec::new())
        }
    }

    /// 从 offset 开始读，返回实际读取的字节数
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        if offset >= data.len() {
            return 0;
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }

    /// 覆盖文件内容
    pub fn set_contents(&self, contents: Vec<u8>) {
        *self.data.lock().unwrap() = contents;
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 进程打开的文件句柄
///
/// 读写权限沿用底层 [`MockFile`] 的设置。
pub struct MockOpenFile {
    pub inode: Arc<MockFile>,
}

impl MockOpenFile {
    pub fn new(inode: Arc<MockFile>) -> Arc<Self> {
        Arc::new(Self { inode })
    }

    pub fn readable(&self) -> bool {
        self.inode.readable
    }

    pub fn writable(&self) -> bool {
        self.inode.writable
    }
}
