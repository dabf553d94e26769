//! 块设备的 Mock 实现（内存模拟的交换分区）

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// 内存模拟的块设备
pub struct MockBlockDevice {
    block_size: usize,
    total_blocks: usize,
    data: Mutex<Vec<u8>>,
    /// 读块次数
    pub reads: AtomicUsize,
    /// 写块次数
    pub writes: AtomicUsize,
    /// 置位后所有读写都返回失败
    pub fail_io: AtomicBool,
}

impl MockBlockDevice {
    pub fn new(block_size: usize, total_blocks: usize) -> Self {
        Self {
            block_size,
            total_blocks,
            data: Mutex::new(vec![0u8; block_size * total_blocks]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_io: AtomicBool::new(false),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    pub fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        if self.fail_io.load(Ordering::Relaxed)
            || block_id >= self.total_blocks
            || buf.len() != self.block_size
        {
            return false;
        }
        let data = self.data.lock().unwrap();
        let start = block_id * self.block_size;
        buf.copy_from_slice(&data[start..start + self.block_size]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        if self.fail_io.load(Ordering::Relaxed)
            || block_id >= self.total_blocks
            || buf.len() != self.block_size
        {
            return false;
        }
        let mut data = self.data.lock().unwrap();
        let start = block_id * self.block_size;
        data[start..start + self.block_size].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// 直接查看某个块的内容（用于断言）
    pub fn block_contents(&self, block_id: usize) -> Vec<u8> {
        let data = self.data.lock().unwrap();
        let start = block_id * self.block_size;
        data[start..start + self.block_size].to_vec()
    }
}
