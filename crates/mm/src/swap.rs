//! 交换区
//!
//! 交换区由一块块设备提供，按页大小划分为槽位。[`SwapStore`] 用位图记录
//! 每个槽位是否被占用（0=空闲，1=占用）。0 号槽位保留不用，
//! 因此有效槽位号总是非零。
//!
//! 设备块大小可以小于页大小（例如 512 字节的扇区），此时一个槽位占用
//! 连续的 `PAGE_SIZE / block_size` 个块。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::PAGE_SIZE;
use crate::page_table::{PagingError, PagingResult};

/// 交换设备接口
///
/// 块设备驱动需要实现此 trait。
pub trait SwapDevice: Send + Sync {
    /// 读取一个块，成功返回 true
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool;

    /// 写入一个块，成功返回 true
    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool;

    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 块总数
    fn total_blocks(&self) -> usize;
}

/// 交换槽号
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct SwapSlot(usize);

impl SwapSlot {
    /// 由槽位编号构造
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// 槽位编号
    pub const fn index(self) -> usize {
        self.0
    }
}

/// 保留的槽位
const RESERVED_SLOT: usize = 0;

/// 交换区
pub struct SwapStore {
    device: Arc<dyn SwapDevice>,
    bitmap: Vec<u64>,
    total_slots: usize,
    used: usize,
    blocks_per_slot: usize,
}

impl SwapStore {
    /// 在 `device` 上创建 `total_slots` 个槽位（含保留的 0 号槽）
    ///
    /// # 错误
    /// 设备块大小不能整除页大小，或设备容量不足时返回 [`PagingError::InvalidArgument`]
    pub fn new(device: Arc<dyn SwapDevice>, total_slots: usize) -> PagingResult<Self> {
        let block_size = device.block_size();
        if block_size == 0 || block_size > PAGE_SIZE || PAGE_SIZE % block_size != 0 {
            log::error!("swap: unsupported block size {}", block_size);
            return Err(PagingError::InvalidArgument);
        }
        let blocks_per_slot = PAGE_SIZE / block_size;
        let needed = total_slots
            .checked_mul(blocks_per_slot)
            .ok_or(PagingError::InvalidArgument)?;
        if needed > device.total_blocks() {
            log::error!(
                "swap: device too small, need {} blocks, have {}",
                needed,
                device.total_blocks()
            );
            return Err(PagingError::InvalidArgument);
        }

        let mut bitmap = vec![0u64; total_slots.div_ceil(64).max(1)];
        bitmap[0] |= 1 << RESERVED_SLOT;
        log::info!(
            "swap: {} slots, {} blocks per slot",
            total_slots.saturating_sub(1),
            blocks_per_slot
        );
        Ok(Self {
            device,
            bitmap,
            total_slots,
            used: 0,
            blocks_per_slot,
        })
    }

    /// 分配一个空闲槽位
    ///
    /// # 错误
    /// 没有空闲槽位时返回 [`PagingError::SwapFull`]
    pub fn allocate_slot(&mut self) -> PagingResult<SwapSlot> {
        for (word_idx, word) in self.bitmap.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = (!*word).trailing_zeros() as usize;
            let index = word_idx * 64 + bit;
            if index >= self.total_slots {
                break;
            }
            *word |= 1 << bit;
            self.used += 1;
            return Ok(SwapSlot(index));
        }
        Err(PagingError::SwapFull)
    }

    /// 释放槽位，返回释放前是否被占用
    ///
    /// 重复释放或释放保留槽位不会改变状态。
    pub fn free(&mut self, slot: SwapSlot) -> bool {
        if slot.0 == RESERVED_SLOT || !self.is_occupied(slot) {
            log::warn!("swap: free of unoccupied slot {}", slot.0);
            return false;
        }
        self.bitmap[slot.0 / 64] &= !(1 << (slot.0 % 64));
        self.used -= 1;
        true
    }

    /// 槽位是否被占用（保留槽位不算）
    pub fn is_occupied(&self, slot: SwapSlot) -> bool {
        slot.0 != RESERVED_SLOT
            && slot.0 < self.total_slots
            && self.bitmap[slot.0 / 64] & (1 << (slot.0 % 64)) != 0
    }

    /// 把一页数据写入槽位
    pub fn write(&self, slot: SwapSlot, page: &[u8]) -> PagingResult<()> {
        self.check_slot(slot, page.len())?;
        let block_size = PAGE_SIZE / self.blocks_per_slot;
        for (i, chunk) in page.chunks(block_size).enumerate() {
            let block = slot.0 * self.blocks_per_slot + i;
            if !self.device.write_block(block, chunk) {
                log::error!("swap: write of block {} failed", block);
                return Err(PagingError::IoError);
            }
        }
        Ok(())
    }

    /// 从槽位读出一页数据
    pub fn read(&self, slot: SwapSlot, page: &mut [u8]) -> PagingResult<()> {
        self.check_slot(slot, page.len())?;
        let block_size = PAGE_SIZE / self.blocks_per_slot;
        for (i, chunk) in page.chunks_mut(block_size).enumerate() {
            let block = slot.0 * self.blocks_per_slot + i;
            if !self.device.read_block(block, chunk) {
                log::error!("swap: read of block {} failed", block);
                return Err(PagingError::IoError);
            }
        }
        Ok(())
    }

    fn check_slot(&self, slot: SwapSlot, len: usize) -> PagingResult<()> {
        if !self.is_occupied(slot) || len != PAGE_SIZE {
            return Err(PagingError::InvalidArgument);
        }
        Ok(())
    }

    /// 已占用槽位数
    pub fn used_slots(&self) -> usize {
        self.used
    }

    /// 可用槽位总数（不含保留槽位）
    pub fn capacity(&self) -> usize {
        self.total_slots.saturating_sub(1)
    }

    /// 空闲槽位数
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.used
    }
}
