//! 帧分配器模块
//!
//! 本模块管理可分配给用户页的物理帧。
//!
//! ## 分配策略（空闲栈 + 位图）
//!
//! - **free**：空闲帧栈，分配和释放都是 O(1)
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配），用于发现重复释放
//!
//! 初始化时帧按编号逆序入栈，因此最先分配出去的是 0 号帧；
//! 释放的帧压回栈顶，下一次分配会立即复用它。
//!
//! ## 帧内容
//!
//! 帧的内容保存在 [`PhysicalMemory`] 中，每帧一把锁。释放帧时整帧填充
//! [`FREE_FRAME_FILL`]，悬空引用读到的将是明显的垃圾数据而不是旧内容。
//!
//! # 模块组成
//!
//! - [`FrameId`]：物理帧句柄。
//! - [`FramePool`]：空闲帧池。
//! - [`PhysicalMemory`]：帧内容存储。
//! - [`FrameStats`]：帧使用统计。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use sync::SpinMutex;

use crate::config::PAGE_SIZE;
use crate::page_table::{PagingError, PagingResult};

/// 释放帧时的填充字节
pub const FREE_FRAME_FILL: u8 = 0x01;

// ============================================================================
// FrameId - 物理帧句柄
// ============================================================================

/// 物理帧句柄
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct FrameId(usize);

impl FrameId {
    /// 由帧编号构造
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// 帧编号
    pub const fn index(self) -> usize {
        self.0
    }
}

// ============================================================================
// FramePool - 空闲帧池
// ============================================================================

/// 帧使用统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// 帧总数
    pub total: usize,
    /// 空闲帧数
    pub free: usize,
    /// 作为用户驻留页的帧数
    pub resident: usize,
    /// 由内核直接持有的帧数
    pub kernel: usize,
}

/// 空闲帧池
#[derive(Debug)]
pub struct FramePool {
    free: Vec<FrameId>,
    bitmap: Vec<u64>,
    total: usize,
}

impl FramePool {
    /// 创建包含 `total` 个空闲帧的帧池
    pub fn new(total: usize) -> Self {
        Self {
            free: (0..total).rev().map(FrameId).collect(),
            bitmap: vec![0; total.div_ceil(64)],
            total,
        }
    }

    /// 分配一个帧，池空时返回 `None`
    pub fn alloc(&mut self) -> Option<FrameId> {
        let frame = self.free.pop()?;
        debug_assert!(!self.is_allocated(frame));
        self.mark(frame, true);
        Some(frame)
    }

    /// 归还一个帧
    ///
    /// # 错误
    /// 帧编号越界或重复释放时返回 [`PagingError::InvalidAddress`]，帧池不变
    pub fn dealloc(&mut self, frame: FrameId) -> PagingResult<()> {
        if frame.0 >= self.total || !self.is_allocated(frame) {
            log::error!("frame_pool: bad free of frame {}", frame.0);
            return Err(PagingError::InvalidAddress);
        }
        self.mark(frame, false);
        self.free.push(frame);
        Ok(())
    }

    /// 帧是否已分配
    pub fn is_allocated(&self, frame: FrameId) -> bool {
        frame.0 < self.total && self.bitmap[frame.0 / 64] & (1 << (frame.0 % 64)) != 0
    }

    /// 空闲帧数
    pub fn free_frames(&self) -> usize {
        self.free.len()
    }

    /// 已分配帧数
    pub fn allocated_frames(&self) -> usize {
        self.total - self.free.len()
    }

    /// 帧总数
    pub fn total_frames(&self) -> usize {
        self.total
    }

    fn mark(&mut self, frame: FrameId, allocated: bool) {
        let (word, bit) = (frame.0 / 64, frame.0 % 64);
        if allocated {
            self.bitmap[word] |= 1 << bit;
        } else {
            self.bitmap[word] &= !(1 << bit);
        }
    }
}

// ============================================================================
// PhysicalMemory - 帧内容存储
// ============================================================================

/// 帧内容存储
///
/// 每帧一把锁，锁只在拷贝数据期间持有，不能在持有帧锁时再获取页表锁。
pub struct PhysicalMemory {
    frames: Box<[SpinMutex<Box<[u8]>>]>,
}

impl PhysicalMemory {
    /// 创建 `count` 个帧，初始内容为释放填充
    pub fn new(count: usize) -> Self {
        let frames = (0..count)
            .map(|_| SpinMutex::new(vec![FREE_FRAME_FILL; PAGE_SIZE].into_boxed_slice()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { frames }
    }

    /// 帧数量
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, frame: FrameId) -> PagingResult<&SpinMutex<Box<[u8]>>> {
        self.frames.get(frame.0).ok_or(PagingError::InvalidAddress)
    }

    /// 以只读方式访问帧内容
    pub fn with_frame<R>(&self, frame: FrameId, f: impl FnOnce(&[u8]) -> R) -> PagingResult<R> {
        let data = self.frame(frame)?.lock();
        Ok(f(&data))
    }

    /// 以可写方式访问帧内容
    pub fn with_frame_mut<R>(
        &self,
        frame: FrameId,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> PagingResult<R> {
        let mut data = self.frame(frame)?.lock();
        Ok(f(&mut data))
    }

    /// 整帧填充 `byte`
    pub fn fill(&self, frame: FrameId, byte: u8) -> PagingResult<()> {
        self.with_frame_mut(frame, |data| data.fill(byte))
    }

    /// 从帧内 `offset` 处读出 `out.len()` 字节
    pub fn read(&self, frame: FrameId, offset: usize, out: &mut [u8]) -> PagingResult<()> {
        let end = offset
            .checked_add(out.len())
            .filter(|end| *end <= PAGE_SIZE)
            .ok_or(PagingError::InvalidAddress)?;
        self.with_frame(frame, |data| out.copy_from_slice(&data[offset..end]))
    }

    /// 向帧内 `offset` 处写入 `src`
    pub fn write(&self, frame: FrameId, offset: usize, src: &[u8]) -> PagingResult<()> {
        let end = offset
            .checked_add(src.len())
            .filter(|end| *end <= PAGE_SIZE)
            .ok_or(PagingError::InvalidAddress)?;
        self.with_frame_mut(frame, |data| data[offset..end].copy_from_slice(src))
    }
}
