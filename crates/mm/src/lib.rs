//! 内存管理子系统
//!
//! 提供用户 mmap 映射、按需调页、时钟算法页面置换和交换区管理。
//!
//! # 组成
//!
//! - [`frame_allocator`]: 物理帧池与帧内容
//! - [`swap`]: 交换区槽位位图
//! - [`replacement`]: 驻留集与时钟算法
//! - [`memory_space`]: 地址空间与全局映射表
//! - [`page_table`]: 用户页表与错误类型
//! - [`paging`]: 把以上组件组合起来的 [`PagingSystem`]
//!
//! # 架构解耦
//!
//! 通过 trait 抽象与内核其余部分解耦：
//! - [`MmConfig`]: 内存布局常量
//! - [`SwapDevice`]: 交换设备
//! - [`MmFile`] / [`MmInode`] / [`MmFdTable`]: 文件映射
//!
//! 使用全局实例前必须调用 [`register_config`] 注册配置，再调用 [`init_paging`]。

#![no_std]

extern crate alloc;

mod config;
mod file;

pub mod address;
pub mod frame_allocator;
pub mod memory_space;
pub mod page_table;
pub mod paging;
pub mod replacement;
pub mod swap;

#[cfg(test)]
mod tests;

/// 进程标识
pub type Pid = usize;

pub use config::{
    DEFAULT_MMAP_BASE, DEFAULT_REGION_CAPACITY, MmConfig, PAGE_SIZE, mm_config, register_config,
    try_mm_config,
};
pub use file::{MmFdTable, MmFile, MmInode};

// Re-export 常用类型
pub use address::{AlignOps, UsizeConvert, Vaddr, Vpn, VpnRange};
pub use frame_allocator::{FrameId, FrameStats};
pub use memory_space::{MemorySpace, Region, RegionState};
pub use page_table::{PageState, PagingError, PagingResult, PteFlags};
pub use paging::{AccessKind, PagingSystem, init_paging, paging};
pub use swap::{SwapDevice, SwapSlot};
