//! 地址抽象模块
//!
//! 提供用户虚拟地址 [`Vaddr`]、虚拟页号 [`Vpn`] 以及连续页号范围 [`VpnRange`]。
//! 分页子系统只处理用户虚拟地址，物理侧由帧句柄 [`FrameId`](crate::FrameId) 表示。

mod page_num;

pub use page_num::{Vpn, VpnRange};

use crate::config::PAGE_SIZE;

/// 与 usize 之间的相互转换
pub trait UsizeConvert: Copy {
    /// 从 usize 构造
    fn from_usize(value: usize) -> Self;

    /// 转换为 usize
    fn as_usize(&self) -> usize;
}

/// 按页对齐相关的操作
pub trait AlignOps: UsizeConvert {
    /// 是否页对齐
    fn is_page_aligned(&self) -> bool {
        self.as_usize() % PAGE_SIZE == 0
    }

    /// 向下对齐到页边界
    fn align_down_to_page(&self) -> Self {
        Self::from_usize(self.as_usize() & !(PAGE_SIZE - 1))
    }

    /// 向上对齐到页边界，溢出时返回 `None`
    fn align_up_to_page(&self) -> Option<Self> {
        self.as_usize()
            .checked_add(PAGE_SIZE - 1)
            .map(|v| Self::from_usize(v & !(PAGE_SIZE - 1)))
    }

    /// 页内偏移
    fn page_offset(&self) -> usize {
        self.as_usize() & (PAGE_SIZE - 1)
    }
}

/// 用户虚拟地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct Vaddr(pub usize);

impl UsizeConvert for Vaddr {
    fn from_usize(value: usize) -> Self {
        Self(value)
    }

    fn as_usize(&self) -> usize {
        self.0
    }
}

impl AlignOps for Vaddr {}

impl Vaddr {
    /// 地址加上字节偏移，溢出时返回 `None`
    pub fn checked_add(self, bytes: usize) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }

    /// 所在页的页号
    pub fn floor(self) -> Vpn {
        Vpn::from_addr_floor(self)
    }
}

impl core::fmt::LowerHex for Vaddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

/// 字节数向上取整为页数
#[inline]
pub const fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}
