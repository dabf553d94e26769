//! 页码抽象模块
//!
//! 页码是地址空间中页 (Page) 的索引，[`VpnRange`] 表示一段左闭右开的连续页码。

use super::{AlignOps, UsizeConvert, Vaddr};
use crate::config::PAGE_SIZE;

/// 虚拟页号
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct Vpn(pub usize);

impl UsizeConvert for Vpn {
    fn from_usize(value: usize) -> Self {
        Self(value)
    }

    fn as_usize(&self) -> usize {
        self.0
    }
}

impl Vpn {
    /// 将地址转换为页码 (向下取整)
    pub fn from_addr_floor(addr: Vaddr) -> Self {
        Self(addr.align_down_to_page().as_usize() / PAGE_SIZE)
    }

    /// 页的起始地址
    pub fn start_addr(self) -> Vaddr {
        Vaddr(self.0 * PAGE_SIZE)
    }

    /// 页的结束地址 (即下一页的起始地址)
    pub fn end_addr(self) -> Vaddr {
        Vaddr((self.0 + 1) * PAGE_SIZE)
    }

    /// 向后偏移 `pages` 页
    pub fn offset(self, pages: usize) -> Self {
        Self(self.0 + pages)
    }
}

/// 连续虚拟页号范围 `[start, end)`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct VpnRange {
    start: Vpn,
    end: Vpn,
}

impl VpnRange {
    /// 创建范围，要求 `start <= end`
    pub fn new(start: Vpn, end: Vpn) -> Self {
        debug_assert!(start <= end, "VpnRange::new: start > end");
        Self { start, end }
    }

    /// 从起始页号和页数创建范围
    pub fn from_start_len(start: Vpn, pages: usize) -> Self {
        Self::new(start, start.offset(pages))
    }

    /// 起始页号
    pub fn start(&self) -> Vpn {
        self.start
    }

    /// 结束页号（不包含）
    pub fn end(&self) -> Vpn {
        self.end
    }

    /// 页数
    pub fn len(&self) -> usize {
        self.end.0 - self.start.0
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 是否包含页号
    pub fn contains(&self, vpn: Vpn) -> bool {
        self.start <= vpn && vpn < self.end
    }

    /// 是否完全包含另一个范围
    pub fn contains_range(&self, other: &VpnRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// 两个范围是否相交
    pub fn overlaps(&self, other: &VpnRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// 按顺序遍历范围内的页号
    pub fn iter(&self) -> <Self as IntoIterator>::IntoIter {
        (*self).into_iter()
    }
}

impl IntoIterator for VpnRange {
    type Item = Vpn;
    type IntoIter = core::iter::Map<core::ops::Range<usize>, fn(usize) -> Vpn>;

    fn into_iter(self) -> Self::IntoIter {
        (self.start.0..self.end.0).map(Vpn as fn(usize) -> Vpn)
    }
}
