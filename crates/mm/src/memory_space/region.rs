//! 映射区域与映射表
//!
//! 映射表是一个固定容量的槽位数组，所有进程共用。空槽位为 `None`，
//! 非空槽位处于 [`RegionState::Reserved`]（尚未填充）或
//! [`RegionState::Populated`]（每一页都有驻留帧或交换槽）状态。

use alloc::vec::Vec;
use uapi::mm::{MapFlags, ProtFlags};

use super::MmapFile;
use crate::Pid;
use crate::address::{Vaddr, Vpn, VpnRange};
use crate::config::PAGE_SIZE;
use crate::page_table::{PagingError, PagingResult, PteFlags};

/// 映射表槽位编号
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct RegionId(pub usize);

/// 映射区域的填充状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// 已登记，页尚未分配
    Reserved,
    /// 每一页都已驻留或已换出
    Populated,
}

/// 映射区域描述符
#[derive(Debug, Clone)]
pub struct Region {
    /// 文件映射信息，匿名映射为 `None`
    pub file: Option<MmapFile>,
    /// 覆盖的页
    pub range: VpnRange,
    /// 保护位
    pub prot: ProtFlags,
    /// 映射标志
    pub flags: MapFlags,
    /// 所属进程
    pub owner: Pid,
    /// 填充状态
    pub state: RegionState,
}

impl Region {
    /// 起始地址
    pub fn base(&self) -> Vaddr {
        self.range.start().start_addr()
    }

    /// 长度（字节）
    pub fn len(&self) -> usize {
        self.range.len() * PAGE_SIZE
    }

    /// 是否为空区域
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// 是否包含地址
    pub fn contains(&self, addr: Vaddr) -> bool {
        self.range.contains(addr.floor())
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.prot.contains(ProtFlags::WRITE)
    }

    /// 页在区域内的序号
    pub fn page_index(&self, vpn: Vpn) -> usize {
        vpn.0 - self.range.start().0
    }

    /// 是否为同一个映射（槽位可能已被释放后复用）
    pub fn same_mapping(&self, other: &Region) -> bool {
        self.owner == other.owner && self.range == other.range
    }

    /// 区域内页表项的权限
    pub fn pte_flags(&self) -> PteFlags {
        PteFlags::from_prot(self.prot)
    }
}

/// 全局映射表
#[derive(Debug)]
pub struct RegionTable {
    slots: Vec<Option<Region>>,
}

impl RegionTable {
    /// 创建容量为 `capacity` 的空表
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 非空槽位数
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// 是否没有任何映射
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// 放入第一个空槽位
    ///
    /// # 错误
    /// 表满时返回 [`PagingError::NoCapacity`]
    pub fn insert(&mut self, region: Region) -> PagingResult<RegionId> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(PagingError::NoCapacity)?;
        self.slots[idx] = Some(region);
        Ok(RegionId(idx))
    }

    /// 取出槽位中的区域，槽位变为空
    pub fn remove(&mut self, id: RegionId) -> Option<Region> {
        self.slots.get_mut(id.0)?.take()
    }

    /// 查询槽位
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.slots.get(id.0)?.as_ref()
    }

    /// 可变查询槽位
    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// 查找 `owner` 起始地址为 `base` 的区域
    pub fn find_by_base(&self, owner: Pid, base: Vaddr) -> Option<RegionId> {
        self.iter()
            .find(|(_, r)| r.owner == owner && r.base() == base)
            .map(|(id, _)| id)
    }

    /// 查找 `owner` 包含 `addr` 的区域
    pub fn find_containing(&self, owner: Pid, addr: Vaddr) -> Option<(RegionId, &Region)> {
        self.iter().find(|(_, r)| r.owner == owner && r.contains(addr))
    }

    /// `owner` 是否有区域与 `range` 相交
    pub fn overlaps(&self, owner: Pid, range: &VpnRange) -> bool {
        self.iter()
            .any(|(_, r)| r.owner == owner && r.range.overlaps(range))
    }

    /// 在 `window` 内为 `owner` 找到第一段长度为 `pages` 的空闲范围
    pub fn find_free_range(&self, owner: Pid, window: VpnRange, pages: usize) -> Option<VpnRange> {
        let mut current = window.start();

        while current.0.checked_add(pages)? <= window.end().0 {
            let candidate = VpnRange::from_start_len(current, pages);

            // 跳到所有冲突区域中最靠后的结束位置
            let next_start = self
                .iter()
                .filter(|(_, r)| r.owner == owner && r.range.overlaps(&candidate))
                .map(|(_, r)| r.range.end())
                .max();

            match next_start {
                Some(next) => current = next,
                None => return Some(candidate),
            }
        }

        None
    }

    /// `owner` 的所有区域
    pub fn owned_by(&self, owner: Pid) -> Vec<RegionId> {
        self.iter()
            .filter(|(_, r)| r.owner == owner)
            .map(|(id, _)| id)
            .collect()
    }

    /// 遍历所有非空槽位
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &Region)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (RegionId(i), r)))
    }
}
