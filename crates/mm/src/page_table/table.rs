//! 用户页表
//!
//! 以页号为键的有序表。所有状态转换都要求调用方给出期望的旧状态，
//! 旧状态不符时返回错误而不修改页表，这样并发路径可以在持锁后重新确认。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{PageSlot, PageState, PagingError, PagingResult, PteFlags};
use crate::address::{Vpn, VpnRange};
use crate::frame_allocator::FrameId;
use crate::swap::SwapSlot;

/// 进程的用户页表
#[derive(Debug, Default)]
pub struct PageTable {
    entries: BTreeMap<Vpn, PageSlot>,
}

impl PageTable {
    /// 创建空页表
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 查询页表项
    pub fn get(&self, vpn: Vpn) -> Option<PageSlot> {
        self.entries.get(&vpn).copied()
    }

    /// 查询页状态
    pub fn state(&self, vpn: Vpn) -> PageState {
        self.get(vpn).into()
    }

    /// 将页映射到物理帧
    ///
    /// # 错误
    /// 页表项已存在时返回 [`PagingError::AlreadyMapped`]
    pub fn map(&mut self, vpn: Vpn, frame: FrameId, flags: PteFlags) -> PagingResult<()> {
        if self.entries.contains_key(&vpn) {
            return Err(PagingError::AlreadyMapped);
        }
        self.entries.insert(
            vpn,
            PageSlot::Resident {
                frame,
                flags: flags.permission(),
            },
        );
        Ok(())
    }

    /// 把驻留在 `frame` 的页改为指向交换槽 `slot`
    ///
    /// 保留权限位，清除访问位和脏位。
    pub fn swap_out(&mut self, vpn: Vpn, frame: FrameId, slot: SwapSlot) -> PagingResult<()> {
        let entry = self.entries.get_mut(&vpn).ok_or(PagingError::NotMapped)?;
        match *entry {
            PageSlot::Resident { frame: f, flags } if f == frame => {
                *entry = PageSlot::Swapped {
                    slot,
                    flags: flags.permission(),
                };
                Ok(())
            }
            _ => Err(PagingError::NotMapped),
        }
    }

    /// 把换出到 `slot` 的页改为驻留在 `frame`，返回恢复的权限
    pub fn swap_in(&mut self, vpn: Vpn, slot: SwapSlot, frame: FrameId) -> PagingResult<PteFlags> {
        let entry = self.entries.get_mut(&vpn).ok_or(PagingError::NotMapped)?;
        match *entry {
            PageSlot::Swapped { slot: s, flags } if s == slot => {
                *entry = PageSlot::Resident { frame, flags };
                Ok(flags)
            }
            _ => Err(PagingError::NotMapped),
        }
    }

    /// 删除页表项并返回其内容
    pub fn unmap(&mut self, vpn: Vpn) -> PagingResult<PageSlot> {
        self.entries.remove(&vpn).ok_or(PagingError::NotMapped)
    }

    /// 模拟一次用户访问
    ///
    /// 页驻留且权限允许时设置访问位（写访问同时设置脏位）并返回物理帧，
    /// 否则返回 `None`，调用方应当走缺页处理。
    pub fn touch(&mut self, vpn: Vpn, write: bool) -> Option<FrameId> {
        match self.entries.get_mut(&vpn)? {
            PageSlot::Resident { frame, flags } if flags.permits(write) => {
                flags.insert(PteFlags::ACCESSED);
                if write {
                    flags.insert(PteFlags::DIRTY);
                }
                Some(*frame)
            }
            _ => None,
        }
    }

    /// 页是否驻留且用户可访问
    pub fn is_user_resident(&self, vpn: Vpn) -> bool {
        matches!(
            self.entries.get(&vpn),
            Some(PageSlot::Resident { flags, .. }) if flags.is_user_accessible()
        )
    }

    /// 读取并清除访问位，返回清除前的值
    pub fn test_and_clear_accessed(&mut self, vpn: Vpn) -> bool {
        match self.entries.get_mut(&vpn) {
            Some(PageSlot::Resident { flags, .. }) => {
                let accessed = flags.contains(PteFlags::ACCESSED);
                flags.remove(PteFlags::ACCESSED);
                accessed
            }
            _ => false,
        }
    }

    /// 页表项数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 驻留页数量
    pub fn resident_pages(&self) -> usize {
        self.entries.values().filter(|e| e.frame().is_some()).count()
    }

    /// 范围内所有存在页表项的页号
    pub fn mapped_in(&self, range: &VpnRange) -> Vec<Vpn> {
        if range.is_empty() {
            return Vec::new();
        }
        self.entries
            .range(range.start()..range.end())
            .map(|(vpn, _)| *vpn)
            .collect()
    }

    /// 按页号顺序遍历页表项
    pub fn iter(&self) -> impl Iterator<Item = (Vpn, PageSlot)> + '_ {
        self.entries.iter().map(|(vpn, slot)| (*vpn, *slot))
    }
}
