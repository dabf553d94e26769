//! 页表项定义
//!
//! 一个页表项要么不存在，要么指向驻留的物理帧，要么指向交换槽。
//! 驻留和换出两种状态都保存权限位，换入时原样恢复。

use bitflags::bitflags;
use uapi::mm::ProtFlags;

use crate::frame_allocator::FrameId;
use crate::swap::SwapSlot;

bitflags! {
    /// 页表项标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PteFlags: u8 {
        /// 可读
        const READ = 1 << 0;
        /// 可写
        const WRITE = 1 << 1;
        /// 用户态可访问
        const USER = 1 << 2;
        /// 自上次清零以来被访问过
        const ACCESSED = 1 << 3;
        /// 自映射以来被写过
        const DIRTY = 1 << 4;
    }
}

impl PteFlags {
    /// 权限相关的位
    pub const PERMISSION_MASK: Self = Self::READ.union(Self::WRITE).union(Self::USER);

    /// 由映射区域的保护位得到用户页的权限
    pub fn from_prot(prot: ProtFlags) -> Self {
        let mut flags = PteFlags::USER | PteFlags::READ;
        if prot.contains(ProtFlags::WRITE) {
            flags |= PteFlags::WRITE;
        }
        flags
    }

    /// 只保留权限位
    pub fn permission(self) -> Self {
        self & Self::PERMISSION_MASK
    }

    /// 用户态可访问
    pub fn is_user_accessible(self) -> bool {
        self.contains(PteFlags::USER | PteFlags::READ)
    }

    /// 是否允许此次访问
    pub fn permits(self, write: bool) -> bool {
        self.is_user_accessible() && (!write || self.contains(PteFlags::WRITE))
    }
}

/// 已存在的页表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    /// 页驻留在物理帧中
    Resident {
        /// 物理帧
        frame: FrameId,
        /// 权限及访问位
        flags: PteFlags,
    },
    /// 页已换出到交换槽
    Swapped {
        /// 交换槽
        slot: SwapSlot,
        /// 换出前的权限
        flags: PteFlags,
    },
}

impl PageSlot {
    /// 页表项的标志位
    pub fn flags(&self) -> PteFlags {
        match *self {
            PageSlot::Resident { flags, .. } | PageSlot::Swapped { flags, .. } => flags,
        }
    }

    /// 驻留时返回物理帧
    pub fn frame(&self) -> Option<FrameId> {
        match *self {
            PageSlot::Resident { frame, .. } => Some(frame),
            PageSlot::Swapped { .. } => None,
        }
    }

    /// 换出时返回交换槽
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match *self {
            PageSlot::Swapped { slot, .. } => Some(slot),
            PageSlot::Resident { .. } => None,
        }
    }
}

/// 一个虚拟页当前的状态，用于查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// 没有页表项
    Absent,
    /// 驻留在物理帧中
    Resident(FrameId),
    /// 换出到交换槽
    Swapped(SwapSlot),
}

impl From<Option<PageSlot>> for PageState {
    fn from(slot: Option<PageSlot>) -> Self {
        match slot {
            None => PageState::Absent,
            Some(PageSlot::Resident { frame, .. }) => PageState::Resident(frame),
            Some(PageSlot::Swapped { slot, .. }) => PageState::Swapped(slot),
        }
    }
}
