//! 页面置换
//!
//! ## 驻留集
//!
//! [`ResidentSet`] 把所有驻留的用户页按帧组织成一个环形双向链表，
//! 节点直接以帧编号为下标存放在数组中。新页插入到时钟指针之前，
//! 也就是环的尾部。
//!
//! ## 时钟（二次机会）算法
//!
//! 从时钟指针出发选择牺牲页：
//!
//! 1. 第一轮：遍历整个环，跳过内核页；遇到访问位已置位的页时清除访问位
//!    给它第二次机会，遇到第一个访问位为 0 的用户页即选中。
//! 2. 第二轮：第一轮没有选中时（例如所有页都刚被访问过），
//!    选择从时钟指针开始的第一个用户页。
//!
//! 选中后时钟指针移到牺牲页的下一个节点。

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::address::Vpn;
use crate::frame_allocator::FrameId;
use crate::memory_space::MemorySpace;

/// 驻留页的属主：所在地址空间和虚拟页号
#[derive(Clone)]
pub struct FrameOwner {
    /// 所在地址空间
    pub space: Arc<MemorySpace>,
    /// 虚拟页号
    pub vpn: Vpn,
}

impl core::fmt::Debug for FrameOwner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameOwner")
            .field("pid", &self.space.pid())
            .field("vpn", &self.vpn)
            .finish()
    }
}

/// 时钟算法查询页表访问位的接口
pub trait AccessBits {
    /// 页是否为驻留的用户可访问页
    fn is_user_accessible(&mut self, owner: &FrameOwner) -> bool;

    /// 读取并清除访问位，返回清除前的值
    fn test_and_clear_accessed(&mut self, owner: &FrameOwner) -> bool;
}

#[derive(Debug)]
struct Node {
    prev: usize,
    next: usize,
    owner: Option<FrameOwner>,
}

/// 驻留集
#[derive(Debug)]
pub struct ResidentSet {
    nodes: Vec<Node>,
    head: Option<usize>,
    len: usize,
}

impl ResidentSet {
    /// 为 `frames` 个帧创建空的驻留集
    pub fn new(frames: usize) -> Self {
        let nodes = (0..frames)
            .map(|i| Node {
                prev: i,
                next: i,
                owner: None,
            })
            .collect();
        Self {
            nodes,
            head: None,
            len: 0,
        }
    }

    /// 插入到时钟指针之前
    ///
    /// 帧已在驻留集中时返回 false。
    pub fn insert(&mut self, frame: FrameId, owner: FrameOwner) -> bool {
        let idx = frame.index();
        if idx >= self.nodes.len() || self.nodes[idx].owner.is_some() {
            log::error!("resident: frame {} already tracked", idx);
            return false;
        }
        match self.head {
            None => {
                self.nodes[idx].prev = idx;
                self.nodes[idx].next = idx;
                self.head = Some(idx);
            }
            Some(head) => {
                let tail = self.nodes[head].prev;
                self.nodes[idx].prev = tail;
                self.nodes[idx].next = head;
                self.nodes[tail].next = idx;
                self.nodes[head].prev = idx;
            }
        }
        self.nodes[idx].owner = Some(owner);
        self.len += 1;
        true
    }

    /// 从驻留集中摘除帧，返回其属主
    ///
    /// 摘除的是时钟指针所指节点时，指针前进到下一个节点。
    pub fn remove(&mut self, frame: FrameId) -> Option<FrameOwner> {
        let idx = frame.index();
        let owner = self.nodes.get_mut(idx)?.owner.take()?;
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.len -= 1;
        if self.len == 0 {
            self.head = None;
        } else {
            self.nodes[prev].next = next;
            self.nodes[next].prev = prev;
            if self.head == Some(idx) {
                self.head = Some(next);
            }
        }
        self.nodes[idx].prev = idx;
        self.nodes[idx].next = idx;
        Some(owner)
    }

    /// 帧的属主
    pub fn owner(&self, frame: FrameId) -> Option<&FrameOwner> {
        self.nodes.get(frame.index())?.owner.as_ref()
    }

    /// 帧是否在驻留集中
    pub fn contains(&self, frame: FrameId) -> bool {
        self.owner(frame).is_some()
    }

    /// 驻留页数量
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 时钟指针
    pub fn head(&self) -> Option<FrameId> {
        self.head.map(FrameId::new)
    }

    /// 从时钟指针开始按环的顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &FrameOwner)> + '_ {
        let mut cur = self.head;
        (0..self.len).filter_map(move |_| {
            let idx = cur?;
            cur = Some(self.nodes[idx].next);
            self.nodes[idx]
                .owner
                .as_ref()
                .map(|owner| (FrameId::new(idx), owner))
        })
    }

    /// 选择牺牲页，不修改链表
    ///
    /// 第一轮会清除被跳过页的访问位。
    pub fn select_victim(&self, bits: &mut impl AccessBits) -> Option<FrameId> {
        let start = self.head?;

        let mut cur = start;
        for _ in 0..self.len {
            if let Some(owner) = self.nodes[cur].owner.as_ref() {
                if bits.is_user_accessible(owner) && !bits.test_and_clear_accessed(owner) {
                    return Some(FrameId::new(cur));
                }
            }
            cur = self.nodes[cur].next;
        }

        let mut cur = start;
        for _ in 0..self.len {
            if let Some(owner) = self.nodes[cur].owner.as_ref() {
                if bits.is_user_accessible(owner) {
                    return Some(FrameId::new(cur));
                }
            }
            cur = self.nodes[cur].next;
        }
        None
    }

    /// 摘除牺牲页并把时钟指针移到它的下一个节点
    pub fn take_victim(&mut self, frame: FrameId) -> Option<FrameOwner> {
        let next = self.nodes.get(frame.index())?.next;
        let owner = self.remove(frame)?;
        if !self.is_empty() {
            self.head = Some(next);
        }
        Some(owner)
    }
}
