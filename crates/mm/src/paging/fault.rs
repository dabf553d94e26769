//! 缺页处理与用户内存访问

use alloc::sync::Arc;
use core::ops::Range;

use super::PagingSystem;
use crate::Pid;
use crate::address::{AlignOps, Vaddr, Vpn};
use crate::config::PAGE_SIZE;
use crate::frame_allocator::FrameId;
use crate::memory_space::{MemorySpace, RegionState};
use crate::page_table::{PageSlot, PagingError, PagingResult};
use crate::replacement::FrameOwner;
use crate::swap::SwapSlot;

/// 触发缺页的访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// 读
    Read,
    /// 写
    Write,
}

impl AccessKind {
    /// 是否为写访问
    pub fn is_write(self) -> bool {
        self == AccessKind::Write
    }
}

impl PagingSystem {
    /// 处理进程 `pid` 在 `addr` 处的缺页
    ///
    /// 1. 地址不在本进程任何映射区域内：[`PagingError::SegmentationFault`]
    /// 2. 写只读区域：[`PagingError::ProtectionViolation`]
    /// 3. 页已换出：换入
    /// 4. 区域尚未填充：填充整个区域
    /// 5. 页已驻留：视为虚假缺页，直接返回
    ///
    /// 返回的错误满足 [`PagingError::kills_process`] 时，调用方应终止该进程。
    pub fn handle_page_fault(&self, pid: Pid, addr: Vaddr, access: AccessKind) -> PagingResult<()> {
        let (id, region) = {
            let regions = self.regions.lock();
            let (id, region) = regions.find_containing(pid, addr).ok_or_else(|| {
                log::debug!("fault: pid {} segfault at {:#x}", pid, addr.0);
                PagingError::SegmentationFault
            })?;
            (id, region.clone())
        };
        if access.is_write() && !region.writable() {
            log::debug!("fault: pid {} write to read-only {:#x}", pid, addr.0);
            return Err(PagingError::ProtectionViolation);
        }

        // 区域查找之后进程可能已经退出，不能在这里重建地址空间
        let space = self
            .existing_space(pid)
            .ok_or(PagingError::SegmentationFault)?;
        let vpn = addr.floor();
        let entry = space.table().get(vpn);
        match entry {
            Some(PageSlot::Resident { .. }) => Ok(()),
            Some(PageSlot::Swapped { slot, .. }) => self.swap_in(&space, vpn, slot),
            None if region.state == RegionState::Reserved => {
                self.populate_region(&space, id, &region)
            }
            None => self.populate_page(&space, id, &region, vpn),
        }
    }

    /// 把换出到 `slot` 的页读回新帧
    fn swap_in(&self, space: &Arc<MemorySpace>, vpn: Vpn, slot: SwapSlot) -> PagingResult<()> {
        let frame = self.acquire_frame()?;
        match self.swap_in_to(space, vpn, slot, frame) {
            Ok(true) => Ok(()),
            Ok(false) => self.release_frame(frame),
            Err(e) => {
                self.discard_frame(frame);
                Err(e)
            }
        }
    }

    /// 持 paging 锁完成换入，页表项已被他人改写时返回 `Ok(false)`
    fn swap_in_to(
        &self,
        space: &Arc<MemorySpace>,
        vpn: Vpn,
        slot: SwapSlot,
        frame: FrameId,
    ) -> PagingResult<bool> {
        let _paging = self.paging.lock();
        let mut resident = self.resident.lock();
        let mut table = space.table();
        if table.get(vpn).and_then(|e| e.swap_slot()) != Some(slot) {
            return Ok(false);
        }
        let mut swap = self.swap.lock();
        self.memory
            .with_frame_mut(frame, |data| swap.read(slot, data))??;
        table.swap_in(vpn, slot, frame)?;
        swap.free(slot);
        resident.insert(
            frame,
            FrameOwner {
                space: space.clone(),
                vpn,
            },
        );
        log::debug!(
            "fault: pid {} swapped in page {:#x} from slot {} to frame {}",
            space.pid(),
            vpn.start_addr().0,
            slot.index(),
            frame.index()
        );
        Ok(true)
    }

    /// 从进程 `pid` 的 `addr` 处读取 `buf.len()` 字节
    ///
    /// 按用户读访问处理：设置访问位，缺页时走缺页处理。
    pub fn read_user(&self, pid: Pid, addr: Vaddr, buf: &mut [u8]) -> PagingResult<()> {
        self.access_user(pid, addr, buf.len(), AccessKind::Read, |frame, offset, range| {
            self.memory.read(frame, offset, &mut buf[range])
        })
    }

    /// 向进程 `pid` 的 `addr` 处写入 `data`
    ///
    /// 按用户写访问处理：设置访问位和脏位，缺页时走缺页处理。
    pub fn write_user(&self, pid: Pid, addr: Vaddr, data: &[u8]) -> PagingResult<()> {
        self.access_user(pid, addr, data.len(), AccessKind::Write, |frame, offset, range| {
            self.memory.write(frame, offset, &data[range])
        })
    }

    /// 逐页访问 `[addr, addr + len)`，`copy` 收到 (帧, 页内偏移, 缓冲区范围)
    fn access_user(
        &self,
        pid: Pid,
        addr: Vaddr,
        len: usize,
        access: AccessKind,
        mut copy: impl FnMut(FrameId, usize, Range<usize>) -> PagingResult<()>,
    ) -> PagingResult<()> {
        if len == 0 {
            return Ok(());
        }
        addr.checked_add(len)
            .ok_or(PagingError::SegmentationFault)?;
        let space = self
            .existing_space(pid)
            .ok_or(PagingError::SegmentationFault)?;

        let mut done = 0;
        while done < len {
            let cur = Vaddr(addr.0 + done);
            let offset = cur.page_offset();
            let chunk = (PAGE_SIZE - offset).min(len - done);
            let copied = {
                let mut table = space.table();
                match table.touch(cur.floor(), access.is_write()) {
                    Some(frame) => {
                        copy(frame, offset, done..done + chunk)?;
                        true
                    }
                    None => false,
                }
            };
            if copied {
                done += chunk;
            } else {
                self.handle_page_fault(pid, cur, access)?;
            }
        }
        Ok(())
    }
}
