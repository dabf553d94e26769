//! 映射的建立、解除、fork 复制与进程退出回收

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use uapi::mm::{MapFlags, ProtFlags};

use super::PagingSystem;
use crate::address::{AlignOps, Vaddr, Vpn, VpnRange};
use crate::config::PAGE_SIZE;
use crate::file::MmFile;
use crate::memory_space::{MemorySpace, MmapFile, Region, RegionState};
use crate::page_table::{PageSlot, PagingError, PagingResult};
use crate::Pid;

/// 检查文件能否按 `prot` 映射
fn check_file(file: &Arc<dyn MmFile>, prot: ProtFlags) -> PagingResult<()> {
    let inode = file.inode().map_err(|_| PagingError::BadFile)?;
    if !inode.is_regular() {
        return Err(PagingError::BadFile);
    }
    if !file.readable() {
        return Err(PagingError::PermissionDenied);
    }
    if prot.contains(ProtFlags::WRITE) && !file.writable() {
        return Err(PagingError::PermissionDenied);
    }
    Ok(())
}

impl PagingSystem {
    /// 为进程 `pid` 建立映射，返回映射的起始地址
    ///
    /// - `hint` 是相对 mmap 窗口起点的页对齐偏移；为 0 时在窗口内选择第一段空闲范围。
    /// - `len` 必须是页大小的正整数倍。
    /// - 匿名映射不能带文件；文件映射要求普通文件、可读，读写映射还要求可写。
    /// - 带 [`MapFlags::POPULATE`] 时立即填充全部页，中途失败则整体回滚。
    ///
    /// # 错误
    /// - 参数不合法：[`PagingError::InvalidArgument`] / [`PagingError::InvalidAddress`]
    /// - 文件不合法：[`PagingError::BadFile`] / [`PagingError::PermissionDenied`]
    /// - 与本进程已有映射重叠：[`PagingError::AlreadyMapped`]
    /// - 映射表已满：[`PagingError::NoCapacity`]
    /// - 立即填充时内存耗尽：[`PagingError::OutOfMemory`]
    #[allow(clippy::too_many_arguments)]
    pub fn establish(
        &self,
        pid: Pid,
        hint: usize,
        len: usize,
        prot: ProtFlags,
        flags: MapFlags,
        file: Option<Arc<dyn MmFile>>,
        offset: usize,
    ) -> PagingResult<Vaddr> {
        if hint % PAGE_SIZE != 0 || len == 0 || len % PAGE_SIZE != 0 {
            return Err(PagingError::InvalidArgument);
        }
        if !prot.is_valid_mapping() {
            return Err(PagingError::InvalidArgument);
        }
        let mmap_file = match (flags.is_anonymous(), file) {
            (true, Some(_)) => return Err(PagingError::InvalidArgument),
            (true, None) => None,
            (false, None) => return Err(PagingError::BadFile),
            (false, Some(file)) => {
                check_file(&file, prot)?;
                Some(MmapFile { file, offset })
            }
        };

        let pages = len / PAGE_SIZE;
        let (id, region, space) = {
            let mut regions = self.regions.lock();
            let range = if hint == 0 {
                regions
                    .find_free_range(pid, self.mmap_window, pages)
                    .ok_or(PagingError::InvalidAddress)?
            } else {
                let start = self
                    .mmap_window
                    .start()
                    .0
                    .checked_add(hint / PAGE_SIZE)
                    .ok_or(PagingError::InvalidAddress)?;
                let range = VpnRange::new(
                    Vpn(start),
                    Vpn(start.checked_add(pages).ok_or(PagingError::InvalidAddress)?),
                );
                if !self.mmap_window.contains_range(&range) {
                    return Err(PagingError::InvalidAddress);
                }
                if regions.overlaps(pid, &range) {
                    return Err(PagingError::AlreadyMapped);
                }
                range
            };
            let region = Region {
                file: mmap_file,
                range,
                prot,
                flags,
                owner: pid,
                state: RegionState::Reserved,
            };
            let id = regions.insert(region.clone())?;
            // 地址空间与区域在同一把锁下出现，与 release_process 对称
            (id, region, self.space(pid))
        };

        if flags.is_populate() {
            if let Err(e) = self.populate_region(&space, id, &region) {
                log::debug!(
                    "mmap: pid {} populate of {:#x} failed ({}), rolling back",
                    pid,
                    region.base().0,
                    e
                );
                let mut regions = self.regions.lock();
                if regions.get(id).is_some_and(|r| r.same_mapping(&region)) {
                    regions.remove(id);
                }
                self.teardown_pages(&region);
                return Err(e);
            }
        }

        log::debug!(
            "mmap: pid {} mapped {:#x}..{:#x} prot {:?} flags {:?}",
            pid,
            region.base().0,
            region.base().0 + region.len(),
            prot,
            flags
        );
        Ok(region.base())
    }

    /// 解除进程 `pid` 起始地址为 `addr` 的映射
    ///
    /// 驻留页的帧还给帧池，换出页的交换槽被释放。
    ///
    /// # 错误
    /// `addr` 未页对齐或没有以它为起点的映射时返回错误，状态不变
    pub fn remove(&self, pid: Pid, addr: Vaddr) -> PagingResult<()> {
        if !addr.is_page_aligned() {
            return Err(PagingError::InvalidAddress);
        }
        let mut regions = self.regions.lock();
        let id = regions
            .find_by_base(pid, addr)
            .ok_or(PagingError::NotMapped)?;
        let region = regions.remove(id).ok_or(PagingError::NotMapped)?;
        let (frames, slots) = self.teardown_pages(&region);
        log::debug!(
            "munmap: pid {} unmapped {:#x}, freed {} frames and {} swap slots",
            pid,
            addr.0,
            frames,
            slots
        );
        Ok(())
    }

    /// 清除区域内的所有页表项，返回 (释放的帧数, 释放的交换槽数)
    ///
    /// 调用方要么持有映射表锁，要么区域已不在映射表中。
    fn teardown_pages(&self, region: &Region) -> (usize, usize) {
        let Some(space) = self.existing_space(region.owner) else {
            return (0, 0);
        };
        let mut freed = Vec::new();
        let mut slots = 0;
        {
            let _paging = self.paging.lock();
            let mut resident = self.resident.lock();
            let mut table = space.table();
            let mut swap = self.swap.lock();
            for vpn in table.mapped_in(&region.range) {
                match table.unmap(vpn) {
                    Ok(PageSlot::Resident { frame, .. }) => {
                        resident.remove(frame);
                        freed.push(frame);
                    }
                    Ok(PageSlot::Swapped { slot, .. }) => {
                        if swap.free(slot) {
                            slots += 1;
                        }
                    }
                    Err(_) => {}
                }
            }
        }
        for frame in &freed {
            self.discard_frame(*frame);
        }
        (freed.len(), slots)
    }

    /// fork 时把父进程的全部映射复制给子进程
    ///
    /// 父进程已填充的区域在子进程中立即填充：文件映射重新读文件，
    /// 匿名映射复制父进程当前的页内容（无论驻留还是已换出）。
    /// 未填充的区域只复制描述符。
    ///
    /// 失败时子进程可能只得到部分映射，调用方应当终止子进程并调用
    /// [`release_process`](Self::release_process)。
    pub fn duplicate(&self, parent: Pid, child: Pid) -> PagingResult<()> {
        let parent_regions: Vec<Region> = self
            .regions
            .lock()
            .iter()
            .filter(|(_, r)| r.owner == parent)
            .map(|(_, r)| r.clone())
            .collect();
        if parent_regions.is_empty() {
            return Ok(());
        }

        let parent_space = self.existing_space(parent).ok_or(PagingError::NotMapped)?;
        for region in parent_regions {
            let copy = Region {
                owner: child,
                state: RegionState::Reserved,
                ..region.clone()
            };
            let (id, child_space) = {
                let mut regions = self.regions.lock();
                (regions.insert(copy.clone())?, self.space(child))
            };
            if region.state != RegionState::Populated {
                continue;
            }

            for vpn in copy.range {
                let content = match copy.file {
                    Some(_) => None,
                    None => self.snapshot_page(&parent_space, vpn)?,
                };
                let frame = self.acquire_frame()?;
                let installed = match content {
                    Some(page) => self.memory.write(frame, 0, &page),
                    None => self.fill_frame(frame, &copy, vpn),
                }
                .and_then(|()| self.install_page(&child_space, id, &copy, vpn, frame));
                match installed {
                    Ok(true) => {}
                    Ok(false) => self.release_frame(frame)?,
                    Err(e) => {
                        self.discard_frame(frame);
                        return Err(e);
                    }
                }
            }
            self.mark_populated(id, &copy);
        }
        log::debug!("fork: duplicated mappings of pid {} into pid {}", parent, child);
        Ok(())
    }

    /// 复制地址空间中一页的当前内容，页不存在时返回 `None`
    fn snapshot_page(&self, space: &Arc<MemorySpace>, vpn: Vpn) -> PagingResult<Option<Vec<u8>>> {
        let _paging = self.paging.lock();
        let table = space.table();
        match table.get(vpn) {
            Some(PageSlot::Resident { frame, .. }) => {
                let mut page = vec![0u8; PAGE_SIZE];
                self.memory.read(frame, 0, &mut page)?;
                Ok(Some(page))
            }
            Some(PageSlot::Swapped { slot, .. }) => {
                let mut page = vec![0u8; PAGE_SIZE];
                self.swap.lock().read(slot, &mut page)?;
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }

    /// 进程退出时回收它的全部映射和地址空间，返回回收的区域数
    pub fn release_process(&self, pid: Pid) -> usize {
        let mut released = 0;
        let mut regions = self.regions.lock();
        for id in regions.owned_by(pid) {
            if let Some(region) = regions.remove(id) {
                self.teardown_pages(&region);
                released += 1;
            }
        }
        self.spaces.lock().remove(&pid);
        drop(regions);
        log::debug!("exit: released {} regions of pid {}", released, pid);
        released
    }
}
