//! 按需调页
//!
//! [`PagingSystem`] 把帧池、交换区、驻留集、映射表和各进程的地址空间组合在一起，
//! 对外提供 mmap / munmap、缺页处理、fork 复制和进程退出回收。
//!
//! # 锁顺序
//!
//! 映射表 → paging → 驻留集 → 页表 → 交换区 → 帧池。
//!
//! - paging 锁把换出、换入和页回收串行化，保证交换槽的分配/释放、
//!   驻留集的修改和页表改写是原子的。
//! - 获取帧时不持有任何页表锁（获取帧可能触发换出）。安装页时在页表锁下
//!   重新确认页表项仍为空，竞争失败的一方归还多余的帧。
//! - 帧内容锁和地址空间表锁是叶子锁，持有时不再获取其他锁。

mod fault;
mod mmap;
mod syscall;

pub use fault::AccessKind;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};
use lazy_static::lazy_static;
use sync::SpinLock;

use crate::Pid;
use crate::address::{AlignOps, Vaddr, Vpn, VpnRange};
use crate::config::{MmConfig, PAGE_SIZE, mm_config};
use crate::frame_allocator::{FREE_FRAME_FILL, FrameId, FramePool, FrameStats, PhysicalMemory};
use crate::memory_space::{MemorySpace, Region, RegionId, RegionState, RegionTable};
use crate::page_table::{PageState, PagingError, PagingResult};
use crate::replacement::{AccessBits, FrameOwner, ResidentSet};
use crate::swap::{SwapDevice, SwapStore};

/// 按需调页子系统
pub struct PagingSystem {
    mmap_window: VpnRange,
    regions: SpinLock<RegionTable>,
    paging: SpinLock<()>,
    resident: SpinLock<ResidentSet>,
    swap: SpinLock<SwapStore>,
    frames: SpinLock<FramePool>,
    memory: PhysicalMemory,
    spaces: SpinLock<BTreeMap<Pid, Arc<MemorySpace>>>,
    kernel_frames: AtomicUsize,
}

/// 通过属主的页表读写访问位
struct TableAccessBits;

impl AccessBits for TableAccessBits {
    fn is_user_accessible(&mut self, owner: &FrameOwner) -> bool {
        owner.space.table().is_user_resident(owner.vpn)
    }

    fn test_and_clear_accessed(&mut self, owner: &FrameOwner) -> bool {
        owner.space.table().test_and_clear_accessed(owner.vpn)
    }
}

impl PagingSystem {
    /// 按配置创建子系统，交换区建立在 `device` 上
    ///
    /// # 错误
    /// 页大小不是 [`PAGE_SIZE`]、mmap 窗口未对齐或交换设备不满足要求时
    /// 返回 [`PagingError::InvalidArgument`]
    pub fn new(config: &dyn MmConfig, device: Arc<dyn SwapDevice>) -> PagingResult<Self> {
        if config.page_size() != PAGE_SIZE {
            log::error!("paging: unsupported page size {}", config.page_size());
            return Err(PagingError::InvalidArgument);
        }
        let base = Vaddr(config.mmap_base());
        let window_size = config.mmap_window_size();
        if !base.is_page_aligned() || window_size == 0 || window_size % PAGE_SIZE != 0 {
            log::error!(
                "paging: bad mmap window {:#x} + {:#x}",
                base.0,
                window_size
            );
            return Err(PagingError::InvalidArgument);
        }
        base.checked_add(window_size)
            .ok_or(PagingError::InvalidArgument)?;

        let frame_count = config.frame_count();
        let swap = SwapStore::new(device, config.swap_slot_count())?;
        log::info!(
            "paging: {} frames, {} swap slots, {} regions, mmap window {:#x}",
            frame_count,
            swap.capacity(),
            config.region_capacity(),
            base.0
        );

        Ok(Self {
            mmap_window: VpnRange::from_start_len(base.floor(), window_size / PAGE_SIZE),
            regions: SpinLock::new(RegionTable::new(config.region_capacity())),
            paging: SpinLock::new(()),
            resident: SpinLock::new(ResidentSet::new(frame_count)),
            swap: SpinLock::new(swap),
            frames: SpinLock::new(FramePool::new(frame_count)),
            memory: PhysicalMemory::new(frame_count),
            spaces: SpinLock::new(BTreeMap::new()),
            kernel_frames: AtomicUsize::new(0),
        })
    }

    // ========================================================================
    // 地址空间
    // ========================================================================

    /// 取得进程的地址空间，不存在时创建
    fn space(&self, pid: Pid) -> Arc<MemorySpace> {
        self.spaces
            .lock()
            .entry(pid)
            .or_insert_with(|| MemorySpace::new(pid))
            .clone()
    }

    fn existing_space(&self, pid: Pid) -> Option<Arc<MemorySpace>> {
        self.spaces.lock().get(&pid).cloned()
    }

    // ========================================================================
    // 帧的获取与释放
    // ========================================================================

    /// 获取一个空闲帧，帧池为空时换出一页后重试
    ///
    /// # 错误
    /// 没有可换出的页或交换区已满时返回 [`PagingError::OutOfMemory`]
    fn acquire_frame(&self) -> PagingResult<FrameId> {
        loop {
            if let Some(frame) = self.frames.lock().alloc() {
                return Ok(frame);
            }
            if let Err(e) = self.evict_one() {
                log::error!("paging: out of memory, eviction failed: {}", e);
                return Err(PagingError::OutOfMemory);
            }
        }
    }

    /// 用时钟算法选出一页换出到交换区，并把它的帧还给帧池
    fn evict_one(&self) -> PagingResult<()> {
        let _paging = self.paging.lock();
        let mut resident = self.resident.lock();

        let victim = resident
            .select_victim(&mut TableAccessBits)
            .ok_or(PagingError::OutOfMemory)?;
        let owner = resident
            .owner(victim)
            .cloned()
            .ok_or(PagingError::OutOfMemory)?;

        {
            let mut table = owner.space.table();
            let mut swap = self.swap.lock();
            let slot = swap.allocate_slot()?;
            let written = self
                .memory
                .with_frame(victim, |data| swap.write(slot, data))
                .and_then(|r| r)
                .and_then(|()| table.swap_out(owner.vpn, victim, slot));
            if let Err(e) = written {
                swap.free(slot);
                return Err(e);
            }
            log::debug!(
                "paging: evicted pid {} page {:#x} (frame {}) to slot {}",
                owner.space.pid(),
                owner.vpn.start_addr().0,
                victim.index(),
                slot.index()
            );
        }

        resident.take_victim(victim);
        drop(resident);
        drop(_paging);
        self.release_frame(victim)
    }

    /// 把帧填充垃圾数据后还给帧池
    fn release_frame(&self, frame: FrameId) -> PagingResult<()> {
        if !self.frames.lock().is_allocated(frame) {
            log::error!("paging: release of free frame {}", frame.index());
            return Err(PagingError::InvalidAddress);
        }
        self.memory.fill(frame, FREE_FRAME_FILL)?;
        self.frames.lock().dealloc(frame)
    }

    /// 错误路径上归还帧，失败只记录日志
    fn discard_frame(&self, frame: FrameId) {
        if let Err(e) = self.release_frame(frame) {
            log::error!("paging: failed to return frame {}: {}", frame.index(), e);
        }
    }

    // ========================================================================
    // 页的填充与安装
    // ========================================================================

    /// 清零帧，文件映射再读入对应的文件内容
    fn fill_frame(&self, frame: FrameId, region: &Region, vpn: Vpn) -> PagingResult<()> {
        self.memory.with_frame_mut(frame, |data| {
            data.fill(0);
            match &region.file {
                Some(file) => file.read_page(region.page_index(vpn), data).map(|_| ()),
                None => Ok(()),
            }
        })?
    }

    /// 把已填充的帧安装到页表并加入驻留集
    ///
    /// 区域已被解除映射或页表项已存在时返回 `Ok(false)`，帧由调用方归还。
    fn install_page(
        &self,
        space: &Arc<MemorySpace>,
        id: RegionId,
        region: &Region,
        vpn: Vpn,
        frame: FrameId,
    ) -> PagingResult<bool> {
        let regions = self.regions.lock();
        if !regions.get(id).is_some_and(|r| r.same_mapping(region)) {
            return Ok(false);
        }
        let mut resident = self.resident.lock();
        let mut table = space.table();
        if table.get(vpn).is_some() {
            return Ok(false);
        }
        table.map(vpn, frame, region.pte_flags())?;
        resident.insert(
            frame,
            FrameOwner {
                space: space.clone(),
                vpn,
            },
        );
        Ok(true)
    }

    /// 为单个页分配、填充并安装帧
    fn populate_page(
        &self,
        space: &Arc<MemorySpace>,
        id: RegionId,
        region: &Region,
        vpn: Vpn,
    ) -> PagingResult<()> {
        if space.table().get(vpn).is_some() {
            return Ok(());
        }
        let frame = self.acquire_frame()?;
        let installed = self
            .fill_frame(frame, region, vpn)
            .and_then(|()| self.install_page(space, id, region, vpn, frame));
        match installed {
            Ok(true) => Ok(()),
            Ok(false) => self.release_frame(frame),
            Err(e) => {
                self.discard_frame(frame);
                Err(e)
            }
        }
    }

    /// 填充整个区域并把它标记为已填充
    fn populate_region(
        &self,
        space: &Arc<MemorySpace>,
        id: RegionId,
        region: &Region,
    ) -> PagingResult<()> {
        for vpn in region.range {
            self.populate_page(space, id, region, vpn)?;
        }
        self.mark_populated(id, region);
        log::debug!(
            "paging: populated pid {} region {:#x} ({} pages)",
            region.owner,
            region.base().0,
            region.range.len()
        );
        Ok(())
    }

    fn mark_populated(&self, id: RegionId, region: &Region) {
        let mut regions = self.regions.lock();
        if let Some(r) = regions.get_mut(id) {
            if r.same_mapping(region) {
                r.state = RegionState::Populated;
            }
        }
    }

    // ========================================================================
    // 诊断
    // ========================================================================

    /// 空闲帧数
    pub fn free_frames(&self) -> usize {
        self.frames.lock().free_frames()
    }

    /// 驻留页数
    pub fn resident_count(&self) -> usize {
        self.resident.lock().len()
    }

    /// 已占用的交换槽数
    pub fn swap_slots_used(&self) -> usize {
        self.swap.lock().used_slots()
    }

    /// 空闲的交换槽数
    pub fn swap_slots_free(&self) -> usize {
        self.swap.lock().free_slots()
    }

    /// 非空映射表槽位数
    pub fn region_count(&self) -> usize {
        self.regions.lock().len()
    }

    /// 帧使用统计
    pub fn frame_stats(&self) -> FrameStats {
        let resident = self.resident.lock().len();
        let pool = self.frames.lock();
        FrameStats {
            total: pool.total_frames(),
            free: pool.free_frames(),
            resident,
            kernel: self.kernel_frames.load(Ordering::Relaxed),
        }
    }

    /// 查询进程某个地址所在页的状态
    pub fn page_state(&self, pid: Pid, addr: Vaddr) -> PageState {
        self.existing_space(pid)
            .map_or(PageState::Absent, |space| space.table().state(addr.floor()))
    }

    /// 进程当前是否有地址空间
    pub fn has_address_space(&self, pid: Pid) -> bool {
        self.spaces.lock().contains_key(&pid)
    }

    /// 查询进程在 `addr` 处的映射区域
    pub fn region_at(&self, pid: Pid, addr: Vaddr) -> Option<Region> {
        self.regions
            .lock()
            .find_containing(pid, addr)
            .map(|(_, r)| r.clone())
    }

    // ========================================================================
    // 内核帧
    // ========================================================================

    /// 为内核分配一个帧，这个帧不进入驻留集，不会被换出
    pub fn alloc_kernel_frame(&self) -> PagingResult<FrameId> {
        let frame = self.acquire_frame()?;
        self.memory.fill(frame, 0)?;
        self.kernel_frames.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }

    /// 归还内核帧
    ///
    /// # 错误
    /// 帧未分配或正作为用户页驻留时返回 [`PagingError::InvalidAddress`]
    pub fn free_kernel_frame(&self, frame: FrameId) -> PagingResult<()> {
        if self.resident.lock().contains(frame) {
            return Err(PagingError::InvalidAddress);
        }
        self.release_frame(frame)?;
        self.kernel_frames.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// 全局实例
// ============================================================================

lazy_static! {
    static ref PAGING: SpinLock<Option<Arc<PagingSystem>>> = SpinLock::new(None);
}

/// 使用已注册的 [`MmConfig`] 初始化全局分页子系统
///
/// 重复调用会替换之前的实例。
pub fn init_paging(device: Arc<dyn SwapDevice>) -> PagingResult<()> {
    let system = PagingSystem::new(mm_config(), device)?;
    *PAGING.lock() = Some(Arc::new(system));
    Ok(())
}

/// 获取全局分页子系统，未初始化时返回 `None`
pub fn paging() -> Option<Arc<PagingSystem>> {
    PAGING.lock().clone()
}
