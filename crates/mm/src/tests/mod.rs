// Host tests for the paging subsystem.
//
// The mocks live in `test-support`; the `mm` traits are implemented for them here so the
// whole subsystem can run under a plain `cargo test`.

extern crate std;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::Once;

use test_support::mock::arch::MOCK_ARCH_OPS;
use test_support::mock::block::MockBlockDevice;
use test_support::mock::fs::{MockFile, MockOpenFile};
use test_support::mock::mm::MockMmConfig;
use uapi::mm::{MapFlags, ProtFlags};

use crate::{
    MmConfig, MmFdTable, MmFile, MmInode, PAGE_SIZE, PageState, PagingSystem, Pid, SwapDevice,
    Vaddr,
};

mod fault;
mod fork;
mod syscall;

// ---------------------------------------------------------------------------
// trait impls for the shared mocks
// ---------------------------------------------------------------------------

impl MmConfig for MockMmConfig {
    fn page_size(&self) -> usize {
        MockMmConfig::page_size(self)
    }

    fn frame_count(&self) -> usize {
        MockMmConfig::frame_count(self)
    }

    fn swap_slot_count(&self) -> usize {
        MockMmConfig::swap_slot_count(self)
    }

    fn region_capacity(&self) -> usize {
        MockMmConfig::region_capacity(self)
    }

    fn mmap_base(&self) -> usize {
        MockMmConfig::mmap_base(self)
    }

    fn mmap_window_size(&self) -> usize {
        MockMmConfig::mmap_window_size(self)
    }
}

impl SwapDevice for MockBlockDevice {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> bool {
        MockBlockDevice::read_block(self, block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> bool {
        MockBlockDevice::write_block(self, block_id, buf)
    }

    fn block_size(&self) -> usize {
        MockBlockDevice::block_size(self)
    }

    fn total_blocks(&self) -> usize {
        MockBlockDevice::total_blocks(self)
    }
}

impl MmInode for MockFile {
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        Ok(MockFile::read_at(self, offset, buf))
    }

    fn is_regular(&self) -> bool {
        self.regular
    }
}

impl MmFile for MockOpenFile {
    fn inode(&self) -> Result<Arc<dyn MmInode>, isize> {
        let inode: Arc<dyn MmInode> = self.inode.clone();
        Ok(inode)
    }

    fn readable(&self) -> bool {
        MockOpenFile::readable(self)
    }

    fn writable(&self) -> bool {
        MockOpenFile::writable(self)
    }
}

/// Delegates to the shared mock so `sync::SpinLock` works inside `mm` tests.
struct TestArch;

impl sync::ArchOps for TestArch {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        unsafe { MOCK_ARCH_OPS.read_and_disable_interrupts() }
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        unsafe { MOCK_ARCH_OPS.restore_interrupts(flags) }
    }
}

static TEST_ARCH: TestArch = TestArch;
static ARCH_INIT: Once = Once::new();

fn setup_arch() {
    ARCH_INIT.call_once(|| unsafe { sync::register_arch_ops(&TEST_ARCH) });
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

const MMAP_BASE: usize = 0x4000_0000;

fn rw() -> ProtFlags {
    ProtFlags::READ | ProtFlags::WRITE
}

fn ro() -> ProtFlags {
    ProtFlags::READ
}

fn lazy() -> MapFlags {
    MapFlags::ANONYMOUS
}

fn eager() -> MapFlags {
    MapFlags::ANONYMOUS | MapFlags::POPULATE
}

/// A fresh subsystem with a RAM swap device large enough for every slot.
fn system(config: MockMmConfig) -> (Arc<MockBlockDevice>, PagingSystem) {
    setup_arch();
    let device = Arc::new(MockBlockDevice::new(PAGE_SIZE, config.swap_slots));
    let sys = PagingSystem::new(&config, device.clone()).unwrap();
    (device, sys)
}

/// Anonymous read-write mapping of `pages` pages at the first free address.
fn map_anon(sys: &PagingSystem, pid: Pid, pages: usize, flags: MapFlags) -> Vaddr {
    sys.establish(pid, 0, pages * PAGE_SIZE, rw(), flags, None, 0)
        .unwrap()
}

fn page(base: Vaddr, index: usize) -> Vaddr {
    Vaddr(base.0 + index * PAGE_SIZE)
}

/// One page filled with a byte pattern derived from `seed`.
fn pattern(seed: u8) -> Vec<u8> {
    (0..PAGE_SIZE)
        .map(|i| seed.wrapping_add((i % 251) as u8))
        .collect()
}

fn read_page(sys: &PagingSystem, pid: Pid, addr: Vaddr) -> Vec<u8> {
    let mut buf = alloc::vec![0u8; PAGE_SIZE];
    sys.read_user(pid, addr, &mut buf).unwrap();
    buf
}

fn open_file(data: Vec<u8>) -> Arc<dyn MmFile> {
    MockOpenFile::new(Arc::new(MockFile::new(data)))
}

fn open_read_only(data: Vec<u8>) -> Arc<dyn MmFile> {
    MockOpenFile::new(Arc::new(MockFile::read_only(data)))
}

fn is_swapped(state: PageState) -> bool {
    matches!(state, PageState::Swapped(_))
}

fn is_resident(state: PageState) -> bool {
    matches!(state, PageState::Resident(_))
}

/// free + resident + kernel-held must account for every frame.
fn assert_frames_conserved(sys: &PagingSystem) {
    let stats = sys.frame_stats();
    assert_eq!(stats.free + stats.resident + stats.kernel, stats.total);
}

/// Per-process descriptor table backed by a map.
#[derive(Default)]
struct TestFds {
    files: BTreeMap<(Pid, i32), Arc<dyn MmFile>>,
}

impl TestFds {
    fn with(mut self, pid: Pid, fd: i32, file: Arc<dyn MmFile>) -> Self {
        self.files.insert((pid, fd), file);
        self
    }
}

impl MmFdTable for TestFds {
    fn get_file(&self, pid: Pid, fd: i32) -> Option<Arc<dyn MmFile>> {
        self.files.get(&(pid, fd)).cloned()
    }
}
