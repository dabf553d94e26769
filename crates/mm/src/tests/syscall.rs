// Tests for the raw mmap / munmap / freemem entry points.

use uapi::mm::{ANON_FD, MAP_FAILED, MUNMAP_FAILED, MUNMAP_OK};

use super::*;
use crate::{init_paging, paging, register_config};

const PROT_READ: u32 = 0x1;
const PROT_RW: u32 = 0x3;
const MAP_FILE: u32 = 0x0;
const MAP_ANON: u32 = 0x1;
const MAP_ANON_POPULATE: u32 = 0x3;

fn mmap_anon(sys: &PagingSystem, pid: Pid, len: usize, flags: u32) -> usize {
    sys.sys_mmap(&TestFds::default(), pid, 0, len, PROT_RW, flags, ANON_FD, 0)
}

#[test]
fn test_anonymous_mmap_returns_address() {
    let (_, sys) = system(MockMmConfig::new());
    let addr = mmap_anon(&sys, 1, 2 * PAGE_SIZE, MAP_ANON);
    assert_eq!(addr, MMAP_BASE);
    assert_eq!(sys.sys_freemem(), 16);

    let eager_addr = mmap_anon(&sys, 1, PAGE_SIZE, MAP_ANON_POPULATE);
    assert_eq!(eager_addr, MMAP_BASE + 2 * PAGE_SIZE);
    assert_eq!(sys.sys_freemem(), 15);
}

#[test]
fn test_mmap_rejects_bad_encodings() {
    let (_, sys) = system(MockMmConfig::new());
    let fds = TestFds::default().with(1, 3, open_file(pattern(0)));

    // write without read
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, 0x2, MAP_ANON, ANON_FD, 0),
        MAP_FAILED
    );
    // unknown protection and flag bits
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, 0x5, MAP_ANON, ANON_FD, 0),
        MAP_FAILED
    );
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, 0x4, ANON_FD, 0),
        MAP_FAILED
    );
    // an anonymous mapping may not name a descriptor
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, MAP_ANON, 3, 0),
        MAP_FAILED
    );
    // a file mapping needs an open descriptor and a non-negative offset
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, MAP_FILE, ANON_FD, 0),
        MAP_FAILED
    );
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, MAP_FILE, 4, 0),
        MAP_FAILED
    );
    assert_eq!(
        sys.sys_mmap(&fds, 2, 0, PAGE_SIZE, PROT_RW, MAP_FILE, 3, 0),
        MAP_FAILED
    );
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, MAP_FILE, 3, -4096),
        MAP_FAILED
    );
    assert_eq!(sys.region_count(), 0);
}

#[test]
fn test_file_mmap_through_descriptor() {
    let (_, sys) = system(MockMmConfig::with_frames(4));
    let mut data = pattern(7);
    data.extend(pattern(8));
    let fds = TestFds::default()
        .with(1, 3, open_file(data))
        .with(1, 4, open_read_only(pattern(0)))
        .with(
            1,
            5,
            MockOpenFile::new(Arc::new(MockFile::non_regular())),
        );

    let addr = sys.sys_mmap(
        &fds,
        1,
        0,
        PAGE_SIZE,
        PROT_RW,
        MapFlags::POPULATE.bits(),
        3,
        PAGE_SIZE as isize,
    );
    assert_eq!(addr, MMAP_BASE);
    assert_eq!(sys.sys_freemem(), 3);
    assert_eq!(read_page(&sys, 1, Vaddr(addr)), pattern(8));

    // read-only descriptor cannot back a writable mapping
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_RW, MAP_FILE, 4, 0),
        MAP_FAILED
    );
    assert_ne!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_READ, MAP_FILE, 4, 0),
        MAP_FAILED
    );
    assert_eq!(
        sys.sys_mmap(&fds, 1, 0, PAGE_SIZE, PROT_READ, MAP_FILE, 5, 0),
        MAP_FAILED
    );
}

#[test]
fn test_munmap_return_values() {
    let (_, sys) = system(MockMmConfig::new());
    let addr = mmap_anon(&sys, 1, PAGE_SIZE, MAP_ANON_POPULATE);
    assert_eq!(sys.sys_munmap(1, addr + 1), MUNMAP_FAILED);
    assert_eq!(sys.sys_munmap(1, addr + PAGE_SIZE), MUNMAP_FAILED);
    assert_eq!(sys.sys_munmap(2, addr), MUNMAP_FAILED);

    assert_eq!(sys.sys_munmap(1, addr), MUNMAP_OK);
    assert_eq!(sys.sys_freemem(), 16);
    assert_eq!(sys.sys_munmap(1, addr), MUNMAP_FAILED);
}

#[test]
fn test_global_instance() {
    setup_arch();
    unsafe { register_config(&test_support::mock::mm::MOCK_MM_CONFIG) };
    let device = Arc::new(MockBlockDevice::new(PAGE_SIZE, 64));
    init_paging(device).unwrap();

    let sys = paging().unwrap();
    assert_eq!(sys.sys_freemem(), 16);
    assert_eq!(sys.frame_stats().total, 16);
}
