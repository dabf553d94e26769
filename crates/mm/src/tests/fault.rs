// Tests for the page-fault resolver and the user access path.

use super::*;
use crate::{AccessKind, PagingError, RegionState};

// a lazy mapping costs nothing until touched, then the whole region is filled.
#[test]
fn test_lazy_region_filled_on_first_touch() {
    let (_, sys) = system(MockMmConfig::with_frames(16));
    let base = map_anon(&sys, 1, 2, lazy());
    assert_eq!(sys.free_frames(), 16);
    assert_eq!(sys.page_state(1, base), PageState::Absent);
    assert_eq!(
        sys.region_at(1, base).map(|r| r.state),
        Some(RegionState::Reserved)
    );

    sys.handle_page_fault(1, base, AccessKind::Write).unwrap();
    assert_eq!(sys.free_frames(), 14);
    assert!(is_resident(sys.page_state(1, base)));
    assert!(is_resident(sys.page_state(1, page(base, 1))));
    assert_eq!(
        sys.region_at(1, base).map(|r| r.state),
        Some(RegionState::Populated)
    );
    assert_frames_conserved(&sys);
}

#[test]
fn test_anonymous_pages_start_zeroed() {
    let (_, sys) = system(MockMmConfig::new());
    let base = map_anon(&sys, 1, 1, lazy());
    assert!(read_page(&sys, 1, base).iter().all(|b| *b == 0));
}

#[test]
fn test_fault_outside_any_region() {
    let (_, sys) = system(MockMmConfig::new());
    let base = map_anon(&sys, 1, 1, lazy());
    assert_eq!(
        sys.handle_page_fault(1, page(base, 1), AccessKind::Read),
        Err(PagingError::SegmentationFault)
    );
    // another process does not see the mapping
    assert_eq!(
        sys.handle_page_fault(2, base, AccessKind::Read),
        Err(PagingError::SegmentationFault)
    );
    assert!(PagingError::SegmentationFault.kills_process());
}

#[test]
fn test_write_to_read_only_region() {
    let (_, sys) = system(MockMmConfig::new());
    let base = sys
        .establish(1, 0, PAGE_SIZE, ro(), lazy(), None, 0)
        .unwrap();
    assert_eq!(
        sys.handle_page_fault(1, base, AccessKind::Write),
        Err(PagingError::ProtectionViolation)
    );
    assert_eq!(sys.page_state(1, base), PageState::Absent);

    // reads are fine, and the page stays read-only afterwards
    let mut byte = [0xffu8];
    sys.read_user(1, base, &mut byte).unwrap();
    assert_eq!(byte, [0]);
    assert_eq!(
        sys.write_user(1, base, b"x"),
        Err(PagingError::ProtectionViolation)
    );
}

#[test]
fn test_spurious_fault_on_resident_page() {
    let (_, sys) = system(MockMmConfig::with_frames(4));
    let base = map_anon(&sys, 1, 1, eager());
    let before = sys.page_state(1, base);
    sys.handle_page_fault(1, base, AccessKind::Read).unwrap();
    assert_eq!(sys.page_state(1, base), before);
    assert_eq!(sys.free_frames(), 3);
}

#[test]
fn test_user_access_spans_pages() {
    let (_, sys) = system(MockMmConfig::new());
    let base = map_anon(&sys, 1, 2, lazy());
    let addr = Vaddr(base.0 + PAGE_SIZE - 3);
    sys.write_user(1, addr, b"abcdef").unwrap();

    let mut out = [0u8; 6];
    sys.read_user(1, addr, &mut out).unwrap();
    assert_eq!(&out, b"abcdef");
    assert_eq!(read_page(&sys, 1, page(base, 1))[..3], *b"def");

    assert_eq!(
        sys.read_user(1, Vaddr(base.0 + 2 * PAGE_SIZE - 1), &mut out),
        Err(PagingError::SegmentationFault)
    );
    assert_eq!(
        sys.read_user(7, base, &mut out),
        Err(PagingError::SegmentationFault)
    );
}

#[test]
fn test_empty_user_access_always_succeeds() {
    let (_, sys) = system(MockMmConfig::new());
    let base = map_anon(&sys, 1, 1, lazy());
    // no page is touched, whether or not the process has an address space
    sys.read_user(7, base, &mut []).unwrap();
    sys.write_user(7, Vaddr(0), b"").unwrap();
    sys.write_user(1, Vaddr(0), b"").unwrap();
    assert_eq!(sys.page_state(1, base), PageState::Absent);
    assert!(!sys.has_address_space(7));
}

#[test]
fn test_file_mapping_reads_at_offset() {
    let (_, sys) = system(MockMmConfig::new());
    let mut data = pattern(1);
    data.extend(pattern(2));
    data.extend(pattern(3));
    let file = open_read_only(data);

    let base = sys
        .establish(1, 0, 2 * PAGE_SIZE, ro(), MapFlags::empty(), Some(file), PAGE_SIZE)
        .unwrap();
    assert_eq!(sys.page_state(1, base), PageState::Absent);
    assert_eq!(read_page(&sys, 1, base), pattern(2));
    assert_eq!(read_page(&sys, 1, page(base, 1)), pattern(3));
}

#[test]
fn test_file_shorter_than_mapping_is_zero_padded() {
    let (_, sys) = system(MockMmConfig::new());
    let file = open_read_only(alloc::vec![0x5a; 100]);
    let base = sys
        .establish(1, 0, 2 * PAGE_SIZE, ro(), MapFlags::empty(), Some(file), 0)
        .unwrap();
    let first = read_page(&sys, 1, base);
    assert!(first[..100].iter().all(|b| *b == 0x5a));
    assert!(first[100..].iter().all(|b| *b == 0));
    assert!(read_page(&sys, 1, page(base, 1)).iter().all(|b| *b == 0));
}

#[test]
fn test_eager_file_mapping_is_resident_immediately() {
    let (_, sys) = system(MockMmConfig::with_frames(8));
    let file = open_file(pattern(9));
    let base = sys
        .establish(1, 0, PAGE_SIZE, rw(), MapFlags::POPULATE, Some(file), 0)
        .unwrap();
    assert!(is_resident(sys.page_state(1, base)));
    assert_eq!(sys.free_frames(), 7);
    assert_eq!(read_page(&sys, 1, base), pattern(9));
}

// a read-write mapping of a file opened read-only is refused outright.
#[test]
fn test_writable_mapping_of_read_only_file() {
    let (_, sys) = system(MockMmConfig::new());
    let file = open_read_only(pattern(0));
    assert_eq!(
        sys.establish(1, 0, PAGE_SIZE, rw(), MapFlags::empty(), Some(file.clone()), 0),
        Err(PagingError::PermissionDenied)
    );
    assert_eq!(sys.region_count(), 0);
    assert!(
        sys.establish(1, 0, PAGE_SIZE, ro(), MapFlags::empty(), Some(file), 0)
            .is_ok()
    );
}

#[test]
fn test_fault_fails_without_any_frame() {
    let (_, sys) = system(MockMmConfig::with_frames(1));
    let kernel = sys.alloc_kernel_frame().unwrap();
    let base = map_anon(&sys, 1, 1, lazy());
    // nothing resident, so nothing can be evicted
    assert_eq!(
        sys.handle_page_fault(1, base, AccessKind::Read),
        Err(PagingError::OutOfMemory)
    );
    assert_eq!(sys.page_state(1, base), PageState::Absent);
    assert_frames_conserved(&sys);

    sys.free_kernel_frame(kernel).unwrap();
    sys.handle_page_fault(1, base, AccessKind::Read).unwrap();
    assert!(is_resident(sys.page_state(1, base)));
    assert_eq!(sys.frame_stats().kernel, 0);
}

#[test]
fn test_resident_frame_cannot_be_freed_as_kernel_frame() {
    let (_, sys) = system(MockMmConfig::with_frames(2));
    let base = map_anon(&sys, 1, 1, eager());
    let PageState::Resident(frame) = sys.page_state(1, base) else {
        panic!("page should be resident");
    };
    assert_eq!(
        sys.free_kernel_frame(frame),
        Err(PagingError::InvalidAddress)
    );
    assert!(is_resident(sys.page_state(1, base)));
}
