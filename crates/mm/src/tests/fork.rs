// Tests for copying mappings into a forked child.

use super::*;
use crate::{AccessKind, RegionState};

#[test]
fn test_fork_copies_anonymous_pages() {
    let (_, sys) = system(MockMmConfig::with_frames(16));
    let base = map_anon(&sys, 1, 2, lazy());
    sys.write_user(1, base, &pattern(1)).unwrap();
    sys.write_user(1, page(base, 1), &pattern(2)).unwrap();
    assert_eq!(sys.free_frames(), 14);

    sys.duplicate(1, 2).unwrap();
    assert_eq!(sys.free_frames(), 12);
    assert_eq!(sys.region_count(), 2);
    assert_eq!(
        sys.region_at(2, base).map(|r| r.state),
        Some(RegionState::Populated)
    );
    assert!(is_resident(sys.page_state(2, base)));
    assert_eq!(read_page(&sys, 2, base), pattern(1));
    assert_eq!(read_page(&sys, 2, page(base, 1)), pattern(2));

    // the copies are private to each side
    sys.write_user(2, base, b"child").unwrap();
    sys.write_user(1, page(base, 1), b"parent").unwrap();
    assert_eq!(read_page(&sys, 1, base), pattern(1));
    assert_eq!(read_page(&sys, 2, page(base, 1)), pattern(2));
    assert_frames_conserved(&sys);
}

#[test]
fn test_fork_copies_swapped_pages() {
    let (_, sys) = system(MockMmConfig::with_frames(2).with_swap_slots(16));
    let a = map_anon(&sys, 1, 2, lazy());
    sys.write_user(1, a, &pattern(3)).unwrap();
    sys.write_user(1, page(a, 1), &pattern(4)).unwrap();
    // pushes both pages of `a` out to swap
    let b = map_anon(&sys, 1, 2, eager());
    assert!(is_swapped(sys.page_state(1, a)));
    assert!(is_swapped(sys.page_state(1, page(a, 1))));

    sys.duplicate(1, 2).unwrap();
    for pid in [1, 2] {
        assert_eq!(read_page(&sys, pid, a), pattern(3));
        assert_eq!(read_page(&sys, pid, page(a, 1)), pattern(4));
        assert!(read_page(&sys, pid, b).iter().all(|x| *x == 0));
    }
    assert_eq!(sys.resident_count() + sys.swap_slots_used(), 8);
    assert_frames_conserved(&sys);
}

#[test]
fn test_fork_rereads_file_pages() {
    let (_, sys) = system(MockMmConfig::new());
    let inode = Arc::new(MockFile::new(pattern(5)));
    let file: Arc<dyn MmFile> = MockOpenFile::new(inode.clone());
    let base = sys
        .establish(1, 0, PAGE_SIZE, rw(), MapFlags::empty(), Some(file), 0)
        .unwrap();
    assert_eq!(read_page(&sys, 1, base), pattern(5));

    inode.set_contents(pattern(6));
    sys.duplicate(1, 2).unwrap();
    assert!(is_resident(sys.page_state(2, base)));
    assert_eq!(read_page(&sys, 2, base), pattern(6));
    // the parent keeps what it already paged in
    assert_eq!(read_page(&sys, 1, base), pattern(5));
}

#[test]
fn test_fork_keeps_reserved_regions_lazy() {
    let (_, sys) = system(MockMmConfig::with_frames(4));
    let base = map_anon(&sys, 1, 3, lazy());
    sys.duplicate(1, 2).unwrap();

    assert_eq!(sys.free_frames(), 4);
    assert_eq!(
        sys.region_at(2, base).map(|r| r.state),
        Some(RegionState::Reserved)
    );
    assert_eq!(sys.page_state(2, base), PageState::Absent);

    sys.handle_page_fault(2, base, AccessKind::Write).unwrap();
    assert_eq!(sys.free_frames(), 1);
    // the parent's region is untouched by the child's fault
    assert_eq!(
        sys.region_at(1, base).map(|r| r.state),
        Some(RegionState::Reserved)
    );
}

#[test]
fn test_fork_without_mappings() {
    let (_, sys) = system(MockMmConfig::new());
    sys.duplicate(1, 2).unwrap();
    assert_eq!(sys.region_count(), 0);
    assert_eq!(sys.free_frames(), 16);
}

#[test]
fn test_child_exit_leaves_parent_intact() {
    let (_, sys) = system(MockMmConfig::with_frames(8));
    let base = map_anon(&sys, 1, 2, eager());
    sys.write_user(1, base, b"keep").unwrap();
    sys.duplicate(1, 2).unwrap();
    assert_eq!(sys.free_frames(), 4);

    assert_eq!(sys.release_process(2), 1);
    assert_eq!(sys.free_frames(), 6);
    let mut buf = [0u8; 4];
    sys.read_user(1, base, &mut buf).unwrap();
    assert_eq!(&buf, b"keep");
}
