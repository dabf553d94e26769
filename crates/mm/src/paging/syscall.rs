//! mmap / munmap / freemem 系统调用
//!
//! 把原始的系统调用参数解码后交给 [`PagingSystem`]，并把错误折叠为约定的返回值。

use uapi::mm::{ANON_FD, MAP_FAILED, MUNMAP_FAILED, MUNMAP_OK, MapFlags, ProtFlags};

use super::PagingSystem;
use crate::Pid;
use crate::address::Vaddr;
use crate::file::MmFdTable;
use crate::page_table::{PagingError, PagingResult};

impl PagingSystem {
    /// mmap 系统调用
    ///
    /// 成功返回映射起始地址，失败返回 [`MAP_FAILED`]。
    #[allow(clippy::too_many_arguments)]
    pub fn sys_mmap(
        &self,
        fds: &dyn MmFdTable,
        pid: Pid,
        addr: usize,
        length: usize,
        prot: u32,
        flags: u32,
        fd: i32,
        offset: isize,
    ) -> usize {
        match self.do_mmap(fds, pid, addr, length, prot, flags, fd, offset) {
            Ok(base) => base.0,
            Err(e) => {
                log::debug!(
                    "sys_mmap: pid {} addr {:#x} len {:#x} prot {:#x} flags {:#x} fd {} failed: {}",
                    pid,
                    addr,
                    length,
                    prot,
                    flags,
                    fd,
                    e
                );
                MAP_FAILED
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn do_mmap(
        &self,
        fds: &dyn MmFdTable,
        pid: Pid,
        addr: usize,
        length: usize,
        prot: u32,
        flags: u32,
        fd: i32,
        offset: isize,
    ) -> PagingResult<Vaddr> {
        let prot = ProtFlags::from_bits(prot).ok_or(PagingError::InvalidArgument)?;
        let flags = MapFlags::from_bits(flags).ok_or(PagingError::InvalidArgument)?;

        if flags.is_anonymous() {
            if fd != ANON_FD {
                return Err(PagingError::InvalidArgument);
            }
            return self.establish(pid, addr, length, prot, flags, None, 0);
        }

        let offset = usize::try_from(offset).map_err(|_| PagingError::InvalidArgument)?;
        if fd < 0 {
            return Err(PagingError::BadFile);
        }
        let file = fds.get_file(pid, fd).ok_or(PagingError::BadFile)?;
        self.establish(pid, addr, length, prot, flags, Some(file), offset)
    }

    /// munmap 系统调用
    ///
    /// 成功返回 [`MUNMAP_OK`]，失败返回 [`MUNMAP_FAILED`]。
    pub fn sys_munmap(&self, pid: Pid, addr: usize) -> isize {
        match self.remove(pid, Vaddr(addr)) {
            Ok(()) => MUNMAP_OK,
            Err(e) => {
                log::debug!("sys_munmap: pid {} addr {:#x} failed: {}", pid, addr, e);
                MUNMAP_FAILED
            }
        }
    }

    /// freemem 系统调用，返回空闲帧数
    pub fn sys_freemem(&self) -> usize {
        self.free_frames()
    }
}
