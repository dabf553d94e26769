//! 内存空间模块
//!
//! 本模块定义了进程的地址空间（页表句柄）、映射区域描述符以及全局映射表。

mod mmap_file;
mod region;
mod space;

pub use mmap_file::MmapFile;
pub use region::{Region, RegionId, RegionState, RegionTable};
pub use space::MemorySpace;
