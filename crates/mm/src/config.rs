//! 内存管理配置 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 页大小（字节）
///
/// 分页子系统只支持 4KiB 页，[`MmConfig::page_size`] 必须与之一致。
pub const PAGE_SIZE: usize = 4096;

/// 默认映射表容量
pub const DEFAULT_REGION_CAPACITY: usize = 64;

/// 默认 mmap 区域起始地址
pub const DEFAULT_MMAP_BASE: usize = 0x4000_0000;

/// 内存管理配置常量
///
/// 此 trait 提供分页子系统所需的配置常量。
/// os crate 需要实现此 trait 并注册。
pub trait MmConfig: Send + Sync {
    /// 页大小（通常为 4096）
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    /// 可分配给用户页的物理帧数量
    fn frame_count(&self) -> usize;

    /// 交换区槽位数量（含保留的 0 号槽）
    fn swap_slot_count(&self) -> usize;

    /// 全局映射表的容量
    fn region_capacity(&self) -> usize {
        DEFAULT_REGION_CAPACITY
    }

    /// 用户 mmap 窗口的起始地址（页对齐）
    fn mmap_base(&self) -> usize {
        DEFAULT_MMAP_BASE
    }

    /// 用户 mmap 窗口的大小（字节）
    fn mmap_window_size(&self) -> usize;
}

static CONFIG_DATA: AtomicUsize = AtomicUsize::new(0);
static CONFIG_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册配置实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_config(config: &'static dyn MmConfig) {
    let ptr = config as *const dyn MmConfig;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn MmConfig, (usize, usize)>(ptr) };
    CONFIG_VTABLE.store(vtable, Ordering::Release);
    CONFIG_DATA.store(data, Ordering::Release);
}

/// 获取已注册的配置实现，未注册时返回 `None`
#[inline]
pub fn try_mm_config() -> Option<&'static dyn MmConfig> {
    let data = CONFIG_DATA.load(Ordering::Acquire);
    let vtable = CONFIG_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        return None;
    }
    // SAFETY: data/vtable 来自 register_config 中拆分的同一个 &'static dyn MmConfig
    Some(unsafe { &*core::mem::transmute::<(usize, usize), *const dyn MmConfig>((data, vtable)) })
}

/// 获取已注册的配置实现
///
/// # Panics
/// 如果尚未调用 [`register_config`] 注册实现，则 panic
#[inline]
pub fn mm_config() -> &'static dyn MmConfig {
    match try_mm_config() {
        Some(config) => config,
        None => panic!("mm: MmConfig not registered"),
    }
}
