//! 内存管理相关配置的 Mock 实现
//!
//! 注意：这里不直接依赖 `mm` crate（避免循环依赖）。
//! `mm` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `MmConfig`）。

/// Mock 的内存管理配置
///
/// 物理帧数量刻意设置得很小，便于在测试中制造内存压力。
#[derive(Debug, Clone, Copy)]
pub struct MockMmConfig {
    pub frames: usize,
    pub swap_slots: usize,
    pub regions: usize,
}

impl MockMmConfig {
    pub const fn new() -> Self {
        Self {
            frames: 16,
            swap_slots: 64,
            regions: 64,
        }
    }

    /// 指定物理帧数量
    pub const fn with_frames(frames: usize) -> Self {
        Self {
            frames,
            swap_slots: 64,
            regions: 64,
        }
    }

    /// 指定交换槽数量（含保留的 0 号槽）
    pub const fn with_swap_slots(mut self, swap_slots: usize) -> Self {
        self.swap_slots = swap_slots;
        self
    }

    /// 指定映射表容量
    pub const fn with_regions(mut self, regions: usize) -> Self {
        self.regions = regions;
        self
    }

    pub fn page_size(&self) -> usize {
        4096
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn swap_slot_count(&self) -> usize {
        self.swap_slots
    }

    pub fn region_capacity(&self) -> usize {
        self.regions
    }

    pub fn mmap_base(&self) -> usize {
        0x4000_0000
    }

    pub fn mmap_window_size(&self) -> usize {
        0x1000_0000
    }
}

impl Default for MockMmConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_CONFIG: MockMmConfig = MockMmConfig::new();
