//! Mock 实现模块
//!
//! 提供架构、内存配置、交换设备和文件的 Mock 实现，用于测试

pub mod arch;
pub mod block;
pub mod fs;
pub mod mm;
