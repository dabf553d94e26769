//! 错误码定义（与 Linux 数值一致）

/// I/O 错误
pub const EIO: i32 = 5;
/// 文件描述符无效
pub const EBADF: i32 = 9;
/// 内存不足
pub const ENOMEM: i32 = 12;
/// 权限被拒绝
pub const EACCES: i32 = 13;
/// 地址错误
pub const EFAULT: i32 = 14;
/// 参数无效
pub const EINVAL: i32 = 22;
/// 打开的表项过多（映射表已满）
pub const EMFILE: i32 = 24;
/// 设备空间不足（交换区已满）
pub const ENOSPC: i32 = 28;
