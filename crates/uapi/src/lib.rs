//! 与用户空间共用定义和声明
//!
//! 包含内存映射相关的常量、标志位和错误码，确保内核和用户空间的一致性

#![no_std]

pub mod errno;
pub mod mm;
