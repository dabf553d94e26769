//! 测试支持 crate
//!
//! 提供宿主机 `cargo test` 使用的 Mock 实现。
//! 这里不依赖任何内核 crate，各 crate 在 `cfg(test)` 下为这些类型实现自己的 trait。

pub mod mock;

