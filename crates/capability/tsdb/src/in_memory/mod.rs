//! 内存存储实现
//!
//! 仅用于测试和演示，不做持久化。

mod kv;

pub use kv::InMemoryKvStore;
