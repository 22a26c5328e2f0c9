//! `spark-ringbuf` 提供连接收发路径使用的可扩容环形字节缓冲及其缓冲池。
//!
//! # 模块定位（Why）
//! - 套接字读到的字节追加到写游标，协议层从读游标消费；发送路径可零拷贝窥视待发数据，
//!   写出成功后再标记取走；
//! - 传输层负责真实 I/O，本 crate 只负责暂存字节，不触碰任何套接字。
//!
//! # 设计概要（How）
//! - `ring` 模块实现 [`RingBuffer`]：显式的空/满标记、回绕读写、按 [`GrowthPolicy`] 透明扩容；
//! - `pool` 模块实现 [`RingBufferPool`]：自旋锁保护的自由链表、RAII 租约 [`PooledRingBuffer`] 与统计快照；
//! - `config` 模块以 `serde` + TOML 描述缓冲、池与日志参数；
//! - `observability` 模块负责安装 `tracing-subscriber`，缓冲与池本身只发出 `tracing` 事件。
//!
//! # 并发约定（Consistency）
//! - [`RingBuffer`] 不含内部同步，修改全部经由 `&mut self`，一条连接一个所有者；
//! - 跨线程共享的只有 [`RingBufferPool`]，其句柄满足 `Send + Sync`。

mod config;
mod error;
pub mod observability;
mod pool;
mod ring;

pub use config::{
    DEFAULT_INITIAL_CAPACITY, DEFAULT_LOG_FILE, DEFAULT_MAX_IDLE, DEFAULT_MAX_LOG_FILES,
    DEFAULT_MAX_RETAINED_CAPACITY, GrowthPolicy, LogConfig, LogOutput, LogRotation, PoolConfig,
    RingBufferConfig, Settings,
};
pub use error::{ConfigError, LogInstallError, Result, RingBufferError};
pub use pool::{PoolStats, PooledRingBuffer, RingBufferPool, global_pool};
pub use ring::RingBuffer;
