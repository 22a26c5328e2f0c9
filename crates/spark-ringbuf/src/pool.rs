use std::{
    mem,
    ops::{Deref, DerefMut},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use spin::Mutex;
use tracing::{debug, trace};

use crate::{config::PoolConfig, ring::RingBuffer};

/// `RingBufferPool` 提供基于自由链表（Free List）的环形缓冲池，
/// 在连接频繁建立、断开的场景下复用 `RingBuffer`，减少堆分配次数。
///
/// # 模块角色（Why）
/// - 每条连接通常持有一收一发两个缓冲，连接生命周期短时，重复分配 4 KiB 级别的存储会放大分配器压力；
/// - 池可以被众多连接并发访问，因此自身负责线程安全，而缓冲本身保持无锁、单所有者。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<RingBuffer>>` 作为自由链表，临界区只做一次 `pop`/`push`；
/// - `acquire` 返回 [`PooledRingBuffer`] 租约，`Drop` 时自动归还；
///   `acquire_detached`/`release` 则是显式的所有权移交对；
/// - 缓冲在归还时执行 `reset`，因此任何连接都不会观察到上一任持有者的残留数据；
/// - `PoolMetrics` 以原子计数跟踪分配量、空闲量与租约数，支撑 `stats` 快照。
///
/// # 契约说明（What）
/// - **线程安全**：句柄可 `Clone`，满足 `Send + Sync`；
/// - **独占性**：同一缓冲实例在 `acquire` 与 `release` 之间只有一个所有者，由 Rust 所有权保证；
/// - **保留策略**：容量超过 `max_retained_capacity` 或自由链表已达 `max_idle` 时，归还的缓冲被直接释放。
#[derive(Clone)]
pub struct RingBufferPool {
    inner: Arc<PoolInner>,
}

impl Default for RingBufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl RingBufferPool {
    /// 按配置创建空池；配置应事先通过 [`PoolConfig::validate`]。
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner::new(config)),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// 租借一个缓冲，租约释放时自动归还。
    pub fn acquire(&self) -> PooledRingBuffer {
        PooledRingBuffer {
            buffer: Some(self.inner.acquire_buffer()),
            pool: self.inner.clone(),
        }
    }

    /// 租借一个缓冲并直接转移所有权，调用方负责之后调用 [`RingBufferPool::release`]。
    ///
    /// 未归还的缓冲在统计中会一直计为活跃租约。
    pub fn acquire_detached(&self) -> RingBuffer {
        self.inner.acquire_buffer()
    }

    /// 归还缓冲。按值接收，调用方在此之后不再持有任何引用。
    pub fn release(&self, buffer: RingBuffer) {
        self.inner.reclaim(buffer);
    }

    /// 清空自由链表，返回释放的字节数。
    pub fn shrink_to_fit(&self) -> usize {
        self.inner.shrink_free_list()
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        self.inner.snapshot()
    }
}

/// 进程级默认缓冲池，首次访问时以默认配置初始化。
pub fn global_pool() -> &'static RingBufferPool {
    static GLOBAL: OnceLock<RingBufferPool> = OnceLock::new();
    GLOBAL.get_or_init(RingBufferPool::default)
}

/// 缓冲池统计快照。
///
/// - `allocated_bytes`：池新建缓冲时累计分配的容量，不含租借期间扩容的部分；
/// - `freed_bytes`：因丢弃或收缩而释放的累计容量，按释放时的实际容量计；
/// - `available_bytes`：自由链表中空闲缓冲的容量之和；
/// - `active_leases`：当前未归还的缓冲数量；
/// - `idle_buffers`：自由链表长度；
/// - `total_acquired`/`total_released`：累计租借与归还次数；
/// - `pool_misses`：自由链表为空、只能新分配的次数；
/// - `discarded`：归还时因超出保留上限而被释放的次数。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub allocated_bytes: usize,
    pub freed_bytes: usize,
    pub available_bytes: usize,
    pub active_leases: usize,
    pub idle_buffers: usize,
    pub total_acquired: u64,
    pub total_released: u64,
    pub pool_misses: u64,
    pub discarded: u64,
}

/// `PooledRingBuffer` 是一次缓冲租约。
///
/// # 设计动机（Why）
/// - 连接任务可能从多个分支提前返回，依赖 `Drop` 归还可以避免遗漏释放导致池统计失真；
/// - 通过 `Deref`/`DerefMut` 直接暴露 [`RingBuffer`] 的全部操作，调用端无需感知池化细节。
///
/// # 契约说明（What）
/// - 租约存续期间独占缓冲；
/// - `into_inner` 解除与池的绑定，之后的归还需显式调用 [`RingBufferPool::release`]。
pub struct PooledRingBuffer {
    buffer: Option<RingBuffer>,
    pool: Arc<PoolInner>,
}

impl PooledRingBuffer {
    /// 取出底层缓冲，不再自动归还。
    pub fn into_inner(mut self) -> RingBuffer {
        self.buffer
            .take()
            .unwrap_or_else(|| unreachable!("PooledRingBuffer 在 Drop 之前始终持有缓冲"))
    }
}

impl Deref for PooledRingBuffer {
    type Target = RingBuffer;

    fn deref(&self) -> &RingBuffer {
        self.buffer
            .as_ref()
            .unwrap_or_else(|| unreachable!("PooledRingBuffer 在 Drop 之前始终持有缓冲"))
    }
}

impl DerefMut for PooledRingBuffer {
    fn deref_mut(&mut self) -> &mut RingBuffer {
        self.buffer
            .as_mut()
            .unwrap_or_else(|| unreachable!("PooledRingBuffer 在 Drop 之前始终持有缓冲"))
    }
}

impl Drop for PooledRingBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.reclaim(buffer);
        }
    }
}

struct PoolInner {
    free_list: Mutex<Vec<RingBuffer>>,
    config: PoolConfig,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn new(config: PoolConfig) -> Self {
        Self {
            free_list: Mutex::new(Vec::new()),
            config,
            metrics: PoolMetrics::default(),
        }
    }

    /// 优先从自由链表复用，否则按配置新建。
    fn acquire_buffer(&self) -> RingBuffer {
        // 空闲量统计与自由链表在同一临界区内变更，快照才不会出现负漂移。
        let reused = {
            let mut list = self.free_list.lock();
            list.pop()
                .inspect(|buffer| self.metrics.decrease_available(buffer.capacity()))
        };
        let buffer = match reused {
            Some(buffer) => buffer,
            None => {
                let buffer = RingBuffer::with_config(&self.config.buffer);
                self.metrics.increase_on_new_allocation(buffer.capacity());
                self.metrics.pool_misses.fetch_add(1, Ordering::Relaxed);
                trace!(capacity = buffer.capacity(), "ring buffer pool miss");
                buffer
            }
        };
        self.metrics.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.metrics.increase_active_leases();
        buffer
    }

    fn reclaim(&self, mut buffer: RingBuffer) {
        self.metrics.decrease_active_leases();
        self.metrics.total_released.fetch_add(1, Ordering::Relaxed);

        let capacity = buffer.capacity();
        if capacity > self.config.max_retained_capacity {
            self.discard(capacity, "capacity above retention limit");
            return;
        }

        buffer.reset();
        let mut list = self.free_list.lock();
        if list.len() >= self.config.max_idle {
            drop(list);
            self.discard(capacity, "free list is full");
            return;
        }
        list.push(buffer);
        self.metrics.increase_available(capacity);
    }

    fn discard(&self, capacity: usize, reason: &'static str) {
        self.metrics.increase_freed(capacity);
        self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(capacity, reason, "ring buffer discarded on release");
    }

    fn shrink_free_list(&self) -> usize {
        let (buffers, reclaimed) = {
            let mut list = self.free_list.lock();
            let drained = mem::take(&mut *list);
            let reclaimed: usize = drained.iter().map(RingBuffer::capacity).sum();
            self.metrics.decrease_available(reclaimed);
            (drained.len(), reclaimed)
        };
        self.metrics.increase_freed(reclaimed);
        debug!(buffers, reclaimed, "ring buffer pool shrunk");
        reclaimed
    }

    fn snapshot(&self) -> PoolStats {
        let idle_buffers = self.free_list.lock().len();
        PoolStats {
            allocated_bytes: self.metrics.allocated_bytes.load(Ordering::Relaxed),
            freed_bytes: self.metrics.freed_bytes.load(Ordering::Relaxed),
            available_bytes: self.metrics.available_bytes.load(Ordering::Relaxed),
            active_leases: self.metrics.active_leases.load(Ordering::Relaxed),
            idle_buffers,
            total_acquired: self.metrics.total_acquired.load(Ordering::Relaxed),
            total_released: self.metrics.total_released.load(Ordering::Relaxed),
            pool_misses: self.metrics.pool_misses.load(Ordering::Relaxed),
            discarded: self.metrics.discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct PoolMetrics {
    allocated_bytes: AtomicUsize,
    freed_bytes: AtomicUsize,
    available_bytes: AtomicUsize,
    active_leases: AtomicUsize,
    total_acquired: AtomicU64,
    total_released: AtomicU64,
    pool_misses: AtomicU64,
    discarded: AtomicU64,
}

impl PoolMetrics {
    fn increase_on_new_allocation(&self, capacity: usize) {
        self.allocated_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn increase_available(&self, capacity: usize) {
        self.available_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn decrease_available(&self, capacity: usize) {
        saturating_sub(&self.available_bytes, capacity);
    }

    fn increase_freed(&self, capacity: usize) {
        self.freed_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn increase_active_leases(&self) {
        self.active_leases.fetch_add(1, Ordering::Relaxed);
    }

    fn decrease_active_leases(&self) {
        saturating_sub(&self.active_leases, 1);
    }
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RingBufferConfig;

    fn small_pool(max_idle: usize, max_retained_capacity: usize) -> RingBufferPool {
        RingBufferPool::new(PoolConfig {
            buffer: RingBufferConfig {
                initial_capacity: 8,
                ..RingBufferConfig::default()
            },
            max_idle,
            max_retained_capacity,
        })
    }

    #[test]
    fn released_buffer_is_reused_and_reset() {
        let pool = small_pool(4, 64);
        {
            let mut lease = pool.acquire();
            lease.write(b"stale");
        }
        let stats = pool.stats();
        assert_eq!(stats.idle_buffers, 1);
        assert_eq!(stats.available_bytes, 8);

        let lease = pool.acquire();
        assert!(lease.is_empty(), "复用的缓冲必须已被重置");
        assert_eq!(lease.capacity(), 8);
        assert_eq!(pool.stats().pool_misses, 1);
    }

    #[test]
    fn oversized_buffer_is_discarded_on_release() {
        let pool = small_pool(4, 16);
        let mut buffer = pool.acquire_detached();
        buffer.write(&[0u8; 40]);
        pool.release(buffer);
        let stats = pool.stats();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.idle_buffers, 0);
        assert_eq!(stats.allocated_bytes, 8);
        assert_eq!(stats.freed_bytes, 40);
        assert_eq!(stats.active_leases, 0);
    }

    #[test]
    fn full_free_list_discards_extra_buffers() {
        let pool = small_pool(1, 64);
        let first = pool.acquire();
        let second = pool.acquire();
        drop(first);
        drop(second);
        let stats = pool.stats();
        assert_eq!(stats.idle_buffers, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.allocated_bytes, 16);
        assert_eq!(stats.freed_bytes, 8);
        assert_eq!(stats.available_bytes, 8);
    }

    #[test]
    fn into_inner_detaches_lease() {
        let pool = small_pool(4, 64);
        let mut buffer = pool.acquire().into_inner();
        buffer.write(b"kept");
        assert_eq!(pool.stats().active_leases, 1);
        assert_eq!(pool.stats().idle_buffers, 0);
        pool.release(buffer);
        assert_eq!(pool.stats().active_leases, 0);
        assert_eq!(pool.stats().idle_buffers, 1);
    }

    #[test]
    fn global_pool_is_shared() {
        assert!(std::ptr::eq(global_pool(), global_pool()));
        let lease = global_pool().acquire();
        assert!(lease.is_empty());
    }
}
